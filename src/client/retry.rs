//! Bounded polling with escalation.
//!
//! A caller that just paid waits for the webhook to record the payment.
//! The first attempts only read status; once `escalate_after` attempts have
//! gone by the caller asks the server to reconcile directly. When every
//! attempt is used up the policy's terminal action decides what the caller
//! does next. An error the server will keep returning ends polling at once.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Doubles the interval each attempt, never waiting longer than `max`.
    Exponential { max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalAction {
    /// Carry on as if the payment went through; the webhook will catch up.
    ProceedOptimistically,
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    Probe,
    Escalate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T, E> {
    Completed(T),
    Exhausted(TerminalAction),
    /// A hard failure. Not subject to the terminal action.
    Failed(E),
}

/// Whether asking again could give a different answer.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
    pub escalate_after: u32,
    pub terminal: TerminalAction,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(1),
            backoff: Backoff::Fixed,
            escalate_after: 3,
            terminal: TerminalAction::ProceedOptimistically,
        }
    }
}

impl RetryPolicy {
    /// What attempt `attempt` (zero-based) should do.
    pub fn step(&self, attempt: u32) -> PollStep {
        if attempt < self.escalate_after {
            PollStep::Probe
        } else {
            PollStep::Escalate
        }
    }

    /// Wait before attempt `attempt + 1`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { max } => {
                let factor = 2u32.saturating_pow(attempt.min(16));
                self.interval.saturating_mul(factor).min(max)
            }
        }
    }

    /// Runs `attempt` until it yields a value or the attempts run out.
    ///
    /// An attempt returning `Ok(None)` or a retryable error counts as a
    /// miss. Any other error stops the loop and is returned as `Failed`.
    pub async fn run<T, E, F, Fut>(&self, mut attempt: F) -> PollOutcome<T, E>
    where
        F: FnMut(u32, PollStep) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: Retryable + std::fmt::Display,
    {
        for n in 0..self.max_attempts {
            let step = self.step(n);
            match attempt(n, step).await {
                Ok(Some(value)) => return PollOutcome::Completed(value),
                Ok(None) => tracing::debug!(attempt = n + 1, ?step, "Not settled yet"),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(attempt = n + 1, ?step, "Poll attempt failed: {}", e)
                }
                Err(e) => {
                    tracing::error!(attempt = n + 1, ?step, "Poll attempt rejected: {}", e);
                    return PollOutcome::Failed(e);
                }
            }

            if n + 1 < self.max_attempts {
                tokio::time::sleep(self.delay(n)).await;
            }
        }

        tracing::info!(
            attempts = self.max_attempts,
            terminal = ?self.terminal,
            "Polling exhausted"
        );
        PollOutcome::Exhausted(self.terminal)
    }
}
