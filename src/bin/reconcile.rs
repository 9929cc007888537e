use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use visitpay::client::{Backoff, PollOutcome, ReconcileClient, RetryPolicy, TerminalAction};

#[derive(Parser)]
#[command(about = "Wait for a payment or membership to be reconciled after checkout")]
struct Args {
    #[arg(long, env = "VISITPAY_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Session token issued at login.
    #[arg(long, env = "VISITPAY_SESSION")]
    session: String,

    #[arg(long, default_value = "session")]
    cookie_name: String,

    #[arg(long, default_value_t = 10)]
    max_attempts: u32,

    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Double the wait each attempt, capped at this many milliseconds.
    #[arg(long)]
    exponential_cap_ms: Option<u64>,

    /// Attempts that only read status before asking the server to reconcile.
    #[arg(long, default_value_t = 3)]
    escalate_after: u32,

    #[arg(long, value_enum, default_value_t = OnExhausted::Proceed)]
    on_exhausted: OnExhausted,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum OnExhausted {
    Proceed,
    GiveUp,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for an appointment payment.
    Payment {
        appointment_id: Uuid,
        /// Charge id returned by the processor at checkout.
        #[arg(long)]
        charge: Option<String>,
        /// Reuse a status probe younger than this.
        #[arg(long, default_value_t = 500)]
        min_refetch_ms: u64,
    },
    /// Wait for a membership subscription.
    Membership { subscription_id: String },
}

impl Args {
    fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            interval: Duration::from_millis(self.interval_ms),
            backoff: match self.exponential_cap_ms {
                Some(cap) => Backoff::Exponential { max: Duration::from_millis(cap) },
                None => Backoff::Fixed,
            },
            escalate_after: self.escalate_after,
            terminal: match self.on_exhausted {
                OnExhausted::Proceed => TerminalAction::ProceedOptimistically,
                OnExhausted::GiveUp => TerminalAction::GiveUp,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "visitpay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let policy = args.policy();
    let client = ReconcileClient::new(&args.base_url, &args.cookie_name, &args.session)?;

    let terminal = match &args.command {
        Command::Payment { appointment_id, charge, min_refetch_ms } => {
            let outcome = client
                .await_payment(
                    *appointment_id,
                    charge.as_deref(),
                    &policy,
                    Duration::from_millis(*min_refetch_ms),
                )
                .await;
            match outcome {
                PollOutcome::Completed(payment) => {
                    println!(
                        "Payment {} recorded: {} {} (charge {})",
                        payment.id,
                        payment.amount_cents as f64 / 100.0,
                        payment.currency,
                        payment.stripe_charge_id.as_deref().unwrap_or("-")
                    );
                    return Ok(());
                }
                PollOutcome::Exhausted(action) => action,
                PollOutcome::Failed(e) => anyhow::bail!("Payment reconciliation failed: {}", e),
            }
        }
        Command::Membership { subscription_id } => {
            match client.await_membership(subscription_id, &policy).await {
                PollOutcome::Completed(response) => {
                    println!(
                        "Membership {} is {}: {}",
                        response.membership_id,
                        response.status.as_str(),
                        response.message
                    );
                    return Ok(());
                }
                PollOutcome::Exhausted(action) => action,
                PollOutcome::Failed(e) => anyhow::bail!("Membership sync failed: {}", e),
            }
        }
    };

    match terminal {
        TerminalAction::ProceedOptimistically => {
            println!("Not confirmed yet; continuing. The processor webhook will record it.");
            Ok(())
        }
        TerminalAction::GiveUp => anyhow::bail!("Gave up after {} attempts", policy.max_attempts),
    }
}
