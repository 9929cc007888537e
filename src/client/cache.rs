use std::time::{Duration, Instant};

/// A fetched value and when it was fetched.
///
/// Lets a poller skip a round trip while its last answer is still young.
#[derive(Debug, Clone)]
pub struct Timestamped<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> Timestamped<T> {
    pub fn new(value: T) -> Self {
        Self::at(value, Instant::now())
    }

    pub fn at(value: T, fetched_at: Instant) -> Self {
        Self { value, fetched_at }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// The value, if it was fetched less than `min_age` ago.
    pub fn fresh(&self, min_age: Duration) -> Option<&T> {
        (self.age() < min_age).then_some(&self.value)
    }
}
