use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Time source for the run poll loop.
#[async_trait]
pub trait PollClock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}
