//! Process-wide rate limiting for outbound provider calls
//!
//! Grants are tracked in a rolling window: at most `rate` permits are issued
//! in any one-second span, no matter how many cell tasks are waiting. The
//! queue is FIFO because waiters park on a fair async mutex.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Grant for exactly one outbound provider call
///
/// The grant expires with the rolling window rather than on drop; holding it
/// only documents the scope of the call it licensed.
#[must_use = "a permit licenses exactly one outbound call"]
#[derive(Debug)]
pub struct RatePermit(());

/// Token gate bounding provider calls per rolling one-second window
#[derive(Debug)]
pub struct RateLimiter {
    rate: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            rate: requests_per_second.max(1) as usize,
            window: Duration::from_secs(1),
            grants: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a slot is free in the rolling window, then claim it
    ///
    /// Waiters are served in request order. Sleeping happens while the grant
    /// log is held, which is what serializes the queue; that is fine because
    /// the window itself is the bottleneck being enforced.
    pub async fn acquire(&self) -> RatePermit {
        let mut grants = self.grants.lock().await;
        loop {
            let now = Instant::now();
            while let Some(front) = grants.front() {
                if now.duration_since(*front) >= self.window {
                    grants.pop_front();
                } else {
                    break;
                }
            }
            if grants.len() < self.rate {
                grants.push_back(now);
                return RatePermit(());
            }
            // Oldest grant leaves the window first; sleep until it does
            let wake_at = *grants.front().expect("window is full") + self.window;
            tokio::time::sleep_until(wake_at).await;
        }
    }
}
