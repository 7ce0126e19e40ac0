//! Courtesy throttling of upstream requests.
//!
//! Requests issued through one client are spread over a fixed number of
//! lanes (logical request streams). Within a lane, a request may only start
//! once `min_interval` has passed since the previous request on that lane
//! *finished*, whether it succeeded or failed. With a single lane this is a
//! strictly sequential stream with a fixed gap between requests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    lanes: Vec<Mutex<Option<Instant>>>,
    next_lane: AtomicUsize,
}

impl RequestThrottle {
    /// Creates a throttle with `lanes` independent streams (at least one).
    #[must_use]
    pub fn new(min_interval: Duration, lanes: usize) -> Self {
        Self {
            min_interval,
            lanes: (0..lanes.max(1)).map(|_| Mutex::new(None)).collect(),
            next_lane: AtomicUsize::new(0),
        }
    }

    /// Runs `operation` on the next lane, waiting out that lane's interval first.
    ///
    /// The lane stays occupied until `operation` completes, so concurrent
    /// callers beyond the lane count queue up behind it.
    pub async fn run<T, F, Fut>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lane = self.next_lane.fetch_add(1, Ordering::Relaxed) % self.lanes.len();
        let mut last_finished = self.lanes[lane].lock().await;

        if let Some(previous) = *last_finished {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tracing::debug!(
                    lane,
                    wait_ms = u64::try_from((ready_at - Instant::now()).as_millis()).unwrap_or(u64::MAX),
                    "throttling upstream request"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let output = operation().await;
        *last_finished = Some(Instant::now());
        output
    }
}
