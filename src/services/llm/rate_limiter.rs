//! Global per-provider minimum-interval gate (§4.B).

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Serializes calls to each provider `key` to at least `interval` apart.
///
/// A single instance is shared across every workflow in the process, so
/// concurrent chapter generation calls from different tasks still honor one
/// global interval per provider, as spec §5 requires.
pub struct RateLimiter {
    interval: Duration,
    last_release: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// Build a limiter gating every key to at least `interval` apart.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_release: Mutex::new(HashMap::new()),
        }
    }

    /// Block until at least `interval` has elapsed since the last `acquire`
    /// for `key`, then record this acquisition's time.
    pub async fn acquire(&self, key: &str) {
        loop {
            let wait = {
                let mut last = self.last_release.lock().await;
                match last.get(key) {
                    Some(&previous) => {
                        let elapsed = previous.elapsed();
                        if elapsed >= self.interval {
                            last.insert(key.to_string(), Instant::now());
                            None
                        } else {
                            Some(self.interval - elapsed)
                        }
                    }
                    None => {
                        last.insert(key.to_string(), Instant::now());
                        None
                    }
                }
            };
            match wait {
                Some(duration) => sleep(duration).await,
                None => return,
            }
        }
    }
}
