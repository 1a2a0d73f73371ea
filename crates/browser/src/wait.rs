use dell_lookup_core::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls a condition until it yields a value or the deadline passes.
///
/// The probe runs at least once. Errors from the probe end the wait
/// immediately; only "not yet" (`Ok(None)`) is retried.
#[derive(Debug, Clone, Copy)]
pub struct BoundedWait {
    timeout: Duration,
    poll_interval: Duration,
}

impl BoundedWait {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn poll_every(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn until<T, F, Fut>(&self, what: &str, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let start = Instant::now();
        loop {
            if let Some(value) = probe().await? {
                debug!(condition = what, elapsed_ms = start.elapsed().as_millis() as u64, "Wait satisfied");
                return Ok(value);
            }
            if start.elapsed() >= self.timeout {
                return Err(Error::Timeout(format!(
                    "{} not met after {}s",
                    what,
                    self.timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
