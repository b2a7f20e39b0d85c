use std::time::Duration;

/// Backoff policy for operations that fail transiently, such as a lost
/// compare-and-swap race on a versioned record.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Short, tight loop for version conflicts: contention on a single
    /// user's rows clears within a few milliseconds.
    pub fn version_conflicts() -> Self {
        Self {
            max_attempts: 8,
            base_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(100),
            jitter_max: Some(Duration::from_millis(5)),
        }
    }

    fn next_wait(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) => {
                let jitter_ms = jitter_max.as_millis() as u64;
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    rand::random::<u64>() % (jitter_ms + 1)
                };
                backoff + Duration::from_millis(extra)
            }
            None => backoff,
        }
    }
}

/// Runs `f` until it succeeds or `config.max_attempts` is exhausted,
/// sleeping with exponential backoff (plus jitter) between attempts.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempts_left = config.max_attempts.max(1);
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempts_left -= 1;
                if attempts_left == 0 {
                    return Err(e);
                }

                tokio::time::sleep(config.next_wait(backoff)).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}
