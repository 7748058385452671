//! Resilient loading - bounded retry, exponential backoff, per-attempt timeout
//!
//! Wraps [`RemoteFetcher`] with a configurable retry policy. Attempts are
//! independent: no state is carried between them apart from the last error,
//! and an attempt abandoned by the caller (the owning slot moved on) simply
//! has its result discarded.

use crate::contract::ActivationContract;
use crate::fetcher::RemoteFetcher;
use crate::LoaderResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};
use trellis_types::{RemoteError, RemoteManifest, VisibilityContext};

/// Retry policy for remote loading.
///
/// The defaults are a starting point, not a contract; hosts tune them
/// through configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,
    /// Base backoff delay, doubled after every failed attempt (milliseconds).
    pub retry_delay_ms: u64,
    /// Hard per-attempt timeout (milliseconds).
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1_000,
            timeout_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt following failed attempt `attempt`:
    /// `retry_delay * 2^attempt`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(1u64 << attempt.min(32)))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

pub struct ResilientLoader {
    fetcher: Arc<RemoteFetcher>,
    policy: RetryPolicy,
}

impl ResilientLoader {
    pub fn new(fetcher: Arc<RemoteFetcher>) -> Self {
        Self {
            fetcher,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(fetcher: Arc<RemoteFetcher>, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch with bounded retry.
    ///
    /// Races every attempt against the per-attempt timeout, backs off
    /// exponentially between attempts, and reports the total attempt count
    /// with the last underlying cause once retries are exhausted.
    #[instrument(skip(self, manifest, context))]
    pub async fn fetch_with_retry(
        &self,
        name: &str,
        manifest: &RemoteManifest,
        context: &VisibilityContext,
    ) -> LoaderResult<ActivationContract> {
        let mut last_error: Option<RemoteError> = None;

        for attempt in 0..=self.policy.max_retries {
            match timeout(
                self.policy.attempt_timeout(),
                self.fetcher.fetch(name, manifest, context),
            )
            .await
            {
                Ok(Ok(contract)) => {
                    if attempt > 0 {
                        debug!(remote = name, attempt, "Remote loaded after retry");
                    }
                    return Ok(contract);
                }
                Ok(Err(err)) => {
                    warn!(remote = name, attempt, error = %err, "Remote load attempt failed");
                    last_error = Some(err);
                }
                Err(_) => {
                    warn!(
                        remote = name,
                        attempt,
                        timeout_ms = self.policy.timeout_ms,
                        "Remote load attempt timed out"
                    );
                    last_error = Some(RemoteError::load(format!(
                        "Loading remote \"{name}\" timed out after {}ms",
                        self.policy.timeout_ms
                    )));
                }
            }

            if attempt < self.policy.max_retries {
                let backoff = self.policy.backoff_after(attempt);
                debug!(remote = name, backoff_ms = backoff.as_millis() as u64, "Backing off");
                sleep(backoff).await;
            }
        }

        let attempts = self.policy.max_retries + 1;
        let message = format!("Failed to load remote \"{name}\" after {attempts} attempts");
        Err(match last_error {
            Some(cause) => RemoteError::load_with(message, cause),
            None => RemoteError::load(message),
        })
    }
}
