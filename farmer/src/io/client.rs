//! Retrying client wrapped around a [`Transport`].

use std::fmt;

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::backoff::{RetryPolicy, is_retryable_status};
use crate::io::transport::{ApiRequest, ApiResponse, Transport};
use crate::pacing::Pacing;

/// Transport failures outlasted the retry budget.
///
/// Callers downcast to this to tell an undeliverable request apart from an
/// unexpected fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetriesExhausted {
    pub attempts: u32,
    pub last_error: String,
}

impl fmt::Display for RetriesExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request failed after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl std::error::Error for RetriesExhausted {}

/// Executes remote actions with bounded retry and jittered backoff.
///
/// Retryable statuses and transport failures are retried up to
/// `policy.max_retries` times. Other statuses return immediately; the caller
/// decides success by inspecting the status.
pub struct ResilientClient<T> {
    transport: T,
    policy: RetryPolicy,
    pacing: Pacing,
}

impl<T: Transport> ResilientClient<T> {
    pub fn new(transport: T, policy: RetryPolicy, pacing: Pacing) -> Self {
        Self {
            transport,
            policy,
            pacing,
        }
    }

    /// Run one action to completion.
    ///
    /// Exhausting retries on a retryable status yields that last response;
    /// exhausting them on transport failures yields [`RetriesExhausted`].
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut retries = 0u32;
        loop {
            match self.transport.send(request).await {
                Ok(response) if is_retryable_status(response.status) => {
                    retries += 1;
                    if retries > self.policy.max_retries {
                        warn!(
                            url = %request.url,
                            status = response.status,
                            retries = self.policy.max_retries,
                            "retry budget exhausted on retryable status"
                        );
                        return Ok(response);
                    }
                    let wait = self.policy.status_wait(retries, response.retry_after);
                    debug!(
                        url = %request.url,
                        status = response.status,
                        retry = retries,
                        wait_ms = wait.as_millis() as u64,
                        "retrying after retryable status"
                    );
                    self.pacing.wait(wait).await;
                }
                Ok(response) => return Ok(response),
                Err(err) => {
                    retries += 1;
                    if retries > self.policy.max_retries {
                        warn!(url = %request.url, err = %err, "retry budget exhausted on transport failure");
                        return Err(RetriesExhausted {
                            attempts: retries,
                            last_error: format!("{err:#}"),
                        }
                        .into());
                    }
                    let wait = self.policy.transport_wait(retries);
                    debug!(
                        url = %request.url,
                        err = %err,
                        retry = retries,
                        wait_ms = wait.as_millis() as u64,
                        "retrying after transport failure"
                    );
                    self.pacing.wait(wait).await;
                }
            }
        }
    }
}
