//! Bounded retry around a single provider call.
//!
//! Attempt `k` either succeeds (done) or fails; while `k < max_attempts` a
//! failure reports a [`RetryWarning`], sleeps the fixed delay and moves on to
//! attempt `k + 1`. A failure on the last attempt yields
//! [`RetryError::Exhausted`]. Callers turn that into [`FALLBACK_MESSAGE`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{ProviderError, RetryError};
use crate::llm::LlmProvider;
use crate::types::{ChatRequest, ChatResponse};

/// Answer shown when every attempt failed.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, I could not get a response after multiple attempts. Please try again later.";

/// Non-fatal notice that one attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryWarning {
    /// 1-based.
    pub attempt: u32,
    pub max_attempts: u32,
    pub cause: String,
}

impl std::fmt::Display for RetryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Provider call failed (attempt {}/{}): {}",
            self.attempt, self.max_attempts, self.cause
        )
    }
}

/// A successful completion and the number of attempts it took.
#[derive(Debug, Clone)]
pub struct Completed {
    pub response: ChatResponse,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.delay_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Call `provider` until it succeeds or attempts run out.
    ///
    /// `on_warning` is invoked once per failed attempt, before the delay.
    pub async fn run(
        &self,
        provider: &dyn LlmProvider,
        request: &ChatRequest,
        on_warning: &mut (dyn FnMut(RetryWarning) + Send),
    ) -> Result<Completed, RetryError> {
        let mut attempt = 1;
        loop {
            debug!(
                provider = provider.name(),
                model = %request.model,
                attempt,
                max_attempts = self.max_attempts,
                "Sending completion request"
            );
            let err: ProviderError = match provider.chat_completion(request).await {
                Ok(response) => {
                    return Ok(Completed {
                        response,
                        attempts: attempt,
                    })
                }
                Err(e) => e,
            };

            warn!(
                provider = provider.name(),
                model = %request.model,
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                "Completion attempt failed"
            );
            on_warning(RetryWarning {
                attempt,
                max_attempts: self.max_attempts,
                cause: err.to_string(),
            });

            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}
