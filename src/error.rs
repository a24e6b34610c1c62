//! Error taxonomy.
//!
//! - [`ConfigError`] is fatal and stops startup before any request is served.
//! - [`ProviderError`] is one failed completion attempt; every kind is retried.
//! - [`RetryError`] only ever travels from the retry policy to the session,
//!   which turns it into the fallback answer.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "API key not found. Either:\n  \
         1. Set api_key under [provider] in {}\n  \
         2. Set environment variable: export {env}=your-key",
        .path.display()
    )]
    MissingApiKey { env: String, path: PathBuf },

    #[error("Unknown provider: '{0}'. Supported: 'groq', 'openrouter', 'openai_compatible'")]
    UnknownProvider(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                url: url.to_string(),
            }
        } else {
            ProviderError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("no response after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: ProviderError },
}
