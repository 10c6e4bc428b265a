//! Threads Graph API adapters

mod client;
mod stub;

pub use client::ThreadsClient;
pub use stub::{StubConnector, StubPublisher};

use postpilot_domain::policy::DEFAULT_MAX_CHARS;
use postpilot_domain::{Account, PlatformConnector, PublishError, PublishingClient};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://graph.threads.net/v1.0";

/// Threads client settings shared by every account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadsConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Pause between chained thread segments
    pub thread_gap_ms: u64,
    pub max_chars: usize,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            thread_gap_ms: 1000,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl ThreadsConfig {
    pub fn thread_gap(&self) -> Duration {
        Duration::from_millis(self.thread_gap_ms)
    }
}

/// Builds a Threads client from an account's stored token
#[derive(Debug, Clone, Default)]
pub struct ThreadsConnector {
    config: ThreadsConfig,
}

impl ThreadsConnector {
    pub fn new(config: ThreadsConfig) -> Self {
        Self { config }
    }
}

impl PlatformConnector for ThreadsConnector {
    fn client_for(&self, account: &Account) -> Result<Arc<dyn PublishingClient>, PublishError> {
        let client = ThreadsClient::new(account.access_token.clone(), self.config.clone())
            .with_user_id(account.platform_user_id.clone());
        Ok(Arc::new(client))
    }

    fn platform(&self) -> &'static str {
        "threads"
    }
}

fn request_error(e: reqwest::Error) -> PublishError {
    if e.is_timeout() {
        PublishError::Timeout
    } else {
        PublishError::Network(e.to_string())
    }
}

/// Map a non-success Graph API response to a typed error
async fn check_status(response: Response, action: &str) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PublishError::Auth(format!("{} rejected ({}): {}", action, status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited,
        _ => PublishError::Api(format!("Failed to {}: {} {}", action, status, body)),
    })
}
