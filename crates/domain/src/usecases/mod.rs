//! Application use cases / business logic

pub mod accounts;
pub mod analytics;
pub mod auto_post;
pub mod error;
pub mod generation;
pub mod posts;
pub mod rules;
pub mod schedule;

pub use accounts::{AccountService, SettingsService, SettingsUpdate};
pub use analytics::AnalyticsService;
pub use auto_post::AutoPoster;
pub use error::ServiceError;
pub use generation::{DraftRequest, GenerationService};
pub use posts::PostService;
pub use rules::{NewRule, RulePatch, RuleService};
pub use schedule::{Schedule, ScheduleError};

use std::future::Future;
use std::time::Duration;

/// Run `fut` to completion, or give up after `limit`. `None` means it timed out.
pub(crate) async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
