//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{
    Account, AiModel, AnalyzedPost, AutoPostRule, CompetitorPost, GeneratedPost, Post,
    PostAnalysis, PostAnalytics, PostInsights, PostStatus, RemotePost, Settings,
};

/// Error type for content generator operations
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("Could not parse analysis: {0}")]
    AnalysisParse(String),
    #[error("Could not parse generated post: {0}")]
    GenerationParse(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GenerateError {
    /// Whether the backend answered but with an unusable shape
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            GenerateError::AnalysisParse(_) | GenerateError::GenerationParse(_)
        )
    }
}

/// Inputs for a generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub analysis: PostAnalysis,
    pub topic: Option<String>,
    pub is_thread: bool,
    pub custom_instructions: Option<String>,
}

/// Port for AI content generation backends
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Backend name for logs (e.g., "openai", "gemini")
    fn name(&self) -> &'static str;

    /// Derive a style fingerprint from a non-empty set of post bodies
    async fn analyze_posts(&self, posts: &[String]) -> Result<PostAnalysis, GenerateError>;

    /// Generate one post, or a 3-5 segment thread when requested
    async fn generate_post(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError>;

    /// Like `analyze_posts`, also extracting viral elements from engagement counts
    async fn analyze_competitor_posts(
        &self,
        posts: &[CompetitorPost],
    ) -> Result<PostAnalysis, GenerateError>;

    /// Like `generate_post`, weighted toward the analysis' viral elements
    async fn generate_viral_post(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError>;
}

/// Backends keyed by the persisted model selector
#[derive(Clone, Default)]
pub struct ContentGenerators {
    backends: HashMap<AiModel, Arc<dyn ContentGenerator>>,
}

impl ContentGenerators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model: AiModel, generator: Arc<dyn ContentGenerator>) -> Self {
        self.backends.insert(model, generator);
        self
    }

    /// Resolve the backend for a model selector
    pub fn select(&self, model: AiModel) -> Result<Arc<dyn ContentGenerator>, GenerateError> {
        self.backends.get(&model).cloned().ok_or_else(|| {
            GenerateError::Config(format!("no content generator configured for '{}'", model))
        })
    }

    pub fn models(&self) -> Vec<AiModel> {
        let mut models: Vec<AiModel> = self.backends.keys().copied().collect();
        models.sort_by_key(|m| m.as_str());
        models
    }
}

/// Error type for publisher operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Content too long: {len} > {max}")]
    ContentTooLong { len: usize, max: usize },
    #[error("Timeout")]
    Timeout,
    #[error("Publishing disabled: {0}")]
    Disabled(String),
}

/// Port for the external publishing platform, bound to one account
#[async_trait]
pub trait PublishingClient: Send + Sync {
    /// Platform user id of the authenticated account
    async fn get_user_id(&self) -> Result<String, PublishError>;

    /// Publish one post, optionally as a reply; returns the remote id
    async fn create_post(
        &self,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<String, PublishError>;

    /// Fixed pause between chained thread publishes
    fn thread_gap(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Publish texts as a reply chain, pausing `thread_gap` between calls
    async fn create_thread_posts(&self, texts: &[String]) -> Result<Vec<String>, PublishError> {
        let mut ids: Vec<String> = Vec::with_capacity(texts.len());

        for (index, text) in texts.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.thread_gap()).await;
            }
            let reply_to = ids.last().map(String::as_str);
            let id = self.create_post(text, reply_to).await?;
            tracing::debug!(position = index, remote_id = %id, "Published thread segment");
            ids.push(id);
        }

        Ok(ids)
    }

    /// Current engagement counts for a published post
    async fn get_post_insights(&self, post_id: &str) -> Result<PostInsights, PublishError>;

    /// Recent posts of a user id or username
    async fn get_user_posts(&self, user: &str, limit: usize)
    -> Result<Vec<RemotePost>, PublishError>;
}

/// Port that builds a publishing client for an account's credentials
pub trait PlatformConnector: Send + Sync {
    fn client_for(&self, account: &Account) -> Result<Arc<dyn PublishingClient>, PublishError>;

    /// Platform name (e.g., "threads", "stub")
    fn platform(&self) -> &'static str;
}

/// Error type for persistence operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert, or refresh username/token of the account with the same platform user id.
    /// Returns the stored account (keeping the existing id on refresh).
    async fn upsert_account(&self, account: &Account) -> Result<Account, StoreError>;

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Delete an account and everything it owns
    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError>;

    async fn update_post(&self, post: &Post) -> Result<(), StoreError>;

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, StoreError>;

    /// Posts of an account, newest first
    async fn list_posts(
        &self,
        account_id: Uuid,
        status: Option<PostStatus>,
    ) -> Result<Vec<Post>, StoreError>;

    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError>;

    /// SCHEDULED posts with `scheduled_for <= now`, oldest first
    async fn find_due_posts(&self, now: OffsetDateTime) -> Result<Vec<Post>, StoreError>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn insert_rule(&self, rule: &AutoPostRule) -> Result<(), StoreError>;

    async fn update_rule(&self, rule: &AutoPostRule) -> Result<(), StoreError>;

    async fn get_rule(&self, id: Uuid) -> Result<Option<AutoPostRule>, StoreError>;

    async fn list_rules(&self, account_id: Uuid) -> Result<Vec<AutoPostRule>, StoreError>;

    async fn delete_rule(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Enabled rules with `next_run_at <= now` and runs remaining
    async fn find_due_rules(&self, now: OffsetDateTime) -> Result<Vec<AutoPostRule>, StoreError>;

    /// Advance a rule after a successful execution in one write:
    /// sets last/next run, increments `run_count`, clears the error.
    async fn record_rule_run(
        &self,
        id: Uuid,
        ran_at: OffsetDateTime,
        next_run_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Mark a failed execution without touching the schedule
    async fn record_rule_failure(
        &self,
        id: Uuid,
        error: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert_analysis(&self, analysis: &AnalyzedPost) -> Result<(), StoreError>;

    async fn get_analysis(&self, id: Uuid) -> Result<Option<AnalyzedPost>, StoreError>;

    async fn latest_analysis(&self, account_id: Uuid) -> Result<Option<AnalyzedPost>, StoreError>;

    async fn list_analyses(&self, account_id: Uuid) -> Result<Vec<AnalyzedPost>, StoreError>;
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Insert or replace the snapshot for `analytics.post_id`
    async fn upsert_analytics(&self, analytics: &PostAnalytics) -> Result<(), StoreError>;

    async fn get_analytics(&self, post_id: Uuid) -> Result<Option<PostAnalytics>, StoreError>;

    /// Snapshots of an account, optionally bounded on `fetched_at` (inclusive)
    async fn list_analytics(
        &self,
        account_id: Uuid,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PostAnalytics>, StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self, account_id: Uuid) -> Result<Option<Settings>, StoreError>;

    async fn upsert_settings(&self, settings: &Settings) -> Result<(), StoreError>;
}

/// Everything the use cases need from persistence
pub trait Store:
    AccountStore + PostStore + RuleStore + AnalysisStore + AnalyticsStore + SettingsStore
{
}

impl<T> Store for T where
    T: AccountStore + PostStore + RuleStore + AnalysisStore + AnalyticsStore + SettingsStore
{
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
