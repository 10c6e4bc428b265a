//! Style analysis and manual draft generation

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::model::{
    Account, AiModel, AnalysisSource, AnalyzedPost, CompetitorPost, Post, PostAnalysis,
    PostStatus, compose_instructions,
};
use crate::policy::ContentPolicy;
use crate::ports::{Clock, ContentGenerators, GenerationRequest, PlatformConnector, Store};
use crate::usecases::error::ServiceError;
use crate::usecases::within;

/// How many of the account's own posts feed an analysis
pub const OWN_POSTS_LIMIT: usize = 25;
/// How many posts are sampled per competitor
pub const COMPETITOR_POSTS_LIMIT: usize = 20;

/// Input for a manually requested draft
#[derive(Debug, Clone, Default)]
pub struct DraftRequest {
    pub account_id: Uuid,
    pub topic: Option<String>,
    pub is_thread: bool,
    /// Analysis to imitate; the newest one for the account when absent
    pub analysis_id: Option<Uuid>,
    /// Prefer the viral generator when the analysis carries viral elements
    pub use_viral: bool,
    pub model: AiModel,
    pub custom_instructions: Option<String>,
}

pub struct GenerationService<S, P, Cl>
where
    S: Store + ?Sized,
    P: PlatformConnector + ?Sized,
    Cl: Clock + ?Sized,
{
    store: Arc<S>,
    connector: Arc<P>,
    generators: ContentGenerators,
    clock: Arc<Cl>,
    policy: ContentPolicy,
    call_timeout: Option<Duration>,
}

impl<S, P, Cl> GenerationService<S, P, Cl>
where
    S: Store + ?Sized,
    P: PlatformConnector + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        connector: Arc<P>,
        generators: ContentGenerators,
        clock: Arc<Cl>,
        policy: ContentPolicy,
    ) -> Self {
        Self {
            store,
            connector,
            generators,
            clock,
            policy,
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Analyze the account's own recent posts and store the fingerprint
    pub async fn analyze_own_posts(
        &self,
        account_id: Uuid,
        model: AiModel,
    ) -> Result<AnalyzedPost, ServiceError> {
        let account = self.require_account(account_id).await?;
        let client = self.connector.client_for(&account)?;

        let user_id = client.get_user_id().await?;
        let posts = client.get_user_posts(&user_id, OWN_POSTS_LIMIT).await?;
        let corpus: Vec<String> = posts
            .into_iter()
            .filter_map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .collect();

        if corpus.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "posts to analyze for account {}",
                account_id
            )));
        }

        tracing::info!(account_id = %account_id, count = corpus.len(), "Analyzing own posts");

        let generator = self.generators.select(model)?;
        let analysis = within(self.call_timeout, generator.analyze_posts(&corpus))
            .await
            .ok_or_else(|| ServiceError::Timeout("post analysis".to_string()))??;

        self.save(account_id, AnalysisSource::OwnPosts, corpus, analysis)
            .await
    }

    /// Analyze competitors' posts, skipping usernames that cannot be fetched
    pub async fn analyze_competitors(
        &self,
        account_id: Uuid,
        usernames: &[String],
        model: AiModel,
    ) -> Result<AnalyzedPost, ServiceError> {
        let usernames: Vec<String> = usernames
            .iter()
            .map(|u| u.trim().trim_start_matches('@').to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if usernames.is_empty() {
            return Err(ServiceError::Configuration(
                "at least one competitor username is required".to_string(),
            ));
        }

        let account = self.require_account(account_id).await?;
        let client = self.connector.client_for(&account)?;

        let mut samples: Vec<CompetitorPost> = Vec::new();
        for username in &usernames {
            match client.get_user_posts(username, COMPETITOR_POSTS_LIMIT).await {
                Ok(posts) => {
                    let before = samples.len();
                    samples.extend(posts.into_iter().filter_map(|p| p.into_competitor_post()));
                    tracing::debug!(username = %username, count = samples.len() - before, "Fetched competitor posts");
                }
                Err(e) => {
                    tracing::warn!(username = %username, error = %e, "Failed to fetch competitor posts");
                }
            }
        }

        if samples.is_empty() {
            return Err(ServiceError::NotFound(
                "posts from any competitor".to_string(),
            ));
        }

        let generator = self.generators.select(model)?;
        let analysis = within(self.call_timeout, generator.analyze_competitor_posts(&samples))
            .await
            .ok_or_else(|| ServiceError::Timeout("competitor analysis".to_string()))??;

        let corpus = samples.into_iter().map(|s| s.text).collect();
        self.save(account_id, AnalysisSource::Competitors(usernames), corpus, analysis)
            .await
    }

    pub async fn list_analyses(&self, account_id: Uuid) -> Result<Vec<AnalyzedPost>, ServiceError> {
        Ok(self.store.list_analyses(account_id).await?)
    }

    /// Generate a DRAFT post from a stored analysis
    pub async fn generate_draft(&self, request: DraftRequest) -> Result<Post, ServiceError> {
        self.require_account(request.account_id).await?;

        let analyzed = match request.analysis_id {
            Some(id) => self
                .store
                .get_analysis(id)
                .await?
                .filter(|a| a.account_id == request.account_id)
                .ok_or_else(|| ServiceError::not_found("analysis", id))?,
            None => self
                .store
                .latest_analysis(request.account_id)
                .await?
                .ok_or_else(|| ServiceError::AnalysisUnavailable(request.account_id.to_string()))?,
        };

        let settings = self.store.get_settings(request.account_id).await?;
        let base_prompt = settings.as_ref().and_then(|s| s.base_prompt.as_deref());
        let instructions = compose_instructions(base_prompt, request.custom_instructions.as_deref());

        let viral = request.use_viral && analyzed.analysis.has_viral_elements();
        let generation = GenerationRequest {
            analysis: analyzed.analysis,
            topic: request.topic,
            is_thread: request.is_thread,
            custom_instructions: instructions,
        };

        let generator = self.generators.select(request.model)?;
        tracing::info!(
            account_id = %request.account_id,
            analysis_id = %analyzed.id,
            backend = generator.name(),
            viral,
            "Generating draft"
        );

        let call = async {
            if viral {
                generator.generate_viral_post(&generation).await
            } else {
                generator.generate_post(&generation).await
            }
        };
        let generated = within(self.call_timeout, call)
            .await
            .ok_or_else(|| ServiceError::Timeout("draft generation".to_string()))??;
        let generated = self.policy.validate(&generated, request.is_thread)?;

        let post = Post::new(
            request.account_id,
            generated.content,
            generated.thread_posts,
            PostStatus::Draft,
            self.clock.now(),
        );
        self.store.insert_post(&post).await?;

        Ok(post)
    }

    async fn save(
        &self,
        account_id: Uuid,
        source: AnalysisSource,
        corpus: Vec<String>,
        analysis: PostAnalysis,
    ) -> Result<AnalyzedPost, ServiceError> {
        let analyzed = AnalyzedPost {
            id: Uuid::new_v4(),
            account_id,
            source,
            corpus,
            analysis,
            created_at: self.clock.now(),
        };
        self.store.insert_analysis(&analyzed).await?;

        tracing::info!(
            analysis_id = %analyzed.id,
            account_id = %account_id,
            source = %analyzed.source,
            "Stored analysis"
        );
        Ok(analyzed)
    }

    async fn require_account(&self, account_id: Uuid) -> Result<Account, ServiceError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account", account_id))
    }
}
