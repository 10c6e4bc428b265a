//! In-memory fakes shared by the use case tests

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::*;
use crate::ports::*;

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
    posts: Mutex<HashMap<Uuid, Post>>,
    rules: Mutex<HashMap<Uuid, AutoPostRule>>,
    analyses: Mutex<Vec<AnalyzedPost>>,
    analytics: Mutex<HashMap<Uuid, PostAnalytics>>,
    settings: Mutex<HashMap<Uuid, Settings>>,
    pub fail_selection: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn post(&self, id: Uuid) -> Post {
        self.posts.lock().unwrap()[&id].clone()
    }

    pub fn rule(&self, id: Uuid) -> AutoPostRule {
        self.rules.lock().unwrap()[&id].clone()
    }

    pub fn all_posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn upsert_account(&self, account: &Account) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        let existing = accounts
            .values_mut()
            .find(|a| a.platform_user_id == account.platform_user_id);
        if let Some(existing) = existing {
            existing.username = account.username.clone();
            existing.access_token = account.access_token.clone();
            existing.updated_at = account.updated_at;
            return Ok(existing.clone());
        }
        accounts.insert(account.id, account.clone());
        Ok(account.clone())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.lock().unwrap().get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.accounts.lock().unwrap().values().cloned().collect())
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError> {
        let removed = self.accounts.lock().unwrap().remove(&id).is_some();
        self.posts.lock().unwrap().retain(|_, p| p.account_id != id);
        self.rules.lock().unwrap().retain(|_, r| r.account_id != id);
        self.analyses.lock().unwrap().retain(|a| a.account_id != id);
        self.analytics.lock().unwrap().retain(|_, a| a.account_id != id);
        self.settings.lock().unwrap().remove(&id);
        Ok(removed)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        self.posts.lock().unwrap().insert(post.id, post.clone());
        Ok(())
    }

    async fn update_post(&self, post: &Post) -> Result<(), StoreError> {
        let mut posts = self.posts.lock().unwrap();
        match posts.get_mut(&post.id) {
            Some(stored) => {
                *stored = post.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("post {}", post.id))),
        }
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.lock().unwrap().get(&id).cloned())
    }

    async fn list_posts(
        &self,
        account_id: Uuid,
        status: Option<PostStatus>,
    ) -> Result<Vec<Post>, StoreError> {
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.account_id == account_id && status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.posts.lock().unwrap().remove(&id).is_some())
    }

    async fn find_due_posts(&self, now: OffsetDateTime) -> Result<Vec<Post>, StoreError> {
        if self.fail_selection.load(Ordering::SeqCst) {
            return Err(StoreError::Database("selection failed".to_string()));
        }
        let mut due: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .values()
            .filter(|p| {
                p.status == PostStatus::Scheduled && p.scheduled_for.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|p| p.scheduled_for);
        Ok(due)
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn insert_rule(&self, rule: &AutoPostRule) -> Result<(), StoreError> {
        self.rules.lock().unwrap().insert(rule.id, rule.clone());
        Ok(())
    }

    async fn update_rule(&self, rule: &AutoPostRule) -> Result<(), StoreError> {
        self.rules.lock().unwrap().insert(rule.id, rule.clone());
        Ok(())
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<AutoPostRule>, StoreError> {
        Ok(self.rules.lock().unwrap().get(&id).cloned())
    }

    async fn list_rules(&self, account_id: Uuid) -> Result<Vec<AutoPostRule>, StoreError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rules.lock().unwrap().remove(&id).is_some())
    }

    async fn find_due_rules(&self, now: OffsetDateTime) -> Result<Vec<AutoPostRule>, StoreError> {
        if self.fail_selection.load(Ordering::SeqCst) {
            return Err(StoreError::Database("selection failed".to_string()));
        }
        let mut due: Vec<AutoPostRule> = self
            .rules
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.next_run_at);
        Ok(due)
    }

    async fn record_rule_run(
        &self,
        id: Uuid,
        ran_at: OffsetDateTime,
        next_run_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("rule {}", id)))?;
        rule.last_run_at = Some(ran_at);
        rule.next_run_at = next_run_at;
        rule.run_count += 1;
        rule.run_state = RuleRunState::Succeeded;
        rule.last_error = None;
        rule.updated_at = ran_at;
        Ok(())
    }

    async fn record_rule_failure(
        &self,
        id: Uuid,
        error: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("rule {}", id)))?;
        rule.run_state = RuleRunState::PendingRetry;
        rule.last_error = Some(error.to_string());
        rule.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn insert_analysis(&self, analysis: &AnalyzedPost) -> Result<(), StoreError> {
        self.analyses.lock().unwrap().push(analysis.clone());
        Ok(())
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<AnalyzedPost>, StoreError> {
        Ok(self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn latest_analysis(&self, account_id: Uuid) -> Result<Option<AnalyzedPost>, StoreError> {
        Ok(self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.account_id == account_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn list_analyses(&self, account_id: Uuid) -> Result<Vec<AnalyzedPost>, StoreError> {
        Ok(self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn upsert_analytics(&self, analytics: &PostAnalytics) -> Result<(), StoreError> {
        self.analytics
            .lock()
            .unwrap()
            .insert(analytics.post_id, analytics.clone());
        Ok(())
    }

    async fn get_analytics(&self, post_id: Uuid) -> Result<Option<PostAnalytics>, StoreError> {
        Ok(self.analytics.lock().unwrap().get(&post_id).cloned())
    }

    async fn list_analytics(
        &self,
        account_id: Uuid,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PostAnalytics>, StoreError> {
        Ok(self
            .analytics
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.account_id == account_id)
            .filter(|a| from.is_none_or(|f| a.fetched_at >= f))
            .filter(|a| to.is_none_or(|t| a.fetched_at <= t))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_settings(&self, account_id: Uuid) -> Result<Option<Settings>, StoreError> {
        Ok(self.settings.lock().unwrap().get(&account_id).cloned())
    }

    async fn upsert_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.settings
            .lock()
            .unwrap()
            .insert(settings.account_id, settings.clone());
        Ok(())
    }
}

pub fn sample_analysis() -> PostAnalysis {
    PostAnalysis {
        tone: vec!["casual".to_string()],
        topics: vec!["rust".to_string()],
        hashtags: vec!["#rustlang".to_string()],
        avg_length: 120.0,
        structure: "hook then list".to_string(),
        key_patterns: vec!["questions".to_string()],
        viral_elements: vec![],
    }
}

/// Scriptable generator; falls back to a valid post when no outcome is queued
pub struct FakeGenerator {
    pub outcomes: Mutex<VecDeque<Result<GeneratedPost, GenerateError>>>,
    pub analysis: PostAnalysis,
    pub calls: Mutex<Vec<&'static str>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub delay: Option<Duration>,
}

impl FakeGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_delay(None))
    }

    pub fn with_delay(delay: Option<Duration>) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            analysis: sample_analysis(),
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            delay,
        }
    }

    pub fn push(&self, outcome: Result<GeneratedPost, GenerateError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    async fn generate(
        &self,
        call: &'static str,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(call);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(outcome) = self.outcomes.lock().unwrap().pop_front() {
            return outcome;
        }
        let thread_posts = request
            .is_thread
            .then(|| vec!["second".to_string(), "third".to_string()]);
        Ok(GeneratedPost {
            content: format!("generated about {}", request.topic.as_deref().unwrap_or("anything")),
            thread_posts,
        })
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn analyze_posts(&self, posts: &[String]) -> Result<PostAnalysis, GenerateError> {
        self.calls.lock().unwrap().push("analyze_posts");
        if posts.is_empty() {
            return Err(GenerateError::AnalysisParse("empty corpus".to_string()));
        }
        Ok(self.analysis.clone())
    }

    async fn generate_post(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError> {
        self.generate("generate_post", request).await
    }

    async fn analyze_competitor_posts(
        &self,
        posts: &[CompetitorPost],
    ) -> Result<PostAnalysis, GenerateError> {
        self.calls.lock().unwrap().push("analyze_competitor_posts");
        let mut analysis = self.analysis.clone();
        analysis.viral_elements = vec![format!("{} samples", posts.len())];
        Ok(analysis)
    }

    async fn generate_viral_post(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError> {
        self.generate("generate_viral_post", request).await
    }
}

/// Recording publisher; texts listed in `failing_texts` are rejected
pub struct FakePublisher {
    pub calls: Mutex<Vec<(String, Option<String>)>>,
    pub failing_texts: Mutex<Vec<String>>,
    pub failing_users: Vec<String>,
    pub user_posts: Vec<RemotePost>,
    pub insights: PostInsights,
    pub gap: Duration,
    pub delay: Option<Duration>,
    next_id: AtomicUsize,
}

impl Default for FakePublisher {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing_texts: Mutex::new(Vec::new()),
            failing_users: Vec::new(),
            user_posts: Vec::new(),
            insights: PostInsights::default(),
            gap: Duration::from_secs(1),
            delay: None,
            next_id: AtomicUsize::new(1),
        }
    }
}

impl FakePublisher {
    /// Publisher whose every `create_post` sleeps for `delay` first
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn with_user_posts(mut self, posts: Vec<RemotePost>) -> Self {
        self.user_posts = posts;
        self
    }

    pub fn with_failing_user(mut self, user: &str) -> Self {
        self.failing_users.push(user.to_string());
        self
    }

    pub fn with_insights(mut self, insights: PostInsights) -> Self {
        self.insights = insights;
        self
    }

    pub fn fail_on(&self, text: &str) {
        self.failing_texts.lock().unwrap().push(text.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishingClient for FakePublisher {
    async fn get_user_id(&self) -> Result<String, PublishError> {
        Ok("me".to_string())
    }

    async fn create_post(
        &self,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<String, PublishError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), reply_to_id.map(String::from)));
        if self.failing_texts.lock().unwrap().iter().any(|t| t == text) {
            return Err(PublishError::Api(format!("rejected: {}", text)));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("remote-{}", n))
    }

    fn thread_gap(&self) -> Duration {
        self.gap
    }

    async fn get_post_insights(&self, post_id: &str) -> Result<PostInsights, PublishError> {
        if post_id.starts_with("gone") {
            return Err(PublishError::Api(format!("unknown post {}", post_id)));
        }
        Ok(self.insights)
    }

    async fn get_user_posts(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<RemotePost>, PublishError> {
        if self.failing_users.iter().any(|u| u == user) {
            return Err(PublishError::Api(format!("unknown user {}", user)));
        }
        Ok(self.user_posts.iter().take(limit).cloned().collect())
    }
}

pub struct FakeConnector {
    pub publisher: Arc<FakePublisher>,
}

impl FakeConnector {
    pub fn new(publisher: FakePublisher) -> Arc<Self> {
        Arc::new(Self {
            publisher: Arc::new(publisher),
        })
    }
}

impl PlatformConnector for FakeConnector {
    fn client_for(&self, _account: &Account) -> Result<Arc<dyn PublishingClient>, PublishError> {
        let client: Arc<dyn PublishingClient> = self.publisher.clone();
        Ok(client)
    }

    fn platform(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeClock {
    pub time: Mutex<OffsetDateTime>,
}

impl FakeClock {
    pub fn at(time: OffsetDateTime) -> Arc<Self> {
        Arc::new(Self {
            time: Mutex::new(time),
        })
    }

    pub fn set(&self, time: OffsetDateTime) {
        *self.time.lock().unwrap() = time;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> OffsetDateTime {
        *self.time.lock().unwrap()
    }
}

pub fn remote_post(id: &str, text: &str) -> RemotePost {
    RemotePost {
        id: id.to_string(),
        text: Some(text.to_string()),
        timestamp: None,
        permalink: None,
        like_count: Some(3),
        reply_count: Some(1),
        repost_count: Some(0),
    }
}

pub async fn seed_account(store: &MemoryStore, now: OffsetDateTime) -> Account {
    let account = Account::new("1001", "tester", SecretString::new("token".into()), now);
    store.upsert_account(&account).await.unwrap()
}

pub async fn seed_analysis(store: &MemoryStore, account_id: Uuid, now: OffsetDateTime) -> AnalyzedPost {
    let analyzed = AnalyzedPost {
        id: Uuid::new_v4(),
        account_id,
        source: AnalysisSource::OwnPosts,
        corpus: vec!["old post".to_string()],
        analysis: sample_analysis(),
        created_at: now,
    };
    store.insert_analysis(&analyzed).await.unwrap();
    analyzed
}
