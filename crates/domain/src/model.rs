//! Domain models and value objects

use chrono_tz::Tz;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// A managed identity on the publishing platform
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    /// Platform-side user id returned by the OAuth exchange
    pub platform_user_id: String,
    pub username: String,
    /// Long-lived access token for the platform API
    pub access_token: SecretString,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Account {
    pub fn new(
        platform_user_id: impl Into<String>,
        username: impl Into<String>,
        access_token: SecretString,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            platform_user_id: platform_user_id.into(),
            username: username.into(),
            access_token,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lifecycle state of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Draft,
    Approved,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "DRAFT",
            PostStatus::Approved => "APPROVED",
            PostStatus::Scheduled => "SCHEDULED",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Failed => "FAILED",
        }
    }

    /// Whether the publish operation accepts a post in this state
    pub fn is_publishable(&self) -> bool {
        matches!(
            self,
            PostStatus::Draft | PostStatus::Approved | PostStatus::Scheduled
        )
    }

    /// Whether a post in this state may be (re)scheduled
    pub fn is_schedulable(&self) -> bool {
        !matches!(self, PostStatus::Published)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(PostStatus::Draft),
            "APPROVED" => Ok(PostStatus::Approved),
            "SCHEDULED" => Ok(PostStatus::Scheduled),
            "PUBLISHED" => Ok(PostStatus::Published),
            "FAILED" => Ok(PostStatus::Failed),
            other => Err(format!("unknown post status: {}", other)),
        }
    }
}

/// A unit of content, either a single post or the head of a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Text of the first (or only) post
    pub content: String,
    /// Ordered follow-up texts when the post is a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_posts: Option<Vec<String>>,
    pub status: PostStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_for: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    /// Remote id of the first published post
    #[serde(default)]
    pub threads_post_id: Option<String>,
    /// Error recorded by the last failed publish attempt
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Post {
    /// Create a new post in the given initial state
    pub fn new(
        account_id: Uuid,
        content: impl Into<String>,
        thread_posts: Option<Vec<String>>,
        status: PostStatus,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            content: content.into(),
            thread_posts: thread_posts.filter(|t| !t.is_empty()),
            status,
            scheduled_for: None,
            published_at: None,
            threads_post_id: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_thread(&self) -> bool {
        self.thread_posts.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// All texts to publish, head first
    pub fn segments(&self) -> Vec<String> {
        let mut segments = vec![self.content.clone()];
        if let Some(thread) = &self.thread_posts {
            segments.extend(thread.iter().cloned());
        }
        segments
    }

    pub fn mark_scheduled(&mut self, at: OffsetDateTime, now: OffsetDateTime) {
        self.status = PostStatus::Scheduled;
        self.scheduled_for = Some(at);
        self.updated_at = now;
    }

    pub fn mark_published(&mut self, remote_id: String, now: OffsetDateTime) {
        self.status = PostStatus::Published;
        self.published_at = Some(now);
        self.threads_post_id = Some(remote_id);
        self.last_error = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: String, now: OffsetDateTime) {
        self.status = PostStatus::Failed;
        self.last_error = Some(error);
        self.updated_at = now;
    }
}

/// A wall-clock time of day (`HH:MM`) interpreted in a rule's timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .filter(|(h, m)| is_two_digits(h) && is_two_digits(m))
            .ok_or_else(|| format!("invalid time '{}': expected HH:MM", s))?;
        let hour: u8 = h
            .parse()
            .map_err(|_| format!("invalid hour in '{}'", s))?;
        let minute: u8 = m
            .parse()
            .map_err(|_| format!("invalid minute in '{}'", s))?;
        ClockTime::new(hour, minute).ok_or_else(|| format!("time out of range: '{}'", s))
    }
}

fn is_two_digits(part: &str) -> bool {
    part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit())
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// How often an auto-post rule fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Custom,
    /// A stored value this build does not know; scheduled one day out
    Unrecognized,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Custom => "CUSTOM",
            Frequency::Unrecognized => "UNRECOGNIZED",
        }
    }

    /// Decode a stored value, mapping unknown tags to `Unrecognized`
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(frequency = %value, "Unrecognized stored frequency");
            Frequency::Unrecognized
        })
    }

    /// Whether next-run computation reads `scheduled_times`
    pub fn uses_clock_times(&self) -> bool {
        matches!(
            self,
            Frequency::Daily | Frequency::Weekly | Frequency::Monthly
        )
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOURLY" => Ok(Frequency::Hourly),
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "CUSTOM" => Ok(Frequency::Custom),
            other => Err(format!("unknown frequency: {}", other)),
        }
    }
}

/// Which content generation backend a rule or request uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiModel {
    #[serde(rename = "gemini")]
    Gemini,
    #[default]
    #[serde(rename = "openai", alias = "gpt-4")]
    OpenAi,
}

impl AiModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiModel::Gemini => "gemini",
            AiModel::OpenAi => "openai",
        }
    }
}

impl fmt::Display for AiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(AiModel::Gemini),
            "openai" | "gpt-4" | "gpt4" => Ok(AiModel::OpenAi),
            other => Err(format!("unknown AI model: {}", other)),
        }
    }
}

/// Outcome of the most recent execution of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRunState {
    #[default]
    NeverRun,
    Succeeded,
    /// Last attempt failed; the rule stays due and is retried next poll
    PendingRetry,
}

impl RuleRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleRunState::NeverRun => "never_run",
            RuleRunState::Succeeded => "succeeded",
            RuleRunState::PendingRetry => "pending_retry",
        }
    }
}

impl FromStr for RuleRunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never_run" => Ok(RuleRunState::NeverRun),
            "succeeded" => Ok(RuleRunState::Succeeded),
            "pending_retry" => Ok(RuleRunState::PendingRetry),
            other => Err(format!("unknown run state: {}", other)),
        }
    }
}

/// A recurring content-generation policy bound to one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPostRule {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub frequency: Frequency,
    pub scheduled_times: Vec<ClockTime>,
    pub timezone: Tz,
    pub auto_generate: bool,
    pub topic: Option<String>,
    pub custom_prompt: Option<String>,
    pub is_thread: bool,
    pub ai_model: AiModel,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_run_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub next_run_at: OffsetDateTime,
    pub run_count: u32,
    pub max_runs: Option<u32>,
    pub run_state: RuleRunState,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl AutoPostRule {
    /// True once `run_count` has reached `max_runs`
    pub fn is_exhausted(&self) -> bool {
        self.max_runs.is_some_and(|max| self.run_count >= max)
    }

    /// Due iff enabled, the trigger time has arrived, and runs remain
    pub fn is_due(&self, now: OffsetDateTime) -> bool {
        self.enabled && self.next_run_at <= now && !self.is_exhausted()
    }
}

/// Stylistic fingerprint of a corpus of posts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAnalysis {
    pub tone: Vec<String>,
    pub topics: Vec<String>,
    pub hashtags: Vec<String>,
    /// Average post length in characters
    pub avg_length: f64,
    pub structure: String,
    pub key_patterns: Vec<String>,
    /// Engagement signals; only present for competitor analyses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub viral_elements: Vec<String>,
}

impl PostAnalysis {
    pub fn has_viral_elements(&self) -> bool {
        !self.viral_elements.is_empty()
    }
}

/// Content produced by a generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPost {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_posts: Option<Vec<String>>,
}

impl GeneratedPost {
    /// Number of posts this result would publish
    pub fn segment_count(&self) -> usize {
        1 + self.thread_posts.as_ref().map_or(0, Vec::len)
    }
}

/// Where an analysis corpus came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "usernames", rename_all = "snake_case")]
pub enum AnalysisSource {
    OwnPosts,
    Competitors(Vec<String>),
}

impl fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisSource::OwnPosts => f.write_str("self"),
            AnalysisSource::Competitors(names) => {
                let tagged: Vec<String> = names.iter().map(|n| format!("@{}", n)).collect();
                f.write_str(&tagged.join(", "))
            }
        }
    }
}

/// A persisted analysis snapshot; immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedPost {
    pub id: Uuid,
    pub account_id: Uuid,
    pub source: AnalysisSource,
    /// Post texts the analysis was derived from
    pub corpus: Vec<String>,
    pub analysis: PostAnalysis,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A competitor post with its engagement counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorPost {
    pub text: String,
    pub like_count: u64,
    pub reply_count: u64,
    pub repost_count: u64,
}

/// A post read back from the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePost {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub reply_count: Option<u64>,
    #[serde(default)]
    pub repost_count: Option<u64>,
}

impl RemotePost {
    /// Convert to a competitor sample; posts without text are dropped
    pub fn into_competitor_post(self) -> Option<CompetitorPost> {
        let text = self.text.filter(|t| !t.trim().is_empty())?;
        Some(CompetitorPost {
            text,
            like_count: self.like_count.unwrap_or(0),
            reply_count: self.reply_count.unwrap_or(0),
            repost_count: self.repost_count.unwrap_or(0),
        })
    }
}

/// Engagement counts for one published post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostInsights {
    pub likes: u64,
    pub replies: u64,
    pub reposts: u64,
    pub quotes: u64,
    pub views: u64,
}

/// Current engagement snapshot for a post (one per post)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAnalytics {
    pub post_id: Uuid,
    pub account_id: Uuid,
    #[serde(flatten)]
    pub insights: PostInsights,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

/// Per-account preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub account_id: Uuid,
    /// Instructions prepended to every manual generation request
    pub base_prompt: Option<String>,
    pub theme: Option<String>,
    pub default_schedule: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Settings {
    pub fn empty(account_id: Uuid, now: OffsetDateTime) -> Self {
        Self {
            account_id,
            base_prompt: None,
            theme: None,
            default_schedule: None,
            updated_at: now,
        }
    }
}

/// Combine a base prompt with request-specific instructions
pub fn compose_instructions(base: Option<&str>, custom: Option<&str>) -> Option<String> {
    let base = base.map(str::trim).filter(|s| !s.is_empty());
    let custom = custom.map(str::trim).filter(|s| !s.is_empty());

    match (base, custom) {
        (Some(base), Some(custom)) => Some(format!(
            "{}\n\nAdditional instructions:\n{}",
            base, custom
        )),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

/// Outcome of one item in a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Failed,
    Skipped,
}

/// Result record for one rule or post processed by a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    /// Rule id or post id, depending on the sweep
    pub id: Uuid,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn success(id: Uuid) -> Self {
        Self {
            id,
            status: ItemStatus::Success,
            name: None,
            post_id: None,
            remote_id: None,
            error: None,
        }
    }

    pub fn failed(id: Uuid, error: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Failed,
            error: Some(error.into()),
            ..Self::success(id)
        }
    }

    pub fn skipped(id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Skipped,
            error: Some(reason.into()),
            ..Self::success(id)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Summary returned by each trigger entrypoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub processed_count: usize,
    pub results: Vec<ItemResult>,
}

impl RunSummary {
    pub fn push(&mut self, result: ItemResult) {
        self.results.push(result);
        self.processed_count = self.results.len();
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}
