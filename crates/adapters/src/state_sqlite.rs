//! SQLite store implementation

use async_trait::async_trait;
use chrono_tz::Tz;
use postpilot_domain::{
    Account, AccountStore, AiModel, AnalysisStore, AnalyticsStore, AnalyzedPost, AutoPostRule,
    ClockTime, Frequency, Post, PostAnalytics, PostInsights, PostStatus, PostStore, RuleStore,
    Settings, SettingsStore, StoreError,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        platform_user_id TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL,
        access_token TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        thread_posts TEXT CHECK (thread_posts IS NULL OR json_valid(thread_posts)),
        status TEXT NOT NULL,
        scheduled_for TEXT,
        published_at TEXT,
        threads_post_id TEXT,
        last_error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_posts_due
    ON posts(status, scheduled_for)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auto_post_rules (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT,
        enabled INTEGER NOT NULL,
        frequency TEXT NOT NULL,
        scheduled_times TEXT NOT NULL CHECK (json_valid(scheduled_times)),
        timezone TEXT NOT NULL,
        auto_generate INTEGER NOT NULL,
        topic TEXT,
        custom_prompt TEXT,
        is_thread INTEGER NOT NULL,
        ai_model TEXT NOT NULL,
        last_run_at TEXT,
        next_run_at TEXT NOT NULL,
        run_count INTEGER NOT NULL DEFAULT 0,
        max_runs INTEGER,
        run_state TEXT NOT NULL DEFAULT 'never_run',
        last_error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_rules_due
    ON auto_post_rules(enabled, next_run_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analyzed_posts (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        source TEXT NOT NULL CHECK (json_valid(source)),
        corpus TEXT NOT NULL CHECK (json_valid(corpus)),
        analysis TEXT NOT NULL CHECK (json_valid(analysis)),
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_analytics (
        post_id TEXT PRIMARY KEY REFERENCES posts(id) ON DELETE CASCADE,
        account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        likes INTEGER NOT NULL,
        replies INTEGER NOT NULL,
        reposts INTEGER NOT NULL,
        quotes INTEGER NOT NULL,
        views INTEGER NOT NULL,
        fetched_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        account_id TEXT PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
        base_prompt TEXT,
        theme TEXT,
        default_schedule TEXT,
        updated_at TEXT NOT NULL
    )
    "#,
];

const POST_COLUMNS: &str = "id, account_id, content, thread_posts, status, scheduled_for, \
     published_at, threads_post_id, last_error, created_at, updated_at";

const RULE_COLUMNS: &str = "id, account_id, name, description, enabled, frequency, \
     scheduled_times, timezone, auto_generate, topic, custom_prompt, is_thread, ai_model, \
     last_run_at, next_run_at, run_count, max_runs, run_state, last_error, created_at, updated_at";

/// SQLite-backed store for every persisted entity
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_error)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        }
        Ok(())
    }

    /// Cheap connectivity probe used by `doctor`
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn get_account_by_platform_id(
        &self,
        platform_user_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT id, platform_user_id, username, access_token, created_at, updated_at \
             FROM accounts WHERE platform_user_id = ?",
        )
        .bind(platform_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(account_from_row).transpose()
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn format_time(t: OffsetDateTime) -> Result<String, StoreError> {
    t.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn format_opt_time(t: Option<OffsetDateTime>) -> Result<Option<String>, StoreError> {
    t.map(format_time).transpose()
}

fn parse_time(s: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(s: &str) -> Result<T, StoreError> {
    serde_json::from_str(s).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(db_error)
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, StoreError> {
    let raw: String = get(row, column)?;
    Uuid::parse_str(&raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn get_time(row: &SqliteRow, column: &str) -> Result<OffsetDateTime, StoreError> {
    let raw: String = get(row, column)?;
    parse_time(&raw)
}

fn get_opt_time(row: &SqliteRow, column: &str) -> Result<Option<OffsetDateTime>, StoreError> {
    let raw: Option<String> = get(row, column)?;
    raw.as_deref().map(parse_time).transpose()
}

fn account_from_row(row: &SqliteRow) -> Result<Account, StoreError> {
    let token: String = get(row, "access_token")?;
    Ok(Account {
        id: get_uuid(row, "id")?,
        platform_user_id: get(row, "platform_user_id")?,
        username: get(row, "username")?,
        access_token: SecretString::new(token.into()),
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn post_from_row(row: &SqliteRow) -> Result<Post, StoreError> {
    let thread_posts: Option<String> = get(row, "thread_posts")?;
    let status: String = get(row, "status")?;
    Ok(Post {
        id: get_uuid(row, "id")?,
        account_id: get_uuid(row, "account_id")?,
        content: get(row, "content")?,
        thread_posts: thread_posts.as_deref().map(from_json).transpose()?,
        status: status.parse().map_err(StoreError::Serialization)?,
        scheduled_for: get_opt_time(row, "scheduled_for")?,
        published_at: get_opt_time(row, "published_at")?,
        threads_post_id: get(row, "threads_post_id")?,
        last_error: get(row, "last_error")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn rule_from_row(row: &SqliteRow) -> Result<AutoPostRule, StoreError> {
    let frequency: String = get(row, "frequency")?;
    let scheduled_times: String = get(row, "scheduled_times")?;
    let timezone: String = get(row, "timezone")?;
    let ai_model: String = get(row, "ai_model")?;
    let run_count: i64 = get(row, "run_count")?;
    let max_runs: Option<i64> = get(row, "max_runs")?;
    let run_state: String = get(row, "run_state")?;

    Ok(AutoPostRule {
        id: get_uuid(row, "id")?,
        account_id: get_uuid(row, "account_id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        enabled: get(row, "enabled")?,
        frequency: Frequency::from_stored(&frequency),
        scheduled_times: from_json::<Vec<ClockTime>>(&scheduled_times)?,
        timezone: timezone
            .parse::<Tz>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        auto_generate: get(row, "auto_generate")?,
        topic: get(row, "topic")?,
        custom_prompt: get(row, "custom_prompt")?,
        is_thread: get(row, "is_thread")?,
        ai_model: ai_model
            .parse::<AiModel>()
            .map_err(StoreError::Serialization)?,
        last_run_at: get_opt_time(row, "last_run_at")?,
        next_run_at: get_time(row, "next_run_at")?,
        run_count: u32::try_from(run_count).map_err(|e| StoreError::Serialization(e.to_string()))?,
        max_runs: max_runs
            .map(u32::try_from)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        run_state: run_state.parse().map_err(StoreError::Serialization)?,
        last_error: get(row, "last_error")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn analysis_from_row(row: &SqliteRow) -> Result<AnalyzedPost, StoreError> {
    let source: String = get(row, "source")?;
    let corpus: String = get(row, "corpus")?;
    let analysis: String = get(row, "analysis")?;
    Ok(AnalyzedPost {
        id: get_uuid(row, "id")?,
        account_id: get_uuid(row, "account_id")?,
        source: from_json(&source)?,
        corpus: from_json(&corpus)?,
        analysis: from_json(&analysis)?,
        created_at: get_time(row, "created_at")?,
    })
}

fn analytics_from_row(row: &SqliteRow) -> Result<PostAnalytics, StoreError> {
    let count = |column: &str| -> Result<u64, StoreError> {
        let value: i64 = get(row, column)?;
        u64::try_from(value).map_err(|e| StoreError::Serialization(e.to_string()))
    };
    Ok(PostAnalytics {
        post_id: get_uuid(row, "post_id")?,
        account_id: get_uuid(row, "account_id")?,
        insights: PostInsights {
            likes: count("likes")?,
            replies: count("replies")?,
            reposts: count("reposts")?,
            quotes: count("quotes")?,
            views: count("views")?,
        },
        fetched_at: get_time(row, "fetched_at")?,
    })
}

fn settings_from_row(row: &SqliteRow) -> Result<Settings, StoreError> {
    Ok(Settings {
        account_id: get_uuid(row, "account_id")?,
        base_prompt: get(row, "base_prompt")?,
        theme: get(row, "theme")?,
        default_schedule: get(row, "default_schedule")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn rows_into<T>(
    rows: Vec<SqliteRow>,
    map: fn(&SqliteRow) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    rows.iter().map(map).collect()
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn upsert_account(&self, account: &Account) -> Result<Account, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, platform_user_id, username, access_token, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(platform_user_id) DO UPDATE SET
                username = excluded.username,
                access_token = excluded.access_token,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.platform_user_id)
        .bind(&account.username)
        .bind(account.access_token.expose_secret())
        .bind(format_time(account.created_at)?)
        .bind(format_time(account.updated_at)?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_account_by_platform_id(&account.platform_user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account.platform_user_id)))
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT id, platform_user_id, username, access_token, created_at, updated_at \
             FROM accounts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, platform_user_id, username, access_token, created_at, updated_at \
             FROM accounts ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows_into(rows, account_from_row)
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let thread_posts = post.thread_posts.as_ref().map(to_json).transpose()?;
        sqlx::query(&format!(
            "INSERT INTO posts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            POST_COLUMNS
        ))
        .bind(post.id.to_string())
        .bind(post.account_id.to_string())
        .bind(&post.content)
        .bind(thread_posts)
        .bind(post.status.as_str())
        .bind(format_opt_time(post.scheduled_for)?)
        .bind(format_opt_time(post.published_at)?)
        .bind(&post.threads_post_id)
        .bind(&post.last_error)
        .bind(format_time(post.created_at)?)
        .bind(format_time(post.updated_at)?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_post(&self, post: &Post) -> Result<(), StoreError> {
        let thread_posts = post.thread_posts.as_ref().map(to_json).transpose()?;
        let result = sqlx::query(
            r#"
            UPDATE posts SET
                content = ?, thread_posts = ?, status = ?, scheduled_for = ?,
                published_at = ?, threads_post_id = ?, last_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.content)
        .bind(thread_posts)
        .bind(post.status.as_str())
        .bind(format_opt_time(post.scheduled_for)?)
        .bind(format_opt_time(post.published_at)?)
        .bind(&post.threads_post_id)
        .bind(&post.last_error)
        .bind(format_time(post.updated_at)?)
        .bind(post.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("post {}", post.id)));
        }
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_posts(
        &self,
        account_id: Uuid,
        status: Option<PostStatus>,
    ) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE account_id = ? AND (? IS NULL OR status = ?) \
             ORDER BY julianday(created_at) DESC",
            POST_COLUMNS
        ))
        .bind(account_id.to_string())
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows_into(rows, post_from_row)
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_due_posts(&self, now: OffsetDateTime) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts \
             WHERE status = ? AND scheduled_for IS NOT NULL \
               AND julianday(scheduled_for) <= julianday(?) \
             ORDER BY julianday(scheduled_for)",
            POST_COLUMNS
        ))
        .bind(PostStatus::Scheduled.as_str())
        .bind(format_time(now)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows_into(rows, post_from_row)
    }
}

#[async_trait]
impl RuleStore for SqliteStore {
    async fn insert_rule(&self, rule: &AutoPostRule) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO auto_post_rules ({}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            RULE_COLUMNS
        ))
        .bind(rule.id.to_string())
        .bind(rule.account_id.to_string())
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.enabled)
        .bind(rule.frequency.as_str())
        .bind(to_json(&rule.scheduled_times)?)
        .bind(rule.timezone.name())
        .bind(rule.auto_generate)
        .bind(&rule.topic)
        .bind(&rule.custom_prompt)
        .bind(rule.is_thread)
        .bind(rule.ai_model.as_str())
        .bind(format_opt_time(rule.last_run_at)?)
        .bind(format_time(rule.next_run_at)?)
        .bind(i64::from(rule.run_count))
        .bind(rule.max_runs.map(i64::from))
        .bind(rule.run_state.as_str())
        .bind(&rule.last_error)
        .bind(format_time(rule.created_at)?)
        .bind(format_time(rule.updated_at)?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_rule(&self, rule: &AutoPostRule) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auto_post_rules SET
                name = ?, description = ?, enabled = ?, frequency = ?, scheduled_times = ?,
                timezone = ?, auto_generate = ?, topic = ?, custom_prompt = ?, is_thread = ?,
                ai_model = ?, last_run_at = ?, next_run_at = ?, run_count = ?, max_runs = ?,
                run_state = ?, last_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.enabled)
        .bind(rule.frequency.as_str())
        .bind(to_json(&rule.scheduled_times)?)
        .bind(rule.timezone.name())
        .bind(rule.auto_generate)
        .bind(&rule.topic)
        .bind(&rule.custom_prompt)
        .bind(rule.is_thread)
        .bind(rule.ai_model.as_str())
        .bind(format_opt_time(rule.last_run_at)?)
        .bind(format_time(rule.next_run_at)?)
        .bind(i64::from(rule.run_count))
        .bind(rule.max_runs.map(i64::from))
        .bind(rule.run_state.as_str())
        .bind(&rule.last_error)
        .bind(format_time(rule.updated_at)?)
        .bind(rule.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("rule {}", rule.id)));
        }
        Ok(())
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<AutoPostRule>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM auto_post_rules WHERE id = ?",
            RULE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(rule_from_row).transpose()
    }

    async fn list_rules(&self, account_id: Uuid) -> Result<Vec<AutoPostRule>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM auto_post_rules WHERE account_id = ? \
             ORDER BY julianday(created_at) DESC",
            RULE_COLUMNS
        ))
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows_into(rows, rule_from_row)
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM auto_post_rules WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_due_rules(&self, now: OffsetDateTime) -> Result<Vec<AutoPostRule>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM auto_post_rules \
             WHERE enabled = 1 \
               AND julianday(next_run_at) <= julianday(?) \
               AND (max_runs IS NULL OR run_count < max_runs) \
             ORDER BY julianday(next_run_at)",
            RULE_COLUMNS
        ))
        .bind(format_time(now)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows_into(rows, rule_from_row)
    }

    async fn record_rule_run(
        &self,
        id: Uuid,
        ran_at: OffsetDateTime,
        next_run_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let ran_at = format_time(ran_at)?;
        let result = sqlx::query(
            r#"
            UPDATE auto_post_rules SET
                last_run_at = ?, next_run_at = ?, run_count = run_count + 1,
                run_state = 'succeeded', last_error = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&ran_at)
        .bind(format_time(next_run_at)?)
        .bind(&ran_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("rule {}", id)));
        }
        Ok(())
    }

    async fn record_rule_failure(
        &self,
        id: Uuid,
        error: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auto_post_rules SET
                run_state = 'pending_retry', last_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(format_time(at)?)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("rule {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for SqliteStore {
    async fn insert_analysis(&self, analysis: &AnalyzedPost) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO analyzed_posts (id, account_id, source, corpus, analysis, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(analysis.id.to_string())
        .bind(analysis.account_id.to_string())
        .bind(to_json(&analysis.source)?)
        .bind(to_json(&analysis.corpus)?)
        .bind(to_json(&analysis.analysis)?)
        .bind(format_time(analysis.created_at)?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<AnalyzedPost>, StoreError> {
        let row = sqlx::query(
            "SELECT id, account_id, source, corpus, analysis, created_at \
             FROM analyzed_posts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(analysis_from_row).transpose()
    }

    async fn latest_analysis(&self, account_id: Uuid) -> Result<Option<AnalyzedPost>, StoreError> {
        let row = sqlx::query(
            "SELECT id, account_id, source, corpus, analysis, created_at \
             FROM analyzed_posts WHERE account_id = ? \
             ORDER BY julianday(created_at) DESC, rowid DESC LIMIT 1",
        )
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(analysis_from_row).transpose()
    }

    async fn list_analyses(&self, account_id: Uuid) -> Result<Vec<AnalyzedPost>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, account_id, source, corpus, analysis, created_at \
             FROM analyzed_posts WHERE account_id = ? \
             ORDER BY julianday(created_at) DESC, rowid DESC",
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows_into(rows, analysis_from_row)
    }
}

#[async_trait]
impl AnalyticsStore for SqliteStore {
    async fn upsert_analytics(&self, analytics: &PostAnalytics) -> Result<(), StoreError> {
        let count = |value: u64| {
            i64::try_from(value).map_err(|e| StoreError::Serialization(e.to_string()))
        };
        let insights = &analytics.insights;

        sqlx::query(
            r#"
            INSERT INTO post_analytics
            (post_id, account_id, likes, replies, reposts, quotes, views, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(post_id) DO UPDATE SET
                likes = excluded.likes,
                replies = excluded.replies,
                reposts = excluded.reposts,
                quotes = excluded.quotes,
                views = excluded.views,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(analytics.post_id.to_string())
        .bind(analytics.account_id.to_string())
        .bind(count(insights.likes)?)
        .bind(count(insights.replies)?)
        .bind(count(insights.reposts)?)
        .bind(count(insights.quotes)?)
        .bind(count(insights.views)?)
        .bind(format_time(analytics.fetched_at)?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_analytics(&self, post_id: Uuid) -> Result<Option<PostAnalytics>, StoreError> {
        let row = sqlx::query(
            "SELECT post_id, account_id, likes, replies, reposts, quotes, views, fetched_at \
             FROM post_analytics WHERE post_id = ?",
        )
        .bind(post_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(analytics_from_row).transpose()
    }

    async fn list_analytics(
        &self,
        account_id: Uuid,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PostAnalytics>, StoreError> {
        let from = format_opt_time(from)?;
        let to = format_opt_time(to)?;

        let rows = sqlx::query(
            r#"
            SELECT post_id, account_id, likes, replies, reposts, quotes, views, fetched_at
            FROM post_analytics
            WHERE account_id = ?
              AND (? IS NULL OR julianday(fetched_at) >= julianday(?))
              AND (? IS NULL OR julianday(fetched_at) <= julianday(?))
            ORDER BY julianday(fetched_at) DESC
            "#,
        )
        .bind(account_id.to_string())
        .bind(&from)
        .bind(&from)
        .bind(&to)
        .bind(&to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows_into(rows, analytics_from_row)
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_settings(&self, account_id: Uuid) -> Result<Option<Settings>, StoreError> {
        let row = sqlx::query(
            "SELECT account_id, base_prompt, theme, default_schedule, updated_at \
             FROM settings WHERE account_id = ?",
        )
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(settings_from_row).transpose()
    }

    async fn upsert_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO settings (account_id, base_prompt, theme, default_schedule, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                base_prompt = excluded.base_prompt,
                theme = excluded.theme,
                default_schedule = excluded.default_schedule,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(settings.account_id.to_string())
        .bind(&settings.base_prompt)
        .bind(&settings.theme)
        .bind(&settings.default_schedule)
        .bind(format_time(settings.updated_at)?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}
