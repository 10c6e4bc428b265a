//! Wiring of adapters into the domain services

use anyhow::{Context, Result, bail};
use postpilot_adapters::llm::{self, GeminiGenerator, OpenAiGenerator, StubGenerator};
use postpilot_adapters::state::SqliteStore;
use postpilot_adapters::threads::{self, StubConnector, ThreadsConnector};
use postpilot_domain::policy::{ContentPolicy, PolicyConfig};
use postpilot_domain::usecases::{
    AccountService, AnalyticsService, AutoPoster, GenerationService, PostService, RuleService,
    SettingsService,
};
use postpilot_domain::{AiModel, ContentGenerators, PlatformConnector, SystemClock};
use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;

pub type Posts = PostService<SqliteStore, dyn PlatformConnector, SystemClock>;

/// Everything a command needs, built once from configuration
pub struct App {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub connector: Arc<dyn PlatformConnector>,
    pub generators: ContentGenerators,
    pub clock: Arc<SystemClock>,
    pub policy: ContentPolicy,
}

impl App {
    pub async fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let store = Arc::new(
            SqliteStore::new(&config.general.database_path)
                .await
                .context("Failed to initialize SQLite store")?,
        );
        let connector = build_connector(&config)?;
        let generators = build_generators(&config);
        let policy = ContentPolicy::new(PolicyConfig {
            max_chars: config.threads.max_chars,
            ..PolicyConfig::default()
        });

        Ok(Self {
            config,
            store,
            connector,
            generators,
            clock: Arc::new(SystemClock),
            policy,
        })
    }

    pub fn accounts(&self) -> AccountService<SqliteStore, SystemClock> {
        AccountService::new(self.store.clone(), self.clock.clone())
    }

    pub fn settings(&self) -> SettingsService<SqliteStore, SystemClock> {
        SettingsService::new(self.store.clone(), self.clock.clone())
    }

    pub fn rules(&self) -> RuleService<SqliteStore, SystemClock> {
        RuleService::new(self.store.clone(), self.clock.clone())
    }

    pub fn posts(&self) -> Posts {
        PostService::new(
            self.store.clone(),
            self.connector.clone(),
            self.clock.clone(),
        )
        .with_call_timeout(self.config.scheduler.call_timeout())
    }

    pub fn auto_poster(&self) -> AutoPoster<SqliteStore, dyn PlatformConnector, SystemClock> {
        AutoPoster::new(
            self.store.clone(),
            self.generators.clone(),
            self.posts(),
            self.clock.clone(),
            self.policy.clone(),
        )
        .with_call_timeout(self.config.scheduler.call_timeout())
    }

    pub fn generation(&self) -> GenerationService<SqliteStore, dyn PlatformConnector, SystemClock> {
        GenerationService::new(
            self.store.clone(),
            self.connector.clone(),
            self.generators.clone(),
            self.clock.clone(),
            self.policy.clone(),
        )
        .with_call_timeout(self.config.scheduler.call_timeout())
    }

    pub fn analytics(&self) -> AnalyticsService<SqliteStore, dyn PlatformConnector, SystemClock> {
        AnalyticsService::new(
            self.store.clone(),
            self.connector.clone(),
            self.clock.clone(),
        )
        .with_call_timeout(self.config.scheduler.call_timeout())
    }

    /// Model used when a command does not name one
    pub fn model_or_default(&self, model: Option<AiModel>) -> AiModel {
        model.unwrap_or(self.config.llm.default_model)
    }
}

fn build_connector(config: &AppConfig) -> Result<Arc<dyn PlatformConnector>> {
    match config.threads.provider.as_str() {
        "threads" => {
            let threads_config = threads::ThreadsConfig {
                base_url: config.threads.base_url.clone(),
                timeout_secs: config.threads.timeout_secs,
                thread_gap_ms: config.threads.thread_gap_ms,
                max_chars: config.threads.max_chars,
            };
            Ok(Arc::new(ThreadsConnector::new(threads_config)))
        }
        "stub" => Ok(Arc::new(StubConnector::new(true))),
        other => bail!("Unknown threads provider: {}", other),
    }
}

/// Register a backend per model whose API key is available
pub(crate) fn build_generators(config: &AppConfig) -> ContentGenerators {
    if config.llm.use_stub {
        let stub = Arc::new(StubGenerator::new());
        return ContentGenerators::new()
            .with(AiModel::OpenAi, stub.clone())
            .with(AiModel::Gemini, stub);
    }

    let mut generators = ContentGenerators::new();

    match load_api_key(&config.llm.openai.api_key_env, "openai") {
        Ok(api_key) => {
            let generator = OpenAiGenerator::with_base_url(
                api_key,
                config.llm.openai.base_url.clone(),
                adapter_llm_config(config, &config.llm.openai.model),
            );
            generators = generators.with(AiModel::OpenAi, Arc::new(generator));
        }
        Err(e) => tracing::debug!(error = %e, "OpenAI backend not configured"),
    }

    match load_api_key(&config.llm.gemini.api_key_env, "gemini") {
        Ok(api_key) => {
            let generator = GeminiGenerator::with_base_url(
                api_key,
                config.llm.gemini.base_url.clone(),
                adapter_llm_config(config, &config.llm.gemini.model),
            );
            generators = generators.with(AiModel::Gemini, Arc::new(generator));
        }
        Err(e) => tracing::debug!(error = %e, "Gemini backend not configured"),
    }

    generators
}

fn adapter_llm_config(config: &AppConfig, model: &str) -> llm::LlmConfig {
    llm::LlmConfig {
        model: model.to_string(),
        temperatures: config.llm.temperatures,
        max_output_tokens: config.llm.max_output_tokens,
        timeout_secs: config.llm.timeout_secs,
        retries: config.llm.retries,
    }
}

pub(crate) fn load_api_key(env_var: &str, provider: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No API key env var configured for provider {}", provider);
    }

    let key = std::env::var(env_var).with_context(|| {
        format!(
            "Missing API key env var {} for provider {}",
            env_var, provider
        )
    })?;

    if key.trim().is_empty() {
        bail!(
            "API key env var {} is empty for provider {}",
            env_var,
            provider
        );
    }

    Ok(SecretString::new(key.into()))
}
