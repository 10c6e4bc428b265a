//! Configuration loading and management

use anyhow::{Context, Result};
use postpilot_adapters::llm::TaskTemperatures;
use postpilot_adapters::threads::DEFAULT_BASE_URL as THREADS_BASE_URL;
use postpilot_domain::AiModel;
use postpilot_domain::policy::DEFAULT_MAX_CHARS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub threads: ThreadsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Bound on each generation or publish call; 0 disables
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub run_rules: bool,

    #[serde(default = "default_true")]
    pub run_posts: bool,
}

impl SchedulerConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub default_model: AiModel,

    /// Serve every model with the offline stub generator
    #[serde(default)]
    pub use_stub: bool,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_llm_retries")]
    pub retries: u32,

    #[serde(default)]
    pub temperatures: TaskTemperatures,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_openai_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsConfig {
    /// `threads` for the Graph API, `stub` to publish nowhere
    #[serde(default = "default_threads_provider")]
    pub provider: String,

    #[serde(default = "default_threads_base_url")]
    pub base_url: String,

    #[serde(default = "default_threads_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_thread_gap_ms")]
    pub thread_gap_ms: u64,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("./postpilot.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

fn default_call_timeout() -> u64 {
    120
}

fn default_max_output_tokens() -> u32 {
    1200
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_llm_retries() -> u32 {
    2
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_threads_provider() -> String {
    "threads".to_string()
}

fn default_threads_base_url() -> String {
    THREADS_BASE_URL.to_string()
}

fn default_threads_timeout() -> u64 {
    30
}

fn default_thread_gap_ms() -> u64 {
    1000
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            call_timeout_secs: default_call_timeout(),
            run_rules: true,
            run_posts: true,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: AiModel::default(),
            use_stub: false,
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout(),
            retries: default_llm_retries(),
            temperatures: TaskTemperatures::default(),
            openai: OpenAiConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_api_key_env(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_api_key_env(),
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
        }
    }
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            provider: default_threads_provider(),
            base_url: default_threads_base_url(),
            timeout_secs: default_threads_timeout(),
            thread_gap_ms: default_thread_gap_ms(),
            max_chars: default_max_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("POSTPILOT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# postpilot configuration

[general]
database_path = "./postpilot.sqlite"
log_level = "info"

[scheduler]
poll_interval_secs = 60
# Bound on each generation or publish call; 0 disables
call_timeout_secs = 120
run_rules = true
run_posts = true

[llm]
default_model = "openai"  # openai, gemini
use_stub = false
max_output_tokens = 1200
timeout_secs = 60
retries = 2

[llm.temperatures]
analyze = 0.3
generate = 0.7
competitor = 0.3
viral = 0.8

[llm.openai]
api_key_env = "OPENAI_API_KEY"
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"

[llm.gemini]
api_key_env = "GEMINI_API_KEY"
base_url = "https://generativelanguage.googleapis.com/v1beta"
model = "gemini-1.5-flash"

[threads]
provider = "threads"  # threads, stub
base_url = "https://graph.threads.net/v1.0"
timeout_secs = 30
thread_gap_ms = 1000
max_chars = 500
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();

        assert_eq!(config.scheduler.poll_interval_secs, 60);
        assert_eq!(config.llm.default_model, AiModel::OpenAi);
        assert_eq!(config.llm.temperatures.viral, 0.8);
        assert_eq!(config.threads.max_chars, 500);
        assert_eq!(config.llm.gemini.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();

        assert_eq!(config.threads.provider, "threads");
        assert_eq!(config.llm.openai.api_key_env, "OPENAI_API_KEY");
        assert!(config.scheduler.run_rules);
        assert_eq!(
            config.scheduler.call_timeout(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_zero_call_timeout_disables_bound() {
        let config: AppConfig = toml::from_str("[scheduler]\ncall_timeout_secs = 0\n").unwrap();
        assert_eq!(config.scheduler.call_timeout(), None);
    }

    #[test]
    fn test_partial_provider_section_keeps_defaults() {
        let config: AppConfig =
            toml::from_str("[llm.openai]\nbase_url = \"http://localhost:9999\"\n").unwrap();
        assert_eq!(config.llm.openai.base_url, "http://localhost:9999");
        assert_eq!(config.llm.openai.model, "gpt-4o-mini");
    }

    #[test]
    fn test_legacy_model_alias() {
        let config: AppConfig = toml::from_str("[llm]\ndefault_model = \"gpt-4\"\n").unwrap();
        assert_eq!(config.llm.default_model, AiModel::OpenAi);
    }
}
