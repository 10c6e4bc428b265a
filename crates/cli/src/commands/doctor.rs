//! Doctor command - validate configuration and show status

use anyhow::Result;
use postpilot_adapters::state::SqliteStore;
use postpilot_domain::{AccountStore, AiModel};
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    database: CheckResult,
    llm: CheckResult,
    threads: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        database: CheckResult::error("Not checked"),
        llm: CheckResult::error("Not checked"),
        threads: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.database = check_database(config).await;
        report.llm = check_llm(config);
        report.threads = check_threads(config);
    }

    let checks = [
        &report.config,
        &report.database,
        &report.llm,
        &report.threads,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_database(config: &AppConfig) -> CheckResult {
    let path = &config.general.database_path;
    let store = match SqliteStore::new(path).await {
        Ok(store) => store,
        Err(e) => {
            return CheckResult::error(format!(
                "Failed to open database {}: {}",
                path.display(),
                e
            ));
        }
    };

    if let Err(e) = store.ping().await {
        return CheckResult::error(format!("Database not responding: {}", e));
    }

    match store.list_accounts().await {
        Ok(accounts) if accounts.is_empty() => CheckResult::warn(format!(
            "Database {} ready, no accounts connected",
            path.display()
        )),
        Ok(accounts) => CheckResult::ok(format!(
            "Database {} ready, {} account(s)",
            path.display(),
            accounts.len()
        ))
        .with_details(serde_json::json!({
            "accounts": accounts.iter().map(|a| &a.username).collect::<Vec<_>>()
        })),
        Err(e) => CheckResult::error(format!("Failed to read accounts: {}", e)),
    }
}

fn check_llm(config: &AppConfig) -> CheckResult {
    if config.llm.use_stub {
        return CheckResult::ok("Backend: stub (offline)");
    }

    let openai = key_is_set(&config.llm.openai.api_key_env);
    let gemini = key_is_set(&config.llm.gemini.api_key_env);
    let details = serde_json::json!({
        "openai": { "model": config.llm.openai.model, "api_key_env": config.llm.openai.api_key_env, "set": openai },
        "gemini": { "model": config.llm.gemini.model, "api_key_env": config.llm.gemini.api_key_env, "set": gemini },
    });

    let default_ready = match config.llm.default_model {
        AiModel::OpenAi => openai,
        AiModel::Gemini => gemini,
    };

    let result = if !openai && !gemini {
        CheckResult::error(format!(
            "No API key set ({} or {})",
            config.llm.openai.api_key_env, config.llm.gemini.api_key_env
        ))
    } else if !default_ready {
        CheckResult::warn(format!(
            "Default model {} has no API key; other backend available",
            config.llm.default_model
        ))
    } else if openai && gemini {
        CheckResult::ok("Backends: openai, gemini")
    } else {
        CheckResult::ok(format!("Backend: {}", config.llm.default_model))
    };

    result.with_details(details)
}

fn check_threads(config: &AppConfig) -> CheckResult {
    match config.threads.provider.as_str() {
        "threads" => {
            if config.threads.base_url.trim().is_empty() {
                return CheckResult::error("Threads base_url is empty");
            }
            CheckResult::ok(format!(
                "Provider: threads, base_url: {}, max_chars: {}",
                config.threads.base_url, config.threads.max_chars
            ))
        }
        "stub" => CheckResult::warn("Provider: stub (posts are not published)"),
        other => CheckResult::error(format!("Unknown threads provider: {}", other)),
    }
}

fn key_is_set(env_var: &str) -> bool {
    !env_var.trim().is_empty()
        && std::env::var(env_var).is_ok_and(|value| !value.trim().is_empty())
}

fn print_report(report: &DoctorReport) {
    println!("postpilot Doctor Report");
    println!("=======================");
    println!();

    print_check("Config", &report.config);
    print_check("Database", &report.database);
    print_check("Content Generation", &report.llm);
    print_check("Threads", &report.threads);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: postpilot run --once");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threads_provider_checks() {
        let mut config = AppConfig::default();
        assert!(check_threads(&config).is_ok());

        config.threads.provider = "stub".to_string();
        assert_eq!(check_threads(&config).status, "warn");

        config.threads.provider = "bluesky".to_string();
        assert!(check_threads(&config).is_error());
    }

    #[test]
    fn test_llm_check_without_keys_is_error() {
        let mut config = AppConfig::default();
        config.llm.openai.api_key_env = "POSTPILOT_DOCTOR_UNSET_A".to_string();
        config.llm.gemini.api_key_env = "POSTPILOT_DOCTOR_UNSET_B".to_string();
        assert!(check_llm(&config).is_error());

        config.llm.use_stub = true;
        assert!(check_llm(&config).is_ok());
    }

    #[tokio::test]
    async fn test_database_check_warns_without_accounts() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.general.database_path = dir.path().join("doctor.sqlite");

        let result = check_database(&config).await;
        assert_eq!(result.status, "warn");
    }
}
