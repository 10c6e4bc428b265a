//! Run command - execute due rules and publish scheduled posts

use anyhow::{Context, Result};
use postpilot_domain::RunSummary;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::app::App;
use crate::args::RunArgs;
use crate::commands::print_json;

/// Result of one sweep; a part that did not run is omitted
#[derive(Debug, Default, Serialize)]
struct SweepReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    rules: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    posts: Option<RunSummary>,
}

#[derive(Debug, Clone, Copy)]
struct SweepPlan {
    rules: bool,
    posts: bool,
}

impl SweepPlan {
    fn resolve(args: &RunArgs, run_rules: bool, run_posts: bool) -> Self {
        if args.rules_only {
            Self {
                rules: true,
                posts: false,
            }
        } else if args.posts_only {
            Self {
                rules: false,
                posts: true,
            }
        } else {
            Self {
                rules: run_rules,
                posts: run_posts,
            }
        }
    }
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::open(config_path.as_deref()).await?;
    let plan = SweepPlan::resolve(
        &args,
        app.config.scheduler.run_rules,
        app.config.scheduler.run_posts,
    );

    tracing::info!(
        once = args.once,
        rules = plan.rules,
        posts = plan.posts,
        models = ?app.generators.models(),
        connector = app.connector.platform(),
        "Starting postpilot run"
    );

    if args.once {
        let report = sweep(&app, plan).await?;
        print_json(&report)?;
        return Ok(());
    }

    let poll_interval = Duration::from_secs(app.config.scheduler.poll_interval_secs.max(1));
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep(&app, plan).await {
                    Ok(report) => log_report(&report),
                    Err(e) => tracing::error!(error = %e, "Sweep failed"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    tracing::info!("postpilot run completed");
    Ok(())
}

/// Due rules first, then scheduled posts
async fn sweep(app: &App, plan: SweepPlan) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    if plan.rules {
        let summary = app
            .auto_poster()
            .run_due_rules()
            .await
            .context("Failed to run due rules")?;
        report.rules = Some(summary);
    }

    if plan.posts {
        let summary = app
            .posts()
            .publish_due()
            .await
            .context("Failed to publish due posts")?;
        report.posts = Some(summary);
    }

    Ok(report)
}

fn log_report(report: &SweepReport) {
    for (label, summary) in [("rules", &report.rules), ("posts", &report.posts)] {
        if let Some(summary) = summary {
            if summary.processed_count > 0 {
                tracing::info!(kind = label, processed = summary.processed_count, "Sweep complete");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(rules_only: bool, posts_only: bool) -> RunArgs {
        RunArgs {
            once: true,
            rules_only,
            posts_only,
        }
    }

    #[test]
    fn test_plan_flags_override_config() {
        let plan = SweepPlan::resolve(&args(true, false), false, true);
        assert!(plan.rules);
        assert!(!plan.posts);

        let plan = SweepPlan::resolve(&args(false, true), true, false);
        assert!(!plan.rules);
        assert!(plan.posts);
    }

    #[test]
    fn test_plan_defaults_to_config() {
        let plan = SweepPlan::resolve(&args(false, false), true, false);
        assert!(plan.rules);
        assert!(!plan.posts);
    }

    #[test]
    fn test_report_omits_skipped_parts() {
        let report = SweepReport {
            rules: Some(RunSummary::default()),
            posts: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("rules").is_some());
        assert!(json.get("posts").is_none());
        assert_eq!(json["rules"]["processedCount"], 0);
    }
}
