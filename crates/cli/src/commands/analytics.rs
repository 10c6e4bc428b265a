//! Analytics command - engagement snapshots of published posts

use anyhow::Result;
use postpilot_domain::PostAnalytics;
use std::path::PathBuf;

use crate::app::App;
use crate::args::{AnalyticsArgs, AnalyticsCommands};
use crate::commands::{format_timestamp, parse_timestamp, print_json, print_summary};

pub async fn execute(args: AnalyticsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::open(config_path.as_deref()).await?;
    let analytics = app.analytics();

    match args.command {
        AnalyticsCommands::Fetch { post, json } => {
            let snapshot = analytics.record(post).await?;
            if json {
                print_json(&snapshot)?;
            } else {
                print_snapshot(&snapshot);
            }
        }
        AnalyticsCommands::Refresh { account } => {
            let summary = analytics.refresh_account(account).await?;
            print_summary("Analytics", &summary);
        }
        AnalyticsCommands::List {
            account,
            from,
            to,
            json,
        } => {
            let from = from.as_deref().map(parse_timestamp).transpose()?;
            let to = to.as_deref().map(parse_timestamp).transpose()?;
            let list = analytics.list(account, from, to).await?;
            if json {
                print_json(&list)?;
            } else if list.is_empty() {
                println!("No analytics for account {}.", account);
            } else {
                for snapshot in &list {
                    print_snapshot(snapshot);
                }
            }
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &PostAnalytics) {
    let i = &snapshot.insights;
    println!(
        "{}  likes {}  replies {}  reposts {}  quotes {}  views {}  ({})",
        snapshot.post_id,
        i.likes,
        i.replies,
        i.reposts,
        i.quotes,
        i.views,
        format_timestamp(snapshot.fetched_at)
    );
}
