//! Analyze command - derive a style profile from own or competitor posts

use anyhow::Result;
use postpilot_domain::AnalyzedPost;
use std::path::PathBuf;

use crate::app::App;
use crate::args::{AnalyzeArgs, AnalyzeCommands};
use crate::commands::{format_timestamp, print_json};

pub async fn execute(args: AnalyzeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::open(config_path.as_deref()).await?;
    let generation = app.generation();

    match args.command {
        AnalyzeCommands::Own {
            account,
            model,
            json,
        } => {
            let analyzed = generation
                .analyze_own_posts(account, app.model_or_default(model))
                .await?;
            output_analysis(&analyzed, json)?;
        }
        AnalyzeCommands::Competitors {
            account,
            usernames,
            model,
            json,
        } => {
            let analyzed = generation
                .analyze_competitors(account, &usernames, app.model_or_default(model))
                .await?;
            output_analysis(&analyzed, json)?;
        }
        AnalyzeCommands::List { account, json } => {
            let list = generation.list_analyses(account).await?;
            if json {
                print_json(&list)?;
            } else if list.is_empty() {
                println!("No analyses for account {}.", account);
            } else {
                for analyzed in &list {
                    println!(
                        "{}  {}  {} posts  {}",
                        analyzed.id,
                        analyzed.source,
                        analyzed.corpus.len(),
                        format_timestamp(analyzed.created_at)
                    );
                }
            }
        }
    }

    Ok(())
}

fn output_analysis(analyzed: &AnalyzedPost, json: bool) -> Result<()> {
    if json {
        return print_json(analyzed);
    }

    let analysis = &analyzed.analysis;
    println!("Analysis {} ({})", analyzed.id, analyzed.source);
    println!("  Posts:      {}", analyzed.corpus.len());
    println!("  Tone:       {}", analysis.tone.join(", "));
    println!("  Topics:     {}", analysis.topics.join(", "));
    println!("  Hashtags:   {}", analysis.hashtags.join(" "));
    println!("  Avg length: {:.0}", analysis.avg_length);
    println!("  Structure:  {}", analysis.structure);
    for pattern in &analysis.key_patterns {
        println!("  - {}", pattern);
    }
    if !analysis.viral_elements.is_empty() {
        println!("  Viral:      {}", analysis.viral_elements.join(", "));
    }
    Ok(())
}
