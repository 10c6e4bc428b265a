//! Posts command - drafts, scheduling and manual publishing

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::app::App;
use crate::args::{PostsArgs, PostsCommands};
use crate::commands::{format_timestamp, parse_timestamp, print_json, print_post};

pub async fn execute(args: PostsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::open(config_path.as_deref()).await?;
    let posts = app.posts();

    match args.command {
        PostsCommands::Create {
            account,
            content,
            segments,
            json,
        } => {
            let post = posts.create_draft(account, &content, segments).await?;
            if json {
                print_json(&post)?;
            } else {
                println!("Created draft {}", post.id);
            }
        }
        PostsCommands::List {
            account,
            status,
            json,
        } => {
            let list = posts.list(account, status).await?;
            if json {
                print_json(&list)?;
            } else if list.is_empty() {
                println!("No posts.");
            } else {
                for post in &list {
                    print_post(post);
                }
            }
        }
        PostsCommands::Show { id, json } => {
            let post = posts.get(id).await?;
            if json {
                print_json(&post)?;
            } else {
                print_post(&post);
            }
        }
        PostsCommands::Schedule { id, at } => {
            let at = parse_timestamp(&at)?;
            let post = posts.schedule(id, at).await?;
            println!(
                "Scheduled {} for {}",
                post.id,
                post.scheduled_for.map(format_timestamp).unwrap_or_default()
            );
        }
        PostsCommands::Publish { id, json } => {
            let post = posts
                .publish(id)
                .await
                .with_context(|| format!("Failed to publish post {}", id))?;
            if json {
                print_json(&post)?;
            } else {
                println!(
                    "Published {} as {}",
                    post.id,
                    post.threads_post_id.as_deref().unwrap_or("-")
                );
            }
        }
        PostsCommands::Delete { id } => {
            posts.delete(id).await?;
            println!("Deleted post {}", id);
        }
    }

    Ok(())
}
