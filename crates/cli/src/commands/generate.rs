//! Generate command - create a draft in the analyzed style

use anyhow::Result;
use postpilot_domain::usecases::DraftRequest;
use std::path::PathBuf;

use crate::app::App;
use crate::args::GenerateArgs;
use crate::commands::{print_json, print_post};

pub async fn execute(args: GenerateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::open(config_path.as_deref()).await?;

    let request = DraftRequest {
        account_id: args.account,
        topic: args.topic,
        is_thread: args.thread,
        analysis_id: args.analysis,
        use_viral: args.viral,
        model: app.model_or_default(args.model),
        custom_instructions: args.instructions,
    };

    let post = app.generation().generate_draft(request).await?;

    if args.json {
        print_json(&post)?;
    } else {
        println!("Generated draft:");
        print_post(&post);
    }

    Ok(())
}
