//! Settings command - per-account generation defaults

use anyhow::{Result, bail};
use postpilot_domain::usecases::SettingsUpdate;
use std::path::PathBuf;

use crate::app::App;
use crate::args::{SettingsArgs, SettingsCommands};
use crate::commands::{clearable, print_json};

pub async fn execute(args: SettingsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::open(config_path.as_deref()).await?;
    let settings = app.settings();

    match args.command {
        SettingsCommands::Show { account, json } => {
            let current = settings.get(account).await?;
            if json {
                print_json(&current)?;
            } else {
                println!("Settings for {}", account);
                println!(
                    "  Base prompt:      {}",
                    current.base_prompt.as_deref().unwrap_or("-")
                );
                println!(
                    "  Theme:            {}",
                    current.theme.as_deref().unwrap_or("-")
                );
                println!(
                    "  Default schedule: {}",
                    current.default_schedule.as_deref().unwrap_or("-")
                );
            }
        }
        SettingsCommands::Set {
            account,
            base_prompt,
            theme,
            default_schedule,
        } => {
            let update = SettingsUpdate {
                base_prompt: clearable(base_prompt),
                theme: clearable(theme),
                default_schedule: clearable(default_schedule),
            };
            if update.base_prompt.is_none()
                && update.theme.is_none()
                && update.default_schedule.is_none()
            {
                bail!("Nothing to update; pass --base-prompt, --theme or --default-schedule");
            }
            settings.update(account, update).await?;
            println!("Updated settings for {}", account);
        }
    }

    Ok(())
}
