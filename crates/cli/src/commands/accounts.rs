//! Accounts command - connect, list and remove Threads accounts

use anyhow::Result;
use postpilot_domain::Account;
use secrecy::SecretString;
use serde::Serialize;
use std::path::PathBuf;

use crate::app::App;
use crate::args::{AccountsArgs, AccountsCommands};
use crate::commands::{format_timestamp, print_json};

/// Account as shown to users; the token never leaves the store
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountView {
    id: String,
    platform_user_id: String,
    username: String,
    created_at: String,
    updated_at: String,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            platform_user_id: account.platform_user_id.clone(),
            username: account.username.clone(),
            created_at: format_timestamp(account.created_at),
            updated_at: format_timestamp(account.updated_at),
        }
    }
}

pub async fn execute(args: AccountsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::open(config_path.as_deref()).await?;
    let accounts = app.accounts();

    match args.command {
        AccountsCommands::Add {
            user_id,
            username,
            token,
            json,
        } => {
            let account = accounts
                .connect(&user_id, &username, SecretString::new(token.into()))
                .await?;
            if json {
                print_json(&AccountView::from(&account))?;
            } else {
                println!("Connected @{} ({})", account.username, account.id);
            }
        }
        AccountsCommands::List { json } => {
            let list = accounts.list().await?;
            if json {
                let views: Vec<AccountView> = list.iter().map(AccountView::from).collect();
                print_json(&views)?;
            } else if list.is_empty() {
                println!("No accounts connected.");
            } else {
                for account in &list {
                    println!(
                        "{}  @{}  (user {})",
                        account.id, account.username, account.platform_user_id
                    );
                }
            }
        }
        AccountsCommands::Remove { id } => {
            accounts.remove(id).await?;
            println!("Removed account {}", id);
        }
    }

    Ok(())
}
