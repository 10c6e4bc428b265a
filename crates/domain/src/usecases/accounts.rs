//! Accounts and per-account settings

use secrecy::SecretString;
use std::sync::Arc;
use uuid::Uuid;

use crate::model::{Account, Settings};
use crate::ports::{Clock, Store};
use crate::usecases::error::ServiceError;

pub struct AccountService<S, Cl>
where
    S: Store + ?Sized,
    Cl: Clock + ?Sized,
{
    store: Arc<S>,
    clock: Arc<Cl>,
}

impl<S, Cl> AccountService<S, Cl>
where
    S: Store + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<Cl>) -> Self {
        Self { store, clock }
    }

    /// Register an account from a completed token exchange.
    /// Re-registering the same platform user refreshes its username and token.
    pub async fn connect(
        &self,
        platform_user_id: &str,
        username: &str,
        access_token: SecretString,
    ) -> Result<Account, ServiceError> {
        let platform_user_id = platform_user_id.trim();
        let username = username.trim().trim_start_matches('@');
        if platform_user_id.is_empty() || username.is_empty() {
            return Err(ServiceError::Configuration(
                "platform user id and username are required".to_string(),
            ));
        }

        let account = Account::new(platform_user_id, username, access_token, self.clock.now());
        let stored = self.store.upsert_account(&account).await?;

        tracing::info!(account_id = %stored.id, username = %stored.username, "Connected account");
        Ok(stored)
    }

    pub async fn get(&self, id: Uuid) -> Result<Account, ServiceError> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account", id))
    }

    pub async fn list(&self) -> Result<Vec<Account>, ServiceError> {
        Ok(self.store.list_accounts().await?)
    }

    /// Remove an account together with its posts, rules, analyses and settings
    pub async fn remove(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_account(id).await? {
            return Err(ServiceError::not_found("account", id));
        }
        tracing::info!(account_id = %id, "Removed account");
        Ok(())
    }
}

/// Partial settings update; `Some(None)` clears a field
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub base_prompt: Option<Option<String>>,
    pub theme: Option<Option<String>>,
    pub default_schedule: Option<Option<String>>,
}

pub struct SettingsService<S, Cl>
where
    S: Store + ?Sized,
    Cl: Clock + ?Sized,
{
    store: Arc<S>,
    clock: Arc<Cl>,
}

impl<S, Cl> SettingsService<S, Cl>
where
    S: Store + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<Cl>) -> Self {
        Self { store, clock }
    }

    /// Stored settings, or empty defaults when none were saved yet
    pub async fn get(&self, account_id: Uuid) -> Result<Settings, ServiceError> {
        if self.store.get_account(account_id).await?.is_none() {
            return Err(ServiceError::not_found("account", account_id));
        }
        Ok(self
            .store
            .get_settings(account_id)
            .await?
            .unwrap_or_else(|| Settings::empty(account_id, self.clock.now())))
    }

    pub async fn update(
        &self,
        account_id: Uuid,
        update: SettingsUpdate,
    ) -> Result<Settings, ServiceError> {
        let mut settings = self.get(account_id).await?;

        if let Some(base_prompt) = update.base_prompt {
            settings.base_prompt = non_blank(base_prompt);
        }
        if let Some(theme) = update.theme {
            settings.theme = non_blank(theme);
        }
        if let Some(default_schedule) = update.default_schedule {
            settings.default_schedule = non_blank(default_schedule);
        }
        settings.updated_at = self.clock.now();

        self.store.upsert_settings(&settings).await?;
        Ok(settings)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
