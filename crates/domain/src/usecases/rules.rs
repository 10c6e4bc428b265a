//! Rule CRUD with next-run computation

use chrono_tz::Tz;
use std::sync::Arc;
use uuid::Uuid;

use crate::model::{AiModel, AutoPostRule, ClockTime, Frequency, RuleRunState};
use crate::ports::{Clock, Store};
use crate::usecases::error::ServiceError;
use crate::usecases::schedule::Schedule;

/// Timezone applied when a rule is created without one
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

/// Fields for a new rule
#[derive(Debug, Clone)]
pub struct NewRule {
    pub account_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub frequency: Frequency,
    pub scheduled_times: Vec<ClockTime>,
    pub timezone: Tz,
    pub auto_generate: bool,
    pub topic: Option<String>,
    pub custom_prompt: Option<String>,
    pub is_thread: bool,
    pub ai_model: AiModel,
    pub max_runs: Option<u32>,
}

impl NewRule {
    /// Required fields; everything else takes its default
    pub fn new(
        account_id: Uuid,
        name: impl Into<String>,
        frequency: Frequency,
        scheduled_times: Vec<ClockTime>,
    ) -> Self {
        Self {
            account_id,
            name: name.into(),
            description: None,
            enabled: true,
            frequency,
            scheduled_times,
            timezone: DEFAULT_TIMEZONE,
            auto_generate: true,
            topic: None,
            custom_prompt: None,
            is_thread: false,
            ai_model: AiModel::default(),
            max_runs: None,
        }
    }
}

/// Partial update; `None` leaves a field unchanged. Nested options clear a value.
#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub frequency: Option<Frequency>,
    pub scheduled_times: Option<Vec<ClockTime>>,
    pub timezone: Option<Tz>,
    pub auto_generate: Option<bool>,
    pub topic: Option<Option<String>>,
    pub custom_prompt: Option<Option<String>>,
    pub is_thread: Option<bool>,
    pub ai_model: Option<AiModel>,
    pub max_runs: Option<Option<u32>>,
}

impl RulePatch {
    /// Whether applying this patch requires a new `next_run_at`
    pub fn touches_schedule(&self) -> bool {
        self.frequency.is_some() || self.scheduled_times.is_some() || self.timezone.is_some()
    }

    fn apply(self, rule: &mut AutoPostRule) {
        if let Some(name) = self.name {
            rule.name = name;
        }
        if let Some(description) = self.description {
            rule.description = description;
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
        if let Some(frequency) = self.frequency {
            rule.frequency = frequency;
        }
        if let Some(times) = self.scheduled_times {
            rule.scheduled_times = times;
        }
        if let Some(timezone) = self.timezone {
            rule.timezone = timezone;
        }
        if let Some(auto_generate) = self.auto_generate {
            rule.auto_generate = auto_generate;
        }
        if let Some(topic) = self.topic {
            rule.topic = topic;
        }
        if let Some(custom_prompt) = self.custom_prompt {
            rule.custom_prompt = custom_prompt;
        }
        if let Some(is_thread) = self.is_thread {
            rule.is_thread = is_thread;
        }
        if let Some(ai_model) = self.ai_model {
            rule.ai_model = ai_model;
        }
        if let Some(max_runs) = self.max_runs {
            rule.max_runs = max_runs;
        }
    }
}

pub struct RuleService<S, Cl>
where
    S: Store + ?Sized,
    Cl: Clock + ?Sized,
{
    store: Arc<S>,
    clock: Arc<Cl>,
}

impl<S, Cl> RuleService<S, Cl>
where
    S: Store + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<Cl>) -> Self {
        Self { store, clock }
    }

    /// Create a rule with its first `next_run_at` computed from now
    pub async fn create(&self, new: NewRule) -> Result<AutoPostRule, ServiceError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Configuration("rule name is required".to_string()));
        }
        validate_schedule(new.frequency, &new.scheduled_times)?;

        if self.store.get_account(new.account_id).await?.is_none() {
            return Err(ServiceError::not_found("account", new.account_id));
        }

        let now = self.clock.now();
        let mut scheduled_times = new.scheduled_times;
        dedup_times(&mut scheduled_times);
        let next_run_at =
            Schedule::new(new.frequency, scheduled_times.clone(), new.timezone).next_run_after(now)?;

        let rule = AutoPostRule {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            name,
            description: new.description,
            enabled: new.enabled,
            frequency: new.frequency,
            scheduled_times,
            timezone: new.timezone,
            auto_generate: new.auto_generate,
            topic: new.topic,
            custom_prompt: new.custom_prompt,
            is_thread: new.is_thread,
            ai_model: new.ai_model,
            last_run_at: None,
            next_run_at,
            run_count: 0,
            max_runs: new.max_runs,
            run_state: RuleRunState::NeverRun,
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_rule(&rule).await?;

        tracing::info!(
            rule_id = %rule.id,
            account_id = %rule.account_id,
            frequency = %rule.frequency,
            next_run_at = %rule.next_run_at,
            "Created rule"
        );

        Ok(rule)
    }

    /// Apply a partial update, recomputing `next_run_at` when schedule fields change
    pub async fn update(&self, id: Uuid, patch: RulePatch) -> Result<AutoPostRule, ServiceError> {
        let mut rule = self.get(id).await?;
        let reschedule = patch.touches_schedule();

        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::Configuration("rule name is required".to_string()));
        }

        patch.apply(&mut rule);
        rule.name = rule.name.trim().to_string();
        // Stored rules with an unusable schedule stay editable otherwise
        if reschedule {
            dedup_times(&mut rule.scheduled_times);
            validate_schedule(rule.frequency, &rule.scheduled_times)?;
        }

        let now = self.clock.now();
        if reschedule {
            rule.next_run_at = Schedule::of(&rule).next_run_after(now)?;
            tracing::debug!(rule_id = %rule.id, next_run_at = %rule.next_run_at, "Rescheduled rule");
        }
        rule.updated_at = now;

        self.store.update_rule(&rule).await?;
        Ok(rule)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_rule(id).await? {
            return Err(ServiceError::not_found("rule", id));
        }
        tracing::info!(rule_id = %id, "Deleted rule");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<AutoPostRule, ServiceError> {
        self.store
            .get_rule(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("rule", id))
    }

    pub async fn list(&self, account_id: Uuid) -> Result<Vec<AutoPostRule>, ServiceError> {
        Ok(self.store.list_rules(account_id).await?)
    }
}

/// Drop repeated times, keeping the first occurrence of each
fn dedup_times(times: &mut Vec<ClockTime>) {
    let mut seen = Vec::with_capacity(times.len());
    times.retain(|time| {
        if seen.contains(time) {
            false
        } else {
            seen.push(*time);
            true
        }
    });
}

fn validate_schedule(frequency: Frequency, times: &[ClockTime]) -> Result<(), ServiceError> {
    if frequency == Frequency::Unrecognized {
        return Err(ServiceError::Configuration(
            "frequency must be one of HOURLY, DAILY, WEEKLY, MONTHLY, CUSTOM".to_string(),
        ));
    }
    if frequency.uses_clock_times() && times.is_empty() {
        return Err(ServiceError::Configuration(format!(
            "{} rules need at least one scheduled time",
            frequency
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::RuleStore;
    use crate::testing::{FakeClock, MemoryStore, seed_account};
    use time::macros::datetime;

    fn times(values: &[&str]) -> Vec<ClockTime> {
        values.iter().map(|v| v.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_create_computes_next_run_and_defaults() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 08:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = RuleService::new(store.clone(), clock);

        let mut new = NewRule::new(account.id, "morning", Frequency::Daily, times(&["09:00", "18:00"]));
        new.timezone = chrono_tz::UTC;
        let rule = service.create(new).await.unwrap();

        assert_eq!(rule.next_run_at, datetime!(2024-01-01 09:00 UTC));
        assert_eq!(rule.run_count, 0);
        assert_eq!(rule.run_state, RuleRunState::NeverRun);
        assert!(rule.enabled && rule.auto_generate && !rule.is_thread);
        assert_eq!(rule.ai_model, AiModel::OpenAi);
        assert_eq!(store.rule(rule.id), rule);
    }

    #[tokio::test]
    async fn test_create_defaults_to_tokyo_time() {
        let store = MemoryStore::new();
        // 08:30 JST
        let clock = FakeClock::at(datetime!(2024-01-01 23:30 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = RuleService::new(store.clone(), clock);

        let rule = service
            .create(NewRule::new(account.id, "jst", Frequency::Daily, times(&["09:00"])))
            .await
            .unwrap();

        assert_eq!(rule.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(rule.next_run_at, datetime!(2024-01-02 00:00 UTC));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_fields() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 08:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = RuleService::new(store.clone(), clock);

        let err = service
            .create(NewRule::new(account.id, "  ", Frequency::Hourly, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));

        let err = service
            .create(NewRule::new(account.id, "daily", Frequency::Daily, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));

        let err = service
            .create(NewRule::new(Uuid::new_v4(), "orphan", Frequency::Hourly, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        assert!(store.list_rules(account.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_recomputes_with_existing_fields() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 08:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = RuleService::new(store.clone(), clock.clone());

        let mut new = NewRule::new(account.id, "r", Frequency::Daily, times(&["09:00"]));
        new.timezone = chrono_tz::UTC;
        let rule = service.create(new).await.unwrap();

        clock.set(datetime!(2024-01-01 12:00 UTC));
        let updated = service
            .update(
                rule.id,
                RulePatch {
                    scheduled_times: Some(times(&["10:00", "15:00"])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // frequency and timezone fall back to the stored values
        assert_eq!(updated.next_run_at, datetime!(2024-01-01 15:00 UTC));
        assert_eq!(updated.frequency, Frequency::Daily);
    }

    #[tokio::test]
    async fn test_update_without_schedule_fields_keeps_next_run() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 08:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = RuleService::new(store.clone(), clock.clone());

        let rule = service
            .create(NewRule::new(account.id, "r", Frequency::Hourly, vec![]))
            .await
            .unwrap();

        clock.set(datetime!(2024-01-01 11:45 UTC));
        let updated = service
            .update(
                rule.id,
                RulePatch {
                    name: Some("renamed".to_string()),
                    topic: Some(Some("rust".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.next_run_at, rule.next_run_at);
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.topic.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn test_update_switching_to_daily_requires_times() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 08:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = RuleService::new(store.clone(), clock);

        let rule = service
            .create(NewRule::new(account.id, "r", Frequency::Hourly, vec![]))
            .await
            .unwrap();

        let err = service
            .update(
                rule.id,
                RulePatch {
                    frequency: Some(Frequency::Daily),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
        assert_eq!(store.rule(rule.id).frequency, Frequency::Hourly);
    }

    #[tokio::test]
    async fn test_create_drops_repeated_times_in_order() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 08:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = RuleService::new(store.clone(), clock);

        let mut new = NewRule::new(
            account.id,
            "weekly",
            Frequency::Weekly,
            times(&["18:00", "09:00", "18:00", "09:00"]),
        );
        new.timezone = chrono_tz::UTC;
        let rule = service.create(new).await.unwrap();

        assert_eq!(rule.scheduled_times, times(&["18:00", "09:00"]));
        assert_eq!(rule.next_run_at, datetime!(2024-01-08 18:00 UTC));
    }

    #[tokio::test]
    async fn test_rule_with_unrecognized_frequency_stays_editable() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 08:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = RuleService::new(store.clone(), clock);

        let mut legacy = service
            .create(NewRule::new(account.id, "legacy", Frequency::Hourly, vec![]))
            .await
            .unwrap();
        legacy.frequency = Frequency::Unrecognized;
        store.update_rule(&legacy).await.unwrap();

        let updated = service
            .update(
                legacy.id,
                RulePatch {
                    name: Some("renamed".to_string()),
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert!(!updated.enabled);
        assert_eq!(updated.frequency, Frequency::Unrecognized);

        let err = service
            .update(
                legacy.id,
                RulePatch {
                    scheduled_times: Some(times(&["09:00"])),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_delete_and_get_missing_rule() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 08:00 UTC));
        let service = RuleService::new(store, clock);

        assert!(matches!(
            service.delete(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.get(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
