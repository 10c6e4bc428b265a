//! Analytics recorder: pulls engagement counts for published posts

use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{Account, ItemResult, Post, PostAnalytics, PostStatus, RunSummary};
use crate::ports::{Clock, PlatformConnector, PublishError, Store};
use crate::usecases::error::ServiceError;
use crate::usecases::within;

pub struct AnalyticsService<S, P, Cl>
where
    S: Store + ?Sized,
    P: PlatformConnector + ?Sized,
    Cl: Clock + ?Sized,
{
    store: Arc<S>,
    connector: Arc<P>,
    clock: Arc<Cl>,
    call_timeout: Option<Duration>,
}

impl<S, P, Cl> AnalyticsService<S, P, Cl>
where
    S: Store + ?Sized,
    P: PlatformConnector + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(store: Arc<S>, connector: Arc<P>, clock: Arc<Cl>) -> Self {
        Self {
            store,
            connector,
            clock,
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Fetch current insights for one published post and replace its snapshot
    pub async fn record(&self, post_id: Uuid) -> Result<PostAnalytics, ServiceError> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("post", post_id))?;
        let account = self
            .store
            .get_account(post.account_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account", post.account_id))?;

        self.record_post(&post, &account).await
    }

    /// Refresh every published post of an account; failures are per post
    pub async fn refresh_account(&self, account_id: Uuid) -> Result<RunSummary, ServiceError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account", account_id))?;
        let published = self
            .store
            .list_posts(account_id, Some(PostStatus::Published))
            .await?;

        let mut summary = RunSummary::default();
        for post in &published {
            let result = match self.record_post(post, &account).await {
                Ok(_) => {
                    let mut result = ItemResult::success(post.id);
                    result.remote_id = post.threads_post_id.clone();
                    result
                }
                Err(e) => {
                    tracing::warn!(post_id = %post.id, error = %e, "Failed to fetch insights");
                    ItemResult::failed(post.id, e.to_string())
                }
            };
            summary.push(result);
        }

        tracing::info!(
            account_id = %account_id,
            processed = summary.processed_count,
            "Refreshed analytics"
        );
        Ok(summary)
    }

    /// Snapshots of an account, optionally bounded by fetch time
    pub async fn list(
        &self,
        account_id: Uuid,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> Result<Vec<PostAnalytics>, ServiceError> {
        Ok(self.store.list_analytics(account_id, from, to).await?)
    }

    async fn record_post(
        &self,
        post: &Post,
        account: &Account,
    ) -> Result<PostAnalytics, ServiceError> {
        let remote_id = post.threads_post_id.as_deref().ok_or_else(|| {
            ServiceError::InvalidState(format!("post {} has not been published", post.id))
        })?;

        let client = self.connector.client_for(account)?;
        let insights = within(self.call_timeout, client.get_post_insights(remote_id))
            .await
            .unwrap_or(Err(PublishError::Timeout))?;

        let analytics = PostAnalytics {
            post_id: post.id,
            account_id: post.account_id,
            insights,
            fetched_at: self.clock.now(),
        };
        self.store.upsert_analytics(&analytics).await?;

        tracing::debug!(post_id = %post.id, views = insights.views, likes = insights.likes, "Recorded insights");
        Ok(analytics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemStatus, PostInsights};
    use crate::ports::PostStore;
    use crate::testing::{FakeClock, FakeConnector, FakePublisher, MemoryStore, seed_account};
    use time::macros::datetime;

    fn published(account_id: Uuid, remote_id: &str, now: OffsetDateTime) -> Post {
        let mut post = Post::new(account_id, "text", None, PostStatus::Draft, now);
        post.mark_published(remote_id.to_string(), now);
        post
    }

    #[tokio::test]
    async fn test_record_upserts_single_snapshot() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 10:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let publisher = FakePublisher::default().with_insights(PostInsights {
            likes: 5,
            replies: 2,
            reposts: 1,
            quotes: 0,
            views: 100,
        });
        let service = AnalyticsService::new(store.clone(), FakeConnector::new(publisher), clock.clone());
        let post = published(account.id, "remote-9", clock.now());
        store.insert_post(&post).await.unwrap();

        service.record(post.id).await.unwrap();
        clock.set(datetime!(2024-01-01 12:00 UTC));
        let latest = service.record(post.id).await.unwrap();

        let all = service.list(account.id, None, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], latest);
        assert_eq!(all[0].fetched_at, datetime!(2024-01-01 12:00 UTC));
        assert_eq!(all[0].insights.views, 100);
    }

    #[tokio::test]
    async fn test_record_requires_remote_id() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 10:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = AnalyticsService::new(
            store.clone(),
            FakeConnector::new(FakePublisher::default()),
            clock.clone(),
        );
        let draft = Post::new(account.id, "draft", None, PostStatus::Draft, clock.now());
        store.insert_post(&draft).await.unwrap();

        assert!(matches!(
            service.record(draft.id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            service.record(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_isolates_per_post_failures() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 10:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = AnalyticsService::new(
            store.clone(),
            FakeConnector::new(FakePublisher::default()),
            clock.clone(),
        );
        let ok = published(account.id, "remote-1", clock.now());
        let gone = published(account.id, "gone-2", clock.now());
        store.insert_post(&ok).await.unwrap();
        store.insert_post(&gone).await.unwrap();

        let summary = service.refresh_account(account.id).await.unwrap();

        assert_eq!(summary.processed_count, 2);
        assert_eq!(summary.count(ItemStatus::Success), 1);
        assert_eq!(summary.count(ItemStatus::Failed), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_fetch_time() {
        let store = MemoryStore::new();
        let clock = FakeClock::at(datetime!(2024-01-01 10:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = AnalyticsService::new(
            store.clone(),
            FakeConnector::new(FakePublisher::default()),
            clock.clone(),
        );
        let early = published(account.id, "remote-1", clock.now());
        store.insert_post(&early).await.unwrap();
        service.record(early.id).await.unwrap();

        clock.set(datetime!(2024-01-05 10:00 UTC));
        let late = published(account.id, "remote-2", clock.now());
        store.insert_post(&late).await.unwrap();
        service.record(late.id).await.unwrap();

        let recent = service
            .list(account.id, Some(datetime!(2024-01-03 00:00 UTC)), None)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].post_id, late.id);

        let older = service
            .list(account.id, None, Some(datetime!(2024-01-03 00:00 UTC)))
            .await
            .unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].post_id, early.id);
    }
}
