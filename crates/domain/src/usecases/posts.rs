//! Post lifecycle: drafts, scheduling, publishing and the due-post sweep

use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{Account, ItemResult, Post, PostStatus, RunSummary};
use crate::ports::{Clock, PlatformConnector, PublishError, Store};
use crate::usecases::error::ServiceError;
use crate::usecases::within;

pub struct PostService<S, P, Cl>
where
    S: Store + ?Sized,
    P: PlatformConnector + ?Sized,
    Cl: Clock + ?Sized,
{
    store: Arc<S>,
    connector: Arc<P>,
    clock: Arc<Cl>,
    /// Upper bound for one publish call (a whole thread counts as one call)
    call_timeout: Option<Duration>,
}

impl<S, P, Cl> Clone for PostService<S, P, Cl>
where
    S: Store + ?Sized,
    P: PlatformConnector + ?Sized,
    Cl: Clock + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            connector: Arc::clone(&self.connector),
            clock: Arc::clone(&self.clock),
            call_timeout: self.call_timeout,
        }
    }
}

impl<S, P, Cl> PostService<S, P, Cl>
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

    /// Create a DRAFT post written by hand
    pub async fn create_draft(
        &self,
        account_id: Uuid,
        content: &str,
        thread_posts: Vec<String>,
    ) -> Result<Post, ServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::Configuration("post content is required".to_string()));
        }
        if thread_posts.iter().any(|t| t.trim().is_empty()) {
            return Err(ServiceError::Configuration(
                "thread posts must not be empty".to_string(),
            ));
        }
        self.require_account(account_id).await?;

        let thread = thread_posts.into_iter().map(|t| t.trim().to_string()).collect();
        let post = Post::new(account_id, content, Some(thread), PostStatus::Draft, self.clock.now());
        self.store.insert_post(&post).await?;

        tracing::info!(post_id = %post.id, account_id = %account_id, "Created draft");
        Ok(post)
    }

    pub async fn get(&self, id: Uuid) -> Result<Post, ServiceError> {
        self.store
            .get_post(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("post", id))
    }

    pub async fn list(
        &self,
        account_id: Uuid,
        status: Option<PostStatus>,
    ) -> Result<Vec<Post>, ServiceError> {
        Ok(self.store.list_posts(account_id, status).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_post(id).await? {
            return Err(ServiceError::not_found("post", id));
        }
        tracing::info!(post_id = %id, "Deleted post");
        Ok(())
    }

    /// Mark a post SCHEDULED for `at`; the due-post sweep publishes it
    pub async fn schedule(&self, id: Uuid, at: OffsetDateTime) -> Result<Post, ServiceError> {
        let mut post = self.get(id).await?;
        if !post.status.is_schedulable() {
            return Err(ServiceError::InvalidState(format!(
                "post {} is {} and cannot be scheduled",
                post.id, post.status
            )));
        }

        post.mark_scheduled(at, self.clock.now());
        self.store.update_post(&post).await?;

        tracing::info!(post_id = %post.id, scheduled_for = %at, "Scheduled post");
        Ok(post)
    }

    /// Publish a DRAFT, APPROVED or SCHEDULED post now
    pub async fn publish(&self, id: Uuid) -> Result<Post, ServiceError> {
        let post = self.get(id).await?;
        if !post.status.is_publishable() {
            return Err(ServiceError::InvalidState(format!(
                "post {} is {} and cannot be published",
                post.id, post.status
            )));
        }
        let account = self.require_account(post.account_id).await?;
        self.publish_post(post, &account).await
    }

    /// Publish every SCHEDULED post whose time has come, one at a time.
    ///
    /// A failure to select due posts aborts the sweep; failures of single
    /// posts are recorded in the summary and the sweep continues.
    pub async fn publish_due(&self) -> Result<RunSummary, ServiceError> {
        let now = self.clock.now();
        let due = self.store.find_due_posts(now).await?;

        tracing::info!(count = due.len(), "Publishing due posts");

        let mut summary = RunSummary::default();
        for post in due {
            let post_id = post.id;
            let result = match self.publish_scheduled(post).await {
                Ok(published) => {
                    let mut result = ItemResult::success(post_id);
                    result.post_id = Some(post_id);
                    result.remote_id = published.threads_post_id;
                    result
                }
                Err(e) => {
                    tracing::error!(post_id = %post_id, error = %e, "Failed to publish due post");
                    ItemResult::failed(post_id, e.to_string())
                }
            };
            summary.push(result);
        }

        Ok(summary)
    }

    async fn publish_scheduled(&self, mut post: Post) -> Result<Post, ServiceError> {
        match self.store.get_account(post.account_id).await? {
            Some(account) => self.publish_post(post, &account).await,
            None => {
                let error = ServiceError::not_found("account", post.account_id);
                post.mark_failed(error.to_string(), self.clock.now());
                self.store.update_post(&post).await?;
                Err(error)
            }
        }
    }

    /// Send a post to the platform and record the outcome on the post.
    ///
    /// Exactly one client call is made: a single post or one reply chain.
    pub(crate) async fn publish_post(
        &self,
        mut post: Post,
        account: &Account,
    ) -> Result<Post, ServiceError> {
        let outcome = self.send(&post, account).await;
        let now = self.clock.now();

        match outcome {
            Ok(remote_id) => {
                post.mark_published(remote_id, now);
                self.store.update_post(&post).await?;
                tracing::info!(
                    post_id = %post.id,
                    remote_id = ?post.threads_post_id,
                    segments = post.segments().len(),
                    "Published post"
                );
                Ok(post)
            }
            Err(e) => {
                post.mark_failed(e.to_string(), now);
                if let Err(store_error) = self.store.update_post(&post).await {
                    tracing::error!(post_id = %post.id, error = %store_error, "Failed to record publish failure");
                }
                tracing::warn!(post_id = %post.id, error = %e, "Publish failed");
                Err(ServiceError::Publish(e))
            }
        }
    }

    async fn send(&self, post: &Post, account: &Account) -> Result<String, PublishError> {
        let client = self.connector.client_for(account)?;
        let segments = post.segments();

        let call = async {
            if segments.len() == 1 {
                client.create_post(&segments[0], None).await
            } else {
                let ids = client.create_thread_posts(&segments).await?;
                ids.into_iter()
                    .next()
                    .ok_or_else(|| PublishError::Api("thread publish returned no ids".to_string()))
            }
        };

        within(self.call_timeout, call)
            .await
            .unwrap_or(Err(PublishError::Timeout))
    }

    async fn require_account(&self, account_id: Uuid) -> Result<Account, ServiceError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account", account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClock, FakeConnector, FakePublisher, MemoryStore, seed_account};
    use std::sync::atomic::Ordering;
    use time::macros::datetime;

    struct Fixture {
        store: Arc<MemoryStore>,
        connector: Arc<FakeConnector>,
        clock: Arc<FakeClock>,
        service: PostService<MemoryStore, FakeConnector, FakeClock>,
        account: Account,
    }

    async fn fixture(publisher: FakePublisher) -> Fixture {
        let store = MemoryStore::new();
        let connector = FakeConnector::new(publisher);
        let clock = FakeClock::at(datetime!(2024-01-01 10:00 UTC));
        let account = seed_account(&store, clock.now()).await;
        let service = PostService::new(store.clone(), connector.clone(), clock.clone());
        Fixture {
            store,
            connector,
            clock,
            service,
            account,
        }
    }

    #[tokio::test]
    async fn test_publish_single_post() {
        let f = fixture(FakePublisher::default()).await;
        let draft = f.service.create_draft(f.account.id, "hello", vec![]).await.unwrap();

        let published = f.service.publish(draft.id).await.unwrap();

        assert_eq!(published.status, PostStatus::Published);
        assert_eq!(published.threads_post_id.as_deref(), Some("remote-1"));
        assert_eq!(published.published_at, Some(f.clock.now()));
        assert_eq!(
            f.connector.publisher.calls(),
            vec![("hello".to_string(), None)]
        );
        assert_eq!(f.store.post(draft.id), published);
    }

    #[tokio::test]
    async fn test_failed_publish_marks_post_failed() {
        let publisher = FakePublisher::default();
        publisher.fail_on("doomed");
        let f = fixture(publisher).await;
        let draft = f.service.create_draft(f.account.id, "doomed", vec![]).await.unwrap();

        let err = f.service.publish(draft.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Publish(PublishError::Api(_))));

        let stored = f.store.post(draft.id);
        assert_eq!(stored.status, PostStatus::Failed);
        assert_eq!(stored.threads_post_id, None);
        assert!(stored.last_error.unwrap().contains("doomed"));
    }

    #[tokio::test]
    async fn test_published_and_failed_posts_are_rejected() {
        let publisher = FakePublisher::default();
        publisher.fail_on("bad");
        let f = fixture(publisher).await;

        let good = f.service.create_draft(f.account.id, "good", vec![]).await.unwrap();
        f.service.publish(good.id).await.unwrap();
        let bad = f.service.create_draft(f.account.id, "bad", vec![]).await.unwrap();
        let _ = f.service.publish(bad.id).await;

        for id in [good.id, bad.id] {
            assert!(matches!(
                f.service.publish(id).await,
                Err(ServiceError::InvalidState(_))
            ));
        }
        // one call each, no re-publish
        assert_eq!(f.connector.publisher.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_thread_publish_chains_replies_with_gap() {
        let f = fixture(FakePublisher::default()).await;
        let draft = f
            .service
            .create_draft(
                f.account.id,
                "one",
                vec!["two".to_string(), "three".to_string()],
            )
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let published = f.service.publish(draft.id).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(
            f.connector.publisher.calls(),
            vec![
                ("one".to_string(), None),
                ("two".to_string(), Some("remote-1".to_string())),
                ("three".to_string(), Some("remote-2".to_string())),
            ]
        );
        assert!(elapsed >= Duration::from_secs(2));
        assert_eq!(published.threads_post_id.as_deref(), Some("remote-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_timeout_marks_post_failed() {
        let publisher = FakePublisher::with_delay(Duration::from_secs(30));
        let f = fixture(publisher).await;
        let service = f.service.clone().with_call_timeout(Some(Duration::from_secs(5)));
        let draft = service.create_draft(f.account.id, "slow", vec![]).await.unwrap();

        let err = service.publish(draft.id).await.unwrap_err();

        assert!(matches!(err, ServiceError::Publish(PublishError::Timeout)));
        assert_eq!(f.store.post(draft.id).status, PostStatus::Failed);
    }

    #[tokio::test]
    async fn test_schedule_sets_time_and_state() {
        let f = fixture(FakePublisher::default()).await;
        let draft = f.service.create_draft(f.account.id, "later", vec![]).await.unwrap();
        let at = datetime!(2024-01-02 09:00 UTC);

        let scheduled = f.service.schedule(draft.id, at).await.unwrap();

        assert_eq!(scheduled.status, PostStatus::Scheduled);
        assert_eq!(scheduled.scheduled_for, Some(at));
    }

    #[tokio::test]
    async fn test_publish_due_isolates_failures() {
        let publisher = FakePublisher::default();
        publisher.fail_on("broken");
        let f = fixture(publisher).await;

        let mut ids = Vec::new();
        for text in ["first", "broken", "third"] {
            let draft = f.service.create_draft(f.account.id, text, vec![]).await.unwrap();
            f.service
                .schedule(draft.id, datetime!(2024-01-01 09:00 UTC))
                .await
                .unwrap();
            ids.push(draft.id);
        }
        let future = f.service.create_draft(f.account.id, "future", vec![]).await.unwrap();
        f.service
            .schedule(future.id, datetime!(2024-01-01 11:00 UTC))
            .await
            .unwrap();

        let summary = f.service.publish_due().await.unwrap();

        assert_eq!(summary.processed_count, 3);
        assert_eq!(summary.count(crate::model::ItemStatus::Success), 2);
        assert_eq!(summary.count(crate::model::ItemStatus::Failed), 1);
        assert_eq!(f.store.post(ids[0]).status, PostStatus::Published);
        assert_eq!(f.store.post(ids[1]).status, PostStatus::Failed);
        assert_eq!(f.store.post(ids[2]).status, PostStatus::Published);
        assert_eq!(f.store.post(future.id).status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_publish_due_aborts_when_selection_fails() {
        let f = fixture(FakePublisher::default()).await;
        f.store.fail_selection.store(true, Ordering::SeqCst);

        assert!(matches!(
            f.service.publish_due().await,
            Err(ServiceError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_create_draft_validates_input() {
        let f = fixture(FakePublisher::default()).await;

        assert!(matches!(
            f.service.create_draft(f.account.id, "   ", vec![]).await,
            Err(ServiceError::Configuration(_))
        ));
        assert!(matches!(
            f.service
                .create_draft(f.account.id, "head", vec![" ".to_string()])
                .await,
            Err(ServiceError::Configuration(_))
        ));
        assert!(matches!(
            f.service.create_draft(Uuid::new_v4(), "head", vec![]).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
