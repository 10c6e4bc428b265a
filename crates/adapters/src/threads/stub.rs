//! Offline publishing connector

use async_trait::async_trait;
use postpilot_domain::{
    Account, PlatformConnector, PostInsights, PublishError, PublishingClient, RemotePost,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Publisher that records texts instead of calling the platform
pub struct StubPublisher {
    enabled: bool,
    next_id: AtomicU64,
    published: Mutex<Vec<(String, Option<String>)>>,
}

impl StubPublisher {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            next_id: AtomicU64::new(1),
            published: Mutex::new(vec![]),
        }
    }

    /// Published texts with the id they replied to
    pub fn get_published(&self) -> Vec<(String, Option<String>)> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl PublishingClient for StubPublisher {
    async fn get_user_id(&self) -> Result<String, PublishError> {
        Ok("stub-user".to_string())
    }

    async fn create_post(
        &self,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<String, PublishError> {
        if !self.enabled {
            return Err(PublishError::Disabled(
                "stub publisher is disabled".to_string(),
            ));
        }

        let id = format!("stub-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((text.to_string(), reply_to_id.map(str::to_string)));
        Ok(id)
    }

    fn thread_gap(&self) -> Duration {
        Duration::ZERO
    }

    async fn get_post_insights(&self, _post_id: &str) -> Result<PostInsights, PublishError> {
        Ok(PostInsights::default())
    }

    async fn get_user_posts(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<RemotePost>, PublishError> {
        let posts = (1..=3)
            .map(|n| RemotePost {
                id: format!("{}-{}", user, n),
                text: Some(format!("Sample post {} from {} #stub", n, user)),
                timestamp: None,
                permalink: None,
                like_count: Some(10 * n),
                reply_count: Some(n),
                repost_count: Some(0),
            })
            .take(limit)
            .collect();
        Ok(posts)
    }
}

/// Connector handing every account the same stub publisher
pub struct StubConnector {
    publisher: Arc<StubPublisher>,
}

impl StubConnector {
    pub fn new(enabled: bool) -> Self {
        Self {
            publisher: Arc::new(StubPublisher::new(enabled)),
        }
    }

    pub fn publisher(&self) -> Arc<StubPublisher> {
        self.publisher.clone()
    }
}

impl PlatformConnector for StubConnector {
    fn client_for(&self, _account: &Account) -> Result<Arc<dyn PublishingClient>, PublishError> {
        let client: Arc<dyn PublishingClient> = self.publisher.clone();
        Ok(client)
    }

    fn platform(&self) -> &'static str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_thread_is_recorded_as_reply_chain() {
        let connector = StubConnector::new(true);
        let publisher = connector.publisher();

        let ids = publisher
            .create_thread_posts(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();

        assert_eq!(ids, vec!["stub-1", "stub-2"]);
        assert_eq!(
            publisher.get_published(),
            vec![
                ("one".to_string(), None),
                ("two".to_string(), Some("stub-1".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_stub() {
        let publisher = StubPublisher::new(false);
        assert!(matches!(
            publisher.create_post("x", None).await,
            Err(PublishError::Disabled(_))
        ));
    }
}
