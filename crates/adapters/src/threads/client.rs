//! Threads client bound to one access token

use async_trait::async_trait;
use postpilot_domain::{PostInsights, PublishError, PublishingClient, RemotePost};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{ThreadsConfig, check_status, request_error};

const POST_FIELDS: &str = "id,text,timestamp,media_type,media_url,permalink";
const INSIGHT_METRICS: &str = "likes,replies,reposts,quotes,views";

/// Threads Graph API client.
///
/// Publishing is two-step: create a TEXT container, then publish it.
pub struct ThreadsClient {
    client: Client,
    access_token: SecretString,
    config: ThreadsConfig,
    user_id: OnceCell<String>,
}

impl ThreadsClient {
    pub fn new(access_token: SecretString, config: ThreadsConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            access_token,
            config,
            user_id: OnceCell::new(),
        }
    }

    /// Skip the `/me` lookup when the platform user id is already known
    pub fn with_user_id(self, user_id: String) -> Self {
        Self {
            user_id: OnceCell::new_with(Some(user_id)),
            ..self
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn fetch_user_id(&self) -> Result<String, PublishError> {
        let response = self
            .client
            .get(self.url("me"))
            .query(&[
                ("fields", "id,username"),
                ("access_token", self.access_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response, "look up user").await?;

        let me: IdResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;
        Ok(me.id)
    }

    async fn create_container(
        &self,
        user_id: &str,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<String, PublishError> {
        let mut params = vec![
            ("media_type", "TEXT"),
            ("text", text),
            ("access_token", self.access_token.expose_secret()),
        ];
        if let Some(reply_to_id) = reply_to_id {
            params.push(("reply_to_id", reply_to_id));
        }

        let response = self
            .client
            .post(self.url(&format!("{}/threads", user_id)))
            .query(&params)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response, "create container").await?;

        let container: IdResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;
        Ok(container.id)
    }

    async fn publish_container(
        &self,
        user_id: &str,
        creation_id: &str,
    ) -> Result<String, PublishError> {
        let response = self
            .client
            .post(self.url(&format!("{}/threads_publish", user_id)))
            .query(&[
                ("creation_id", creation_id),
                ("access_token", self.access_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response, "publish container").await?;

        let published: IdResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;
        Ok(published.id)
    }

    /// Post listings carry no engagement counts; read them from insights.
    ///
    /// Insights are only readable for posts the token may inspect, so a
    /// failure leaves the counts unset.
    async fn fill_engagement(&self, post: &mut RemotePost) {
        if post.like_count.is_some() {
            return;
        }
        match self.get_post_insights(&post.id).await {
            Ok(insights) => {
                post.like_count = Some(insights.likes);
                post.reply_count = Some(insights.replies);
                post.repost_count = Some(insights.reposts);
            }
            Err(e) => {
                tracing::debug!(post_id = %post.id, error = %e, "Engagement counts unavailable");
            }
        }
    }
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct PostsResponse {
    #[serde(default)]
    data: Vec<RemotePost>,
}

#[derive(Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    data: Vec<Metric>,
}

#[derive(Deserialize)]
struct Metric {
    name: String,
    #[serde(default)]
    values: Vec<MetricValue>,
    #[serde(default)]
    total_value: Option<MetricValue>,
}

#[derive(Deserialize)]
struct MetricValue {
    #[serde(default)]
    value: u64,
}

impl Metric {
    fn value(&self) -> u64 {
        self.values
            .first()
            .or(self.total_value.as_ref())
            .map_or(0, |v| v.value)
    }
}

#[async_trait]
impl PublishingClient for ThreadsClient {
    async fn get_user_id(&self) -> Result<String, PublishError> {
        self.user_id
            .get_or_try_init(|| self.fetch_user_id())
            .await
            .cloned()
    }

    async fn create_post(
        &self,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<String, PublishError> {
        let len = text.chars().count();
        if len > self.config.max_chars {
            return Err(PublishError::ContentTooLong {
                len,
                max: self.config.max_chars,
            });
        }

        let user_id = self.get_user_id().await?;
        let creation_id = self.create_container(&user_id, text, reply_to_id).await?;
        let post_id = self.publish_container(&user_id, &creation_id).await?;

        tracing::debug!(remote_id = %post_id, reply_to = ?reply_to_id, "Published to Threads");
        Ok(post_id)
    }

    fn thread_gap(&self) -> Duration {
        self.config.thread_gap()
    }

    async fn get_post_insights(&self, post_id: &str) -> Result<PostInsights, PublishError> {
        let response = self
            .client
            .get(self.url(&format!("{}/insights", post_id)))
            .query(&[
                ("metric", INSIGHT_METRICS),
                ("access_token", self.access_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response, "fetch insights").await?;

        let body: InsightsResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let mut insights = PostInsights::default();
        for metric in &body.data {
            let value = metric.value();
            match metric.name.as_str() {
                "likes" => insights.likes = value,
                "replies" => insights.replies = value,
                "reposts" => insights.reposts = value,
                "quotes" => insights.quotes = value,
                "views" => insights.views = value,
                other => tracing::debug!(metric = other, "Ignoring unknown insight metric"),
            }
        }
        Ok(insights)
    }

    async fn get_user_posts(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<RemotePost>, PublishError> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(self.url(&format!("{}/threads", user)))
            .query(&[
                ("fields", POST_FIELDS),
                ("limit", limit.as_str()),
                ("access_token", self.access_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response, "fetch posts").await?;

        let body: PostsResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let mut posts = body.data;
        for post in &mut posts {
            self.fill_engagement(post).await;
        }
        Ok(posts)
    }
}
