//! OpenAI Chat Completions adapter

use async_trait::async_trait;
use postpilot_domain::{
    CompetitorPost, ContentGenerator, GenerateError, GeneratedPost, GenerationRequest,
    PostAnalysis,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmConfig, Task, complete_with_retries, parse_analysis, parse_generated, prompts};

/// Content generator backed by OpenAI chat completions in JSON mode
pub struct OpenAiGenerator {
    client: Client,
    api_key: SecretString,
    base_url: String,
    config: LlmConfig,
}

impl OpenAiGenerator {
    pub fn new(api_key: SecretString, config: LlmConfig) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".to_string(), config)
    }

    pub fn with_base_url(api_key: SecretString, base_url: String, config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url,
            config,
        }
    }

    async fn call_api(&self, task: Task, prompt: &str) -> Result<String, GenerateError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: task.system_prompt().to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: task.temperature(&self.config.temperatures),
            max_tokens: Some(self.config.max_output_tokens),
            response_format: ResponseFormat {
                r#type: "json_object".to_string(),
            },
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout
                } else {
                    GenerateError::Api(e.to_string())
                }
            })?;

        if response.status() == 429 {
            return Err(GenerateError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Api(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Api(format!("Unexpected response body: {}", e)))?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(text)
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn analyze_posts(&self, posts: &[String]) -> Result<PostAnalysis, GenerateError> {
        let prompt = prompts::analyze_posts(posts);
        complete_with_retries(
            self.config.retries,
            Task::Analyze,
            || self.call_api(Task::Analyze, &prompt),
            parse_analysis,
        )
        .await
    }

    async fn generate_post(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError> {
        let prompt = prompts::generate_post(request);
        complete_with_retries(
            self.config.retries,
            Task::Generate,
            || self.call_api(Task::Generate, &prompt),
            parse_generated,
        )
        .await
    }

    async fn analyze_competitor_posts(
        &self,
        posts: &[CompetitorPost],
    ) -> Result<PostAnalysis, GenerateError> {
        let prompt = prompts::analyze_competitor_posts(posts);
        complete_with_retries(
            self.config.retries,
            Task::AnalyzeCompetitors,
            || self.call_api(Task::AnalyzeCompetitors, &prompt),
            parse_analysis,
        )
        .await
    }

    async fn generate_viral_post(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError> {
        let prompt = prompts::generate_viral_post(request);
        complete_with_retries(
            self.config.retries,
            Task::GenerateViral,
            || self.call_api(Task::GenerateViral, &prompt),
            parse_generated,
        )
        .await
    }
}
