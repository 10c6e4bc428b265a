//! Google Gemini API adapter

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

/// Content generator backed by Gemini `generateContent`
pub struct GeminiGenerator {
    client: Client,
    api_key: SecretString,
    base_url: String,
    config: LlmConfig,
}

impl GeminiGenerator {
    pub fn new(api_key: SecretString, config: LlmConfig) -> Self {
        Self::with_base_url(
            api_key,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
            config,
        )
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
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(task.temperature(&self.config.temperatures)),
                max_output_tokens: Some(self.config.max_output_tokens),
                response_mime_type: Some("application/json".to_string()),
            }),
            system_instruction: Some(SystemInstruction {
                parts: vec![Part {
                    text: task.system_prompt().to_string(),
                }],
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
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

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Api(format!("Unexpected response body: {}", e)))?;

        let text = api_response
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "systemInstruction")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxOutputTokens")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "responseMimeType")]
    response_mime_type: Option<String>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    fn name(&self) -> &'static str {
        "gemini"
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
