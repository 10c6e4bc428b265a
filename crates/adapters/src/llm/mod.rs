//! Content generation backends

pub mod gemini;
pub mod openai;
pub mod prompts;
pub mod stub;

pub use gemini::GeminiGenerator;
pub use openai::OpenAiGenerator;
pub use stub::StubGenerator;

use postpilot_domain::{GenerateError, GeneratedPost, PostAnalysis};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

/// Sampling temperature per kind of request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskTemperatures {
    pub analyze: f64,
    pub generate: f64,
    pub competitor: f64,
    pub viral: f64,
}

impl Default for TaskTemperatures {
    fn default() -> Self {
        Self {
            analyze: 0.3,
            generate: 0.7,
            competitor: 0.3,
            viral: 0.8,
        }
    }
}

/// Common LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    pub temperatures: TaskTemperatures,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries on failure
    pub retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperatures: TaskTemperatures::default(),
            max_output_tokens: 1200,
            timeout_secs: 60,
            retries: 2,
        }
    }
}

/// The four request kinds a backend serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Analyze,
    Generate,
    AnalyzeCompetitors,
    GenerateViral,
}

impl Task {
    pub fn temperature(self, temperatures: &TaskTemperatures) -> f64 {
        match self {
            Task::Analyze => temperatures.analyze,
            Task::Generate => temperatures.generate,
            Task::AnalyzeCompetitors => temperatures.competitor,
            Task::GenerateViral => temperatures.viral,
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Task::Analyze => {
                "You analyse social media posts and extract their stylistic features. Output only valid JSON."
            }
            Task::Generate => {
                "You write social media posts that faithfully reproduce an analysed style. Output only valid JSON."
            }
            Task::AnalyzeCompetitors => {
                "You are a social media marketing analyst specialised in viral content. Output only valid JSON."
            }
            Task::GenerateViral => {
                "You write social media posts engineered for maximum engagement. Output only valid JSON."
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            Task::Analyze => "analyze",
            Task::Generate => "generate",
            Task::AnalyzeCompetitors => "analyze_competitors",
            Task::GenerateViral => "generate_viral",
        }
    }
}

/// Call a backend, parse its reply, and retry on transient and parse failures.
///
/// Rate limiting is returned immediately.
pub(crate) async fn complete_with_retries<T, C, Fut, P>(
    retries: u32,
    task: Task,
    mut call: C,
    parse: P,
) -> Result<T, GenerateError>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<String, GenerateError>>,
    P: Fn(&str) -> Result<T, GenerateError>,
{
    let mut last_error = None;
    for attempt in 0..=retries {
        if attempt > 0 {
            tracing::warn!(attempt = attempt, task = task.label(), "Retrying LLM call");
            tokio::time::sleep(Duration::from_millis(500 * 2_u64.pow(attempt))).await;
        }

        match call().await {
            Ok(response_text) => match parse(&response_text) {
                Ok(output) => return Ok(output),
                Err(e) => {
                    tracing::warn!(error = %e, task = task.label(), "Failed to parse response, will retry");
                    last_error = Some(e);
                }
            },
            Err(GenerateError::RateLimited) => {
                return Err(GenerateError::RateLimited);
            }
            Err(e) => {
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| GenerateError::Api("Unknown error".to_string())))
}

/// Parse a style analysis reply
pub fn parse_analysis(response: &str) -> Result<PostAnalysis, GenerateError> {
    let json_str = extract_json(response);
    serde_json::from_str(json_str)
        .map_err(|e| GenerateError::AnalysisParse(format!("Failed to parse JSON: {}", e)))
}

/// Parse a generation reply (`content` plus optional `threadPosts`)
pub fn parse_generated(response: &str) -> Result<GeneratedPost, GenerateError> {
    let json_str = extract_json(response);
    serde_json::from_str(json_str)
        .map_err(|e| GenerateError::GenerationParse(format!("Failed to parse JSON: {}", e)))
}

fn object_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{[\s\S]*\}").ok())
        .as_ref()
}

/// Extract JSON from response (handles markdown code blocks and surrounding prose)
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Check for ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed[start + 7..].find("```") {
            return trimmed[start + 7..start + 7 + end].trim();
        }
    }

    // Check for ``` ... ``` blocks
    if let Some(start) = trimmed.find("```") {
        if let Some(end) = trimmed[start + 3..].find("```") {
            let content = trimmed[start + 3..start + 3 + end].trim();
            // Skip language identifier if present
            if let Some(newline) = content.find('\n') {
                let first_line = &content[..newline];
                if !first_line.starts_with('{') {
                    return content[newline + 1..].trim();
                }
            }
            return content;
        }
    }

    if trimmed.starts_with('{') {
        return trimmed;
    }

    // Object embedded in prose
    object_pattern()
        .and_then(|pattern| pattern.find(trimmed))
        .map(|m| m.as_str())
        .unwrap_or(trimmed)
}
