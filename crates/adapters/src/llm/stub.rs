//! Stub generator for testing and offline mode

use async_trait::async_trait;
use postpilot_domain::policy::MIN_THREAD_SEGMENTS;
use postpilot_domain::{
    CompetitorPost, ContentGenerator, GenerateError, GeneratedPost, GenerationRequest,
    PostAnalysis,
};

/// Deterministic generator that derives its output from its input
#[derive(Debug, Clone, Default)]
pub struct StubGenerator {
    error: Option<String>,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stub whose every call fails with an API error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    fn check(&self) -> Result<(), GenerateError> {
        match &self.error {
            Some(message) => Err(GenerateError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn analysis_of<'a>(texts: impl Iterator<Item = &'a str>) -> PostAnalysis {
        let mut count = 0usize;
        let mut total_chars = 0usize;
        let mut hashtags: Vec<String> = Vec::new();

        for text in texts {
            count += 1;
            total_chars += text.chars().count();
            for word in text.split_whitespace() {
                if word.starts_with('#') && word.len() > 1 && !hashtags.iter().any(|h| h == word) {
                    hashtags.push(word.to_string());
                }
            }
        }

        PostAnalysis {
            tone: vec!["neutral".to_string()],
            topics: vec!["general".to_string()],
            hashtags,
            avg_length: if count == 0 {
                0.0
            } else {
                total_chars as f64 / count as f64
            },
            structure: "single paragraph".to_string(),
            key_patterns: vec![],
            viral_elements: vec![],
        }
    }

    fn draft(request: &GenerationRequest, prefix: &str) -> GeneratedPost {
        let topic = request.topic.as_deref().unwrap_or("today");
        let tag = request
            .analysis
            .hashtags
            .first()
            .map(|h| format!(" {}", h))
            .unwrap_or_default();
        let content = format!("{}{}{}", prefix, topic, tag);

        let thread_posts = request.is_thread.then(|| {
            (2..=MIN_THREAD_SEGMENTS)
                .map(|n| format!("{}/{} on {}", n, MIN_THREAD_SEGMENTS, topic))
                .collect()
        });

        GeneratedPost {
            content,
            thread_posts,
        }
    }
}

#[async_trait]
impl ContentGenerator for StubGenerator {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn analyze_posts(&self, posts: &[String]) -> Result<PostAnalysis, GenerateError> {
        self.check()?;
        Ok(Self::analysis_of(posts.iter().map(String::as_str)))
    }

    async fn generate_post(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError> {
        self.check()?;
        Ok(Self::draft(request, "Thoughts on "))
    }

    async fn analyze_competitor_posts(
        &self,
        posts: &[CompetitorPost],
    ) -> Result<PostAnalysis, GenerateError> {
        self.check()?;
        let mut analysis = Self::analysis_of(posts.iter().map(|p| p.text.as_str()));
        analysis.viral_elements = vec!["strong opening line".to_string()];
        Ok(analysis)
    }

    async fn generate_viral_post(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerateError> {
        self.check()?;
        Ok(Self::draft(request, "You won't believe this about "))
    }
}
