//! Format constraints for generated content

use crate::model::GeneratedPost;

/// Smallest number of segments in a generated thread (head included)
pub const MIN_THREAD_SEGMENTS: usize = 3;
/// Largest number of segments in a generated thread (head included)
pub const MAX_THREAD_SEGMENTS: usize = 5;
/// Per-post character limit on Threads
pub const DEFAULT_MAX_CHARS: usize = 500;

/// Policy configuration
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Maximum characters per published segment
    pub max_chars: usize,
    pub min_thread_segments: usize,
    pub max_thread_segments: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            min_thread_segments: MIN_THREAD_SEGMENTS,
            max_thread_segments: MAX_THREAD_SEGMENTS,
        }
    }
}

/// Validates generator output before a Post is created from it
#[derive(Debug, Clone, Default)]
pub struct ContentPolicy {
    config: PolicyConfig,
}

impl ContentPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn max_chars(&self) -> usize {
        self.config.max_chars
    }

    /// Normalize a generated result and check it against the format rules.
    ///
    /// Segments are trimmed. For single posts stray follow-ups are dropped.
    pub fn validate(
        &self,
        generated: &GeneratedPost,
        is_thread: bool,
    ) -> Result<GeneratedPost, PolicyViolation> {
        let content = generated.content.trim().to_string();
        if content.is_empty() {
            return Err(PolicyViolation::EmptySegment { position: 0 });
        }
        self.check_length(&content, 0)?;

        if !is_thread {
            if generated.thread_posts.as_ref().is_some_and(|t| !t.is_empty()) {
                tracing::debug!("Dropping follow-ups from single-post result");
            }
            return Ok(GeneratedPost {
                content,
                thread_posts: None,
            });
        }

        let mut follow_ups = Vec::new();
        for (index, segment) in generated
            .thread_posts
            .iter()
            .flatten()
            .enumerate()
        {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(PolicyViolation::EmptySegment { position: index + 1 });
            }
            self.check_length(segment, index + 1)?;
            follow_ups.push(segment.to_string());
        }

        let total = follow_ups.len() + 1;
        if total < self.config.min_thread_segments || total > self.config.max_thread_segments {
            return Err(PolicyViolation::ThreadLength {
                count: total,
                min: self.config.min_thread_segments,
                max: self.config.max_thread_segments,
            });
        }

        Ok(GeneratedPost {
            content,
            thread_posts: Some(follow_ups),
        })
    }

    fn check_length(&self, segment: &str, position: usize) -> Result<(), PolicyViolation> {
        let len = segment.chars().count();
        if len > self.config.max_chars {
            return Err(PolicyViolation::TooLong {
                position,
                len,
                max: self.config.max_chars,
            });
        }
        Ok(())
    }

    /// Format rules as prompt text
    pub fn prompt_rules(&self, is_thread: bool) -> String {
        let mut lines = vec![format!(
            "- Each post must be at most {} characters",
            self.config.max_chars
        )];
        if is_thread {
            lines.push(format!(
                "- Write a thread of {} to {} posts in total, each one building on the previous",
                self.config.min_thread_segments, self.config.max_thread_segments
            ));
        }
        lines.join("\n")
    }
}

/// Policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("Segment {position} is empty")]
    EmptySegment { position: usize },
    #[error("Segment {position} has {len} characters, limit is {max}")]
    TooLong {
        position: usize,
        len: usize,
        max: usize,
    },
    #[error("Thread has {count} segments, expected {min} to {max}")]
    ThreadLength { count: usize, min: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(segments: &[&str]) -> GeneratedPost {
        GeneratedPost {
            content: segments[0].to_string(),
            thread_posts: Some(segments[1..].iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn test_single_post_drops_follow_ups() {
        let policy = ContentPolicy::default();
        let result = policy.validate(&thread(&["  hello  ", "stray"]), false).unwrap();

        assert_eq!(result.content, "hello");
        assert_eq!(result.thread_posts, None);
    }

    #[test]
    fn test_thread_accepts_three_to_five_segments() {
        let policy = ContentPolicy::default();

        assert!(policy.validate(&thread(&["a", "b", "c"]), true).is_ok());
        assert!(policy.validate(&thread(&["a", "b", "c", "d", "e"]), true).is_ok());

        let err = policy.validate(&thread(&["a", "b"]), true).unwrap_err();
        assert_eq!(err, PolicyViolation::ThreadLength { count: 2, min: 3, max: 5 });

        let err = policy
            .validate(&thread(&["a", "b", "c", "d", "e", "f"]), true)
            .unwrap_err();
        assert!(matches!(err, PolicyViolation::ThreadLength { count: 6, .. }));
    }

    #[test]
    fn test_thread_without_follow_ups_is_rejected() {
        let policy = ContentPolicy::default();
        let generated = GeneratedPost {
            content: "only head".to_string(),
            thread_posts: None,
        };

        assert!(matches!(
            policy.validate(&generated, true),
            Err(PolicyViolation::ThreadLength { count: 1, .. })
        ));
    }

    #[test]
    fn test_empty_segment_rejected() {
        let policy = ContentPolicy::default();
        let err = policy.validate(&thread(&["a", "  ", "c"]), true).unwrap_err();
        assert_eq!(err, PolicyViolation::EmptySegment { position: 1 });

        let err = policy.validate(&thread(&[""]), false).unwrap_err();
        assert_eq!(err, PolicyViolation::EmptySegment { position: 0 });
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let policy = ContentPolicy::new(PolicyConfig {
            max_chars: 5,
            ..Default::default()
        });

        // five multi-byte characters fit
        assert!(policy.validate(&thread(&["こんにちは"]), false).is_ok());
        let err = policy.validate(&thread(&["こんにちは!"]), false).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::TooLong {
                position: 0,
                len: 6,
                max: 5
            }
        );
    }

    #[test]
    fn test_prompt_rules_mentions_thread_bounds() {
        let policy = ContentPolicy::default();
        let rules = policy.prompt_rules(true);
        assert!(rules.contains("500 characters"));
        assert!(rules.contains("3 to 5 posts"));
        assert!(!policy.prompt_rules(false).contains("thread"));
    }
}
