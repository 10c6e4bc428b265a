//! Subcommand implementations

pub mod accounts;
pub mod analytics;
pub mod analyze;
pub mod config;
pub mod doctor;
pub mod generate;
pub mod posts;
pub mod rules;
pub mod run;
pub mod settings;

use anyhow::{Context, Result, bail};
use postpilot_domain::{Post, RunSummary};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .with_context(|| format!("Invalid RFC 3339 timestamp: {}", value))
}

pub(crate) fn format_timestamp(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

pub(crate) fn parse_timezone(value: &str) -> Result<chrono_tz::Tz> {
    match value.trim().parse::<chrono_tz::Tz>() {
        Ok(tz) => Ok(tz),
        Err(e) => bail!("Invalid timezone {}: {}", value, e),
    }
}

/// Empty input clears an optional text field
pub(crate) fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

pub(crate) fn print_post(post: &Post) {
    println!("{}  [{}]", post.id, post.status);
    if let Some(at) = post.scheduled_for {
        println!("  Scheduled: {}", format_timestamp(at));
    }
    if let Some(at) = post.published_at {
        println!("  Published: {}", format_timestamp(at));
    }
    if let Some(ref remote) = post.threads_post_id {
        println!("  Threads id: {}", remote);
    }
    if let Some(ref error) = post.last_error {
        println!("  Last error: {}", error);
    }
    println!("  {}", post.content);
    for (i, segment) in post.thread_posts.iter().flatten().enumerate() {
        println!("  ({}) {}", i + 2, segment);
    }
}

pub(crate) fn print_summary(label: &str, summary: &RunSummary) {
    println!("{}: {} processed", label, summary.processed_count);
    for item in &summary.results {
        let name = item.name.as_deref().unwrap_or("");
        match item.error {
            Some(ref error) => println!("  {} {:?} {} - {}", item.id, item.status, name, error),
            None => println!("  {} {:?} {}", item.id, item.status, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clearable() {
        assert_eq!(clearable(None), None);
        assert_eq!(clearable(Some("  ".to_string())), Some(None));
        assert_eq!(
            clearable(Some(" calm ".to_string())),
            Some(Some("calm".to_string()))
        );
    }

    #[test]
    fn test_parse_timestamp_requires_offset() {
        assert!(parse_timestamp("2025-03-01T09:00:00+09:00").is_ok());
        assert!(parse_timestamp("2025-03-01 09:00").is_err());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Asia/Tokyo").unwrap(), chrono_tz::Asia::Tokyo);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
