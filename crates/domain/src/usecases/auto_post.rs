//! Rule engine: executes due auto-post rules

use std::sync::Arc;
use std::time::Duration;

use crate::model::{AutoPostRule, ItemResult, Post, PostStatus, RunSummary};
use crate::policy::ContentPolicy;
use crate::ports::{Clock, ContentGenerators, GenerationRequest, PlatformConnector, Store};
use crate::usecases::error::ServiceError;
use crate::usecases::posts::PostService;
use crate::usecases::schedule::Schedule;
use crate::usecases::within;

/// Per-rule outcome of one execution
#[derive(Debug)]
pub enum RuleOutcome {
    Published { post: Post },
    Skipped { reason: String },
}

pub struct AutoPoster<S, P, Cl>
where
    S: Store + ?Sized,
    P: PlatformConnector + ?Sized,
    Cl: Clock + ?Sized,
{
    store: Arc<S>,
    generators: ContentGenerators,
    posts: PostService<S, P, Cl>,
    clock: Arc<Cl>,
    policy: ContentPolicy,
    call_timeout: Option<Duration>,
}

impl<S, P, Cl> AutoPoster<S, P, Cl>
where
    S: Store + ?Sized,
    P: PlatformConnector + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        generators: ContentGenerators,
        posts: PostService<S, P, Cl>,
        clock: Arc<Cl>,
        policy: ContentPolicy,
    ) -> Self {
        Self {
            store,
            generators,
            posts,
            clock,
            policy,
            call_timeout: None,
        }
    }

    /// Bound each generation call; publish calls are bounded by the post service
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Run every due rule once, sequentially.
    ///
    /// Only a failed selection query aborts the invocation; each rule's
    /// failure is caught, recorded on the rule, and reported in the summary.
    pub async fn run_due_rules(&self) -> Result<RunSummary, ServiceError> {
        let now = self.clock.now();
        let due: Vec<AutoPostRule> = self
            .store
            .find_due_rules(now)
            .await?
            .into_iter()
            .filter(|rule| rule.is_due(now))
            .collect();

        tracing::info!(count = due.len(), "Running due rules");

        let mut summary = RunSummary::default();
        for rule in &due {
            let result = match self.run_rule(rule).await {
                Ok(RuleOutcome::Published { post }) => {
                    let mut result = ItemResult::success(rule.id).with_name(&rule.name);
                    result.post_id = Some(post.id);
                    result.remote_id = post.threads_post_id;
                    result
                }
                Ok(RuleOutcome::Skipped { reason }) => {
                    tracing::info!(rule_id = %rule.id, reason = %reason, "Skipped rule");
                    ItemResult::skipped(rule.id, reason).with_name(&rule.name)
                }
                Err(e) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "Rule execution failed");
                    if let Err(store_error) = self
                        .store
                        .record_rule_failure(rule.id, &e.to_string(), self.clock.now())
                        .await
                    {
                        tracing::error!(
                            rule_id = %rule.id,
                            error = %store_error,
                            "Failed to record rule failure"
                        );
                    }
                    ItemResult::failed(rule.id, e.to_string()).with_name(&rule.name)
                }
            };
            summary.push(result);
        }

        Ok(summary)
    }

    /// Execute one rule: generate, create an APPROVED post, publish, advance.
    ///
    /// The rule's schedule is only advanced after the publish succeeded.
    pub async fn run_rule(&self, rule: &AutoPostRule) -> Result<RuleOutcome, ServiceError> {
        if !rule.auto_generate {
            return Ok(RuleOutcome::Skipped {
                reason: "manual content is not supported for auto-post rules".to_string(),
            });
        }

        let account = self
            .store
            .get_account(rule.account_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account", rule.account_id))?;

        let analyzed = self
            .store
            .latest_analysis(account.id)
            .await?
            .ok_or_else(|| ServiceError::AnalysisUnavailable(account.id.to_string()))?;

        let generator = self.generators.select(rule.ai_model)?;
        let request = GenerationRequest {
            analysis: analyzed.analysis,
            topic: rule.topic.clone(),
            is_thread: rule.is_thread,
            custom_instructions: rule.custom_prompt.clone(),
        };

        tracing::debug!(rule_id = %rule.id, backend = generator.name(), "Generating post");

        let generated = within(self.call_timeout, generator.generate_post(&request))
            .await
            .ok_or_else(|| ServiceError::Timeout(format!("generation for rule {}", rule.id)))??;
        let generated = self.policy.validate(&generated, rule.is_thread)?;

        let now = self.clock.now();
        let mut post = Post::new(
            account.id,
            generated.content,
            generated.thread_posts,
            PostStatus::Approved,
            now,
        );
        post.scheduled_for = Some(now);
        self.store.insert_post(&post).await?;

        let post = self.posts.publish_post(post, &account).await?;

        // Not atomic with the publish: a crash here republishes on the next poll.
        let ran_at = self.clock.now();
        let next_run_at = Schedule::of(rule).next_run_after(ran_at)?;
        self.store
            .record_rule_run(rule.id, ran_at, next_run_at)
            .await?;

        tracing::info!(
            rule_id = %rule.id,
            post_id = %post.id,
            next_run_at = %next_run_at,
            "Rule executed"
        );

        Ok(RuleOutcome::Published { post })
    }
}
