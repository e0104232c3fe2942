use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::activity::IssueActivity;
use crate::config::{mask_of, ContentEvaluatorConfig};
use crate::error::{Error, Result};
use crate::llm::prompts::{
    comment_prompt, output_token_ceiling, placeholder_response, review_comment_prompt,
    CommentToScore, ContextComment, ReviewCommentToScore,
};
use crate::llm::provider::{RelevanceProvider, Relevances};
use crate::models::ledger::{CommentScore, Ledger};
use crate::roles::RoleFlags;
use crate::scoring::stage::ScoringStage;

/// Replaces the formatting-only contribution already folded into the prior
/// reward with its relevance-weighted counterpart; reward from other stages
/// is preserved additively.
pub fn merge_reward(prior: Decimal, contribution: Decimal, relevance: Decimal) -> Decimal {
    prior - contribution + contribution * relevance
}

/// Scores topical relevance through the external LLM service and commits
/// the merged reward. Comments whose role has a configured fixed relevance
/// never reach the service; review comments and plain comments are batched
/// into separate prompts.
pub struct ContentEvaluator {
    config: ContentEvaluatorConfig,
    fixed: HashMap<u32, Decimal>,
    provider: Arc<dyn RelevanceProvider>,
}

impl ContentEvaluator {
    pub fn new(config: ContentEvaluatorConfig, provider: Arc<dyn RelevanceProvider>) -> Self {
        let fixed = config
            .multipliers
            .iter()
            .filter_map(|m| {
                Decimal::from_f64(m.relevance).map(|value| (mask_of(&m.role).bits(), value))
            })
            .collect();
        Self {
            config,
            fixed,
            provider,
        }
    }

    fn split_by_prompt(
        &self,
        comments: &[CommentScore],
    ) -> (Vec<CommentToScore>, Vec<ReviewCommentToScore>) {
        let mut plain = Vec::new();
        let mut review = Vec::new();
        for comment in comments {
            if self.fixed.contains_key(&comment.role.bits()) {
                continue;
            }
            if comment.role.contains(RoleFlags::REVIEW) {
                review.push(ReviewCommentToScore {
                    id: comment.id,
                    comment: comment.content.clone(),
                    diff_hunk: comment.diff_hunk.clone(),
                });
            } else {
                plain.push(CommentToScore {
                    id: comment.id,
                    comment: comment.content.clone(),
                });
            }
        }
        (plain, review)
    }

    async fn evaluate_plain(
        &self,
        specification: &str,
        subset: &[CommentToScore],
        context: &[ContextComment],
    ) -> Result<Relevances> {
        if subset.is_empty() {
            return Ok(Relevances::new());
        }
        let placeholder = placeholder_response(subset.iter().map(|c| c.id));
        let max_tokens = output_token_ceiling(&placeholder, self.config.openai.token_limit);
        let prompt = comment_prompt(specification, subset, context)?;
        self.provider.score(&prompt, max_tokens).await
    }

    async fn evaluate_review(
        &self,
        specification: &str,
        subset: &[ReviewCommentToScore],
    ) -> Result<Relevances> {
        if subset.is_empty() {
            return Ok(Relevances::new());
        }
        let placeholder = placeholder_response(subset.iter().map(|c| c.id));
        let max_tokens = output_token_ceiling(&placeholder, self.config.openai.token_limit);
        let prompt = review_comment_prompt(specification, subset)?;
        self.provider.score(&prompt, max_tokens).await
    }

    async fn evaluate_contributor(
        &self,
        specification: &str,
        comments: &[CommentScore],
        context: &[ContextComment],
    ) -> Result<Vec<CommentScore>> {
        let (plain, review) = self.split_by_prompt(comments);
        let expected = plain.len() + review.len();

        let (plain_relevances, review_relevances) = tokio::try_join!(
            self.evaluate_plain(specification, &plain, context),
            self.evaluate_review(specification, &review),
        )?;

        let mut relevances = plain_relevances;
        relevances.extend(review_relevances);

        if relevances.len() != expected {
            return Err(Error::RelevanceMismatch {
                expected,
                received: relevances.len(),
            });
        }
        for id in plain.iter().map(|c| c.id).chain(review.iter().map(|c| c.id)) {
            if !relevances.contains_key(&id.to_string()) {
                return Err(Error::RelevanceMismatch {
                    expected,
                    received: relevances.len(),
                });
            }
        }

        let mut scored = comments.to_vec();
        for comment in &mut scored {
            let relevance = self.relevance_for(comment, &relevances)?;
            let prior = comment.score.reward;
            let reward = match &comment.score.formatting {
                Some(formatting) => merge_reward(prior, formatting.total, relevance),
                None => prior,
            };
            comment.score.relevance = Some(relevance);
            comment.score.reward = reward;
        }
        Ok(scored)
    }

    fn relevance_for(&self, comment: &CommentScore, relevances: &Relevances) -> Result<Decimal> {
        if let Some(fixed) = self.fixed.get(&comment.role.bits()) {
            return Ok(*fixed);
        }
        if let Some(value) = relevances.get(&comment.id.to_string()) {
            return Decimal::from_f64(*value).ok_or_else(|| {
                Error::MalformedResponse(format!("relevance {value} is not representable"))
            });
        }
        // Full credit when no stage produced a coefficient
        Ok(Decimal::ONE)
    }
}

#[async_trait]
impl ScoringStage for ContentEvaluator {
    fn name(&self) -> &'static str {
        "content-evaluator"
    }

    fn enabled(&self) -> bool {
        if let Err(e) = self.config.validate() {
            tracing::warn!(
                "Invalid configuration detected for the content evaluator, disabling: {}",
                e
            );
            return false;
        }
        self.config.enabled
    }

    async fn transform(&self, activity: &IssueActivity, ledger: &mut Ledger) -> Result<()> {
        let Some(specification) = activity.specification_body() else {
            tracing::warn!("Issue specification body is missing, skipping relevance evaluation");
            return Ok(());
        };

        let context: Vec<ContextComment> = activity
            .all_comments()
            .into_iter()
            .map(|record| ContextComment {
                id: record.id,
                comment: record.body,
                author: record.author.login,
            })
            .collect();

        // One evaluation job per contributor, dispatched concurrently and
        // awaited jointly; the ledger is only written once all have settled.
        let jobs: Vec<_> = ledger
            .iter()
            .map(|(login, entry)| {
                let login = login.clone();
                let comments = entry.comments.clone();
                let context = &context;
                async move {
                    let scored = self
                        .evaluate_contributor(specification, &comments, context)
                        .await;
                    (login, scored)
                }
            })
            .collect();

        for (login, outcome) in join_all(jobs).await {
            let scored = outcome?;
            if let Some(entry) = ledger.get_mut(&login) {
                entry.comments = scored;
                entry.recompute_total();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixedRelevance, RoleName};
    use crate::models::ledger::{FormattingScore, ScoreRecord};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedProvider {
        calls: AtomicUsize,
        response: Relevances,
    }

    impl CannedProvider {
        fn new(response: Relevances) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response,
            }
        }
    }

    #[async_trait]
    impl RelevanceProvider for CannedProvider {
        async fn score(&self, _prompt: &str, _max_tokens: u32) -> Result<Relevances> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn comment(id: u64, role: RoleFlags, reward: Decimal) -> CommentScore {
        CommentScore {
            id,
            content: format!("comment {id}"),
            url: String::new(),
            role,
            diff_hunk: None,
            minimized: false,
            score: ScoreRecord {
                formatting: Some(FormattingScore {
                    breakdown: BTreeMap::new(),
                    multiplier: dec!(1),
                    word_value: dec!(1),
                    total: reward,
                }),
                relevance: None,
                reward,
            },
        }
    }

    fn fixed_config(role: Vec<RoleName>, relevance: f64) -> ContentEvaluatorConfig {
        ContentEvaluatorConfig {
            multipliers: vec![FixedRelevance { role, relevance }],
            ..Default::default()
        }
    }

    #[test]
    fn merge_halves_reward_at_half_relevance() {
        assert_eq!(merge_reward(dec!(10), dec!(10), dec!(0.5)), dec!(5));
    }

    #[test]
    fn merge_is_identity_at_full_relevance() {
        assert_eq!(merge_reward(dec!(10), dec!(10), dec!(1)), dec!(10));
    }

    #[test]
    fn merge_preserves_reward_from_other_stages() {
        // 3 of the 13 came from elsewhere and must survive untouched
        assert_eq!(merge_reward(dec!(13), dec!(10), dec!(0.5)), dec!(8));
    }

    #[test]
    fn merge_never_goes_negative_without_other_stages() {
        for relevance in [dec!(0), dec!(0.25), dec!(1)] {
            assert!(merge_reward(dec!(7), dec!(7), relevance) >= Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn fixed_override_bypasses_the_service() {
        let provider = Arc::new(CannedProvider::new(Relevances::new()));
        let evaluator = ContentEvaluator::new(
            fixed_config(vec![RoleName::Issue, RoleName::Issuer], 0.2),
            provider.clone(),
        );

        let comments = vec![comment(
            11,
            RoleFlags::ISSUE | RoleFlags::ISSUER,
            dec!(10),
        )];
        let scored = evaluator
            .evaluate_contributor("spec body", &comments, &[])
            .await
            .unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(scored[0].score.relevance, Some(dec!(0.2)));
        assert_eq!(scored[0].score.reward, dec!(2));
    }

    #[tokio::test]
    async fn missing_response_entry_is_a_mismatch() {
        let mut response = Relevances::new();
        response.insert("11".to_string(), 0.5);
        let provider = Arc::new(CannedProvider::new(response));
        let evaluator =
            ContentEvaluator::new(ContentEvaluatorConfig::default(), provider);

        // three comments requested, one scored
        let comments = vec![
            comment(11, RoleFlags::ISSUE, dec!(4)),
            comment(12, RoleFlags::ISSUE, dec!(4)),
            comment(13, RoleFlags::ISSUE, dec!(4)),
        ];
        let err = evaluator
            .evaluate_contributor("spec body", &comments, &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::RelevanceMismatch {
                expected: 3,
                received: 1
            }
        ));
    }

    #[tokio::test]
    async fn unknown_id_in_response_is_a_mismatch() {
        let mut response = Relevances::new();
        response.insert("999".to_string(), 0.5);
        let provider = Arc::new(CannedProvider::new(response));
        let evaluator =
            ContentEvaluator::new(ContentEvaluatorConfig::default(), provider);

        let comments = vec![comment(11, RoleFlags::ISSUE, dec!(4))];
        let err = evaluator
            .evaluate_contributor("spec body", &comments, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RelevanceMismatch { .. }));
    }

    #[tokio::test]
    async fn review_comments_go_to_their_own_prompt() {
        let mut response = Relevances::new();
        response.insert("21".to_string(), 0.8);
        let provider = Arc::new(CannedProvider::new(response));
        let evaluator = ContentEvaluator::new(
            ContentEvaluatorConfig {
                multipliers: vec![],
                ..Default::default()
            },
            provider.clone(),
        );

        let mut review = comment(21, RoleFlags::REVIEW | RoleFlags::ASSIGNEE, dec!(5));
        review.diff_hunk = Some("@@ -1 +1 @@".to_string());
        let scored = evaluator
            .evaluate_contributor("spec body", &[review], &[])
            .await
            .unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scored[0].score.relevance, Some(dec!(0.8)));
        assert_eq!(scored[0].score.reward, dec!(4));
    }

    #[test]
    fn invalid_fixed_relevance_disables_the_stage() {
        let provider = Arc::new(CannedProvider::new(Relevances::new()));
        let evaluator = ContentEvaluator::new(
            fixed_config(vec![RoleName::Issue], 1.5),
            provider,
        );
        assert!(!evaluator.enabled());
    }
}
