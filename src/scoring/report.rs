use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::activity::IssueActivity;
use crate::config::ReportConfig;
use crate::error::{Error, Result};
use crate::github::{GitHubClient, IssueRef};
use crate::models::ledger::{CommentScore, ContributorEntry, Ledger};
use crate::roles::RoleFlags;
use crate::scoring::stage::ScoringStage;

/// Renders one self-contained report fragment per contributor and, when
/// posting is enabled, delivers the combined report back to the issue.
/// Delivery failure leaves the ledger valid and is only surfaced to the
/// operator.
pub struct ReportModule {
    config: ReportConfig,
    delivery: Option<(Arc<GitHubClient>, IssueRef)>,
}

impl ReportModule {
    pub fn new(config: ReportConfig, delivery: Option<(Arc<GitHubClient>, IssueRef)>) -> Self {
        Self { config, delivery }
    }
}

#[async_trait]
impl ScoringStage for ReportModule {
    fn name(&self) -> &'static str {
        "report"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn transform(&self, _activity: &IssueActivity, ledger: &mut Ledger) -> Result<()> {
        let mut body = String::new();
        for (login, entry) in ledger.iter_mut() {
            entry.recompute_total();
            let fragment = render_fragment(login, entry);
            body.push_str(&fragment);
            entry.report_fragment = Some(fragment);
        }

        if let Some(path) = &self.config.debug_output {
            std::fs::write(path, &body)?;
        }

        if self.config.post {
            match &self.delivery {
                Some((client, target)) => {
                    if let Err(e) = client.post_issue_comment(target, &body).await {
                        let err = Error::Delivery(e.to_string());
                        tracing::error!("Could not post evaluation report: {}", err);
                    }
                }
                None => tracing::warn!("Posting requested but no delivery target configured"),
            }
        }

        Ok(())
    }
}

fn render_fragment(login: &str, entry: &ContributorEntry) -> String {
    let mut specification: Option<&CommentScore> = None;
    let mut issue_comments: Vec<&CommentScore> = Vec::new();
    let mut review_comments: Vec<&CommentScore> = Vec::new();
    for comment in &entry.comments {
        if comment.role.contains(RoleFlags::TASK) {
            specification = Some(comment);
        } else if comment.role.contains(RoleFlags::REVIEW) {
            review_comments.push(comment);
        } else {
            issue_comments.push(comment);
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "<details><summary><b>@{} — {}</b></summary>\n\n",
        login, entry.total
    ));

    out.push_str("**Contributions Overview**\n\n");
    out.push_str("| View | Contribution | Count | Reward |\n| --- | --- | --- | --- |\n");
    if let Some(task) = &entry.task {
        out.push_str(&format!("| Issue | Task | 1 | {} |\n", task.reward));
    }
    if let Some(spec) = specification {
        out.push_str(&format!(
            "| Issue | Specification | 1 | {} |\n",
            spec.score.reward
        ));
    }
    if !issue_comments.is_empty() {
        out.push_str(&format!(
            "| Issue | Comment | {} | {} |\n",
            issue_comments.len(),
            reward_sum(&issue_comments)
        ));
    }
    if !review_comments.is_empty() {
        out.push_str(&format!(
            "| Review | Comment | {} | {} |\n",
            review_comments.len(),
            reward_sum(&review_comments)
        ));
    }

    if !issue_comments.is_empty() || !review_comments.is_empty() {
        out.push_str("\n**Conversation Incentives**\n\n");
        out.push_str("| Comment | Formatting | Relevance | Reward |\n| --- | --- | --- | --- |\n");
        for comment in issue_comments.iter().chain(review_comments.iter()) {
            out.push_str(&incentive_row(comment));
        }
    }

    out.push_str("\n</details>\n\n");
    out
}

fn reward_sum(comments: &[&CommentScore]) -> Decimal {
    comments
        .iter()
        .fold(Decimal::ZERO, |acc, c| acc + c.score.reward)
}

fn incentive_row(comment: &CommentScore) -> String {
    let formatting_points = comment
        .score
        .formatting
        .as_ref()
        .map(|f| {
            f.breakdown.values().fold(Decimal::ZERO, |acc, tag| {
                acc + tag.score * Decimal::from(tag.count)
            })
        })
        .unwrap_or(Decimal::ZERO);
    let relevance = comment
        .score
        .relevance
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "| [{}]({}) | {} | {} | {} |\n",
        excerpt(&comment.content),
        comment.url,
        formatting_points,
        relevance,
        comment.score.reward
    )
}

/// First 64 characters of the comment, safe to embed in a markdown table.
fn excerpt(content: &str) -> String {
    let sanitized: String = content
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('|', "&#124;")
        .replace(['\n', '\r'], " ");
    let mut short: String = sanitized.chars().take(64).collect();
    if sanitized.chars().count() > 64 {
        short.push('…');
    }
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ledger::{ScoreRecord, TaskReward};
    use rust_decimal_macros::dec;

    fn scored_comment(id: u64, role: RoleFlags, reward: Decimal) -> CommentScore {
        CommentScore {
            id,
            content: "a useful remark".to_string(),
            url: format!("https://github.com/acme/widgets/issues/1#issuecomment-{id}"),
            role,
            diff_hunk: None,
            minimized: false,
            score: ScoreRecord {
                formatting: None,
                relevance: Some(dec!(0.75)),
                reward,
            },
        }
    }

    #[test]
    fn fragment_lists_every_contribution_kind() {
        let mut entry = ContributorEntry::new(2);
        entry.task = Some(TaskReward { reward: dec!(25) });
        entry
            .comments
            .push(scored_comment(11, RoleFlags::ISSUE | RoleFlags::ASSIGNEE, dec!(3)));
        entry
            .comments
            .push(scored_comment(21, RoleFlags::REVIEW | RoleFlags::ASSIGNEE, dec!(2)));
        entry.recompute_total();

        let fragment = render_fragment("bob", &entry);
        assert!(fragment.contains("@bob — 30"));
        assert!(fragment.contains("| Issue | Task | 1 | 25 |"));
        assert!(fragment.contains("| Issue | Comment | 1 | 3 |"));
        assert!(fragment.contains("| Review | Comment | 1 | 2 |"));
        assert!(fragment.contains("0.75"));
    }

    #[test]
    fn excerpt_escapes_markup_and_truncates() {
        let long = format!("<b>{}</b>", "word ".repeat(40));
        let short = excerpt(&long);
        assert!(short.starts_with("&lt;b&gt;"));
        assert!(short.ends_with('…'));
        assert!(!short.contains('<'));
        assert!(short.chars().count() <= 65);
    }
}
