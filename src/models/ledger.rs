use std::collections::BTreeMap;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::comment::CommentRecord;
use crate::roles::RoleFlags;

/// Weighted word tally for one markup tag. `count` accumulates across
/// occurrences; `score` is a property of the tag, fixed per occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagScore {
    pub count: u64,
    pub score: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattingScore {
    pub breakdown: BTreeMap<String, TagScore>,
    pub multiplier: Decimal,
    pub word_value: Decimal,
    /// The relevance-independent contribution this breakdown produced. The
    /// merge rule later removes it and re-adds it relevance-weighted.
    pub total: Decimal,
}

/// Score fields appended by successive pipeline stages. Stages only add
/// fields they own; `reward` alone is replaced, and only by the merge rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatting: Option<FormattingScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<Decimal>,
    pub reward: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentScore {
    pub id: u64,
    pub content: String,
    pub url: String,
    pub role: RoleFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_hunk: Option<String>,
    #[serde(skip)]
    pub minimized: bool,
    pub score: ScoreRecord,
}

impl From<CommentRecord> for CommentScore {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            content: record.body,
            url: record.url,
            role: record.role,
            diff_hunk: record.diff_hunk,
            minimized: record.minimized,
            score: ScoreRecord::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReward {
    pub reward: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContributorEntry {
    pub user_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskReward>,
    pub comments: Vec<CommentScore>,
    pub total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_fragment: Option<String>,
}

impl ContributorEntry {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            task: None,
            comments: Vec::new(),
            total: Decimal::ZERO,
            permit_url: None,
            report_fragment: None,
        }
    }

    /// Total = task reward + every comment reward. Stages call this after
    /// settling their writes so downstream readers always see a consistent
    /// figure.
    pub fn recompute_total(&mut self) {
        let mut total = self.task.as_ref().map(|t| t.reward).unwrap_or(Decimal::ZERO);
        for comment in &self.comments {
            total += comment.score.reward;
        }
        self.total = total;
    }

    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.comments.is_empty()
    }
}

/// Run-scoped reward state, keyed by contributor login. Insertion order is
/// the order authors are first encountered, which the report preserves.
pub type Ledger = IndexMap<String, ContributorEntry>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_sums_task_and_comment_rewards() {
        let mut entry = ContributorEntry::new(7);
        entry.task = Some(TaskReward { reward: dec!(25) });
        entry.comments.push(CommentScore {
            id: 1,
            content: "hello".into(),
            url: String::new(),
            role: RoleFlags::ISSUE,
            diff_hunk: None,
            minimized: false,
            score: ScoreRecord {
                reward: dec!(4.5),
                ..Default::default()
            },
        });
        entry.recompute_total();
        assert_eq!(entry.total, dec!(29.5));
    }
}
