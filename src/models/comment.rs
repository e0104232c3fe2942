use serde::{Deserialize, Serialize};

use crate::models::issue::Account;
use crate::roles::RoleFlags;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub node_id: String,
    pub body: Option<String>,
    pub user: Option<Account>,
    pub author_association: Option<String>,
    pub html_url: String,
    /// Collapsed/hidden state, resolved by a follow-up GraphQL query; the
    /// REST payload does not carry it.
    #[serde(default)]
    pub is_minimized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub node_id: String,
    pub body: Option<String>,
    pub user: Option<Account>,
    pub author_association: Option<String>,
    pub html_url: String,
    pub diff_hunk: Option<String>,
    pub pull_request_review_id: Option<u64>,
}

/// A review submission from the pull request files view. Its body, when
/// present, is scored like any other review comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullReview {
    pub id: u64,
    pub state: String,
    pub body: Option<String>,
    pub user: Option<Account>,
    pub author_association: Option<String>,
    pub html_url: String,
}

/// Unified comment view handed to the scoring pipeline: one shape for issue
/// comments, review comments, review submissions, pull request bodies, and
/// the issue body pseudo-comment. The role mask is assigned exactly once
/// during aggregation and never changes afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct CommentRecord {
    pub id: u64,
    pub author: Account,
    pub body: String,
    pub url: String,
    pub role: RoleFlags,
    pub diff_hunk: Option<String>,
    pub minimized: bool,
}
