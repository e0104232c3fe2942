use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub user: Option<Account>,
    pub assignee: Option<Account>,
    #[serde(default)]
    pub assignees: Vec<Account>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub author_association: Option<String>,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub user: Option<Account>,
    pub assignee: Option<Account>,
    pub author_association: Option<String>,
    pub html_url: String,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Entry from the issue events endpoint. Assignment events carry the
/// assignee being added, which is the only payload the pipeline reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueEvent {
    pub event: String,
    pub actor: Option<Account>,
    pub assignee: Option<Account>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Entry from the issue timeline endpoint, used to discover linked pull
/// requests via cross-reference events.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEvent {
    pub event: String,
    pub source: Option<TimelineSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineSource {
    pub issue: Option<TimelineIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineIssue {
    pub number: u64,
    pub pull_request: Option<serde_json::Value>,
    pub repository: Option<TimelineRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineRepository {
    pub name: String,
    pub owner: Account,
}
