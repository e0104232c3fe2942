use std::collections::HashSet;

use futures::future::join_all;

use crate::error::Result;
use crate::github::{GitHubClient, IssueRef};
use crate::models::comment::{CommentRecord, IssueComment, PullReview, ReviewComment};
use crate::models::issue::{Account, Issue, IssueEvent, PullRequest, TimelineEvent};
use crate::roles::{classify, CommentKind, RoleFlags};

/// One linked-and-merged pull request with its review activity.
#[derive(Debug, Clone)]
pub struct LinkedReview {
    pub pull: PullRequest,
    pub reviews: Vec<PullReview>,
    pub review_comments: Vec<ReviewComment>,
}

/// Fully aggregated activity for one issue: the issue itself, its event
/// timeline, its comments, and the reviews of every linked merged pull
/// request. Immutable once fetched; the scoring pipeline only reads it.
#[derive(Debug, Clone)]
pub struct IssueActivity {
    pub issue: Issue,
    pub events: Vec<IssueEvent>,
    pub comments: Vec<IssueComment>,
    pub linked_reviews: Vec<LinkedReview>,
}

impl IssueActivity {
    pub async fn fetch(client: &GitHubClient, target: &IssueRef) -> Result<Self> {
        let (issue, events, mut comments, timeline) = tokio::try_join!(
            client.get_issue(target),
            client.get_issue_events(target),
            client.get_issue_comments(target),
            client.get_issue_timeline(target),
        )?;

        client.fill_minimized_status(&mut comments).await?;
        let linked_reviews = fetch_linked_reviews(client, &timeline).await?;

        tracing::info!(
            "Aggregated {} comments and {} linked reviews for issue #{}",
            comments.len(),
            linked_reviews.len(),
            issue.number
        );

        Ok(Self {
            issue,
            events,
            comments,
            linked_reviews,
        })
    }

    /// The issue body, when present and non-empty. Relevance scoring is
    /// skipped entirely without it.
    pub fn specification_body(&self) -> Option<&str> {
        self.issue
            .body
            .as_deref()
            .filter(|body| !body.trim().is_empty())
    }

    /// The current assignee, falling back to the event timeline when the
    /// issue payload has none recorded.
    pub fn assignee(&self) -> Option<&Account> {
        self.issue.assignee.as_ref().or_else(|| {
            self.events
                .iter()
                .rev()
                .find(|e| e.event == "assigned")
                .and_then(|e| e.assignee.as_ref())
        })
    }

    /// Everyone who should share the task reward.
    pub fn assignees(&self) -> Vec<&Account> {
        if !self.issue.assignees.is_empty() {
            return self.issue.assignees.iter().collect();
        }
        self.assignee().into_iter().collect()
    }

    /// The full comment set in a unified shape, each entry carrying its
    /// role mask: issue comments, the issue body as a TASK pseudo-comment,
    /// then per linked pull request its body, review submissions, and
    /// review comments.
    pub fn all_comments(&self) -> Vec<CommentRecord> {
        let issuer = self.issue.user.as_ref();
        let assignee = self.assignee();
        let mut records = Vec::new();

        for comment in &self.comments {
            let Some(author) = &comment.user else {
                continue;
            };
            let role = classify(
                CommentKind::Issue,
                Some(author),
                comment.author_association.as_deref(),
                issuer,
                assignee,
            );
            records.push(CommentRecord {
                id: comment.id,
                author: author.clone(),
                body: comment.body.clone().unwrap_or_default(),
                url: comment.html_url.clone(),
                role,
                diff_hunk: None,
                minimized: comment.is_minimized,
            });
        }

        if let Some(author) = issuer {
            let role = classify(
                CommentKind::Issue,
                Some(author),
                self.issue.author_association.as_deref(),
                issuer,
                assignee,
            ) | RoleFlags::TASK;
            records.push(CommentRecord {
                id: self.issue.id,
                author: author.clone(),
                body: self.issue.body.clone().unwrap_or_default(),
                url: self.issue.html_url.clone(),
                role,
                diff_hunk: None,
                minimized: false,
            });
        }

        for linked in &self.linked_reviews {
            let pull_author = linked.pull.user.as_ref();
            let pull_assignee = linked.pull.assignee.as_ref();

            if let Some(author) = pull_author {
                let role = classify(
                    CommentKind::Issue,
                    Some(author),
                    linked.pull.author_association.as_deref(),
                    pull_author,
                    pull_assignee,
                );
                records.push(CommentRecord {
                    id: linked.pull.id,
                    author: author.clone(),
                    body: linked.pull.body.clone().unwrap_or_default(),
                    url: linked.pull.html_url.clone(),
                    role,
                    diff_hunk: None,
                    minimized: false,
                });
            }

            for review in &linked.reviews {
                let Some(author) = &review.user else {
                    continue;
                };
                let Some(body) = review.body.as_deref().filter(|b| !b.trim().is_empty()) else {
                    continue;
                };
                let role = classify(
                    CommentKind::Review,
                    Some(author),
                    review.author_association.as_deref(),
                    pull_author,
                    pull_assignee,
                );
                records.push(CommentRecord {
                    id: review.id,
                    author: author.clone(),
                    body: body.to_string(),
                    url: review.html_url.clone(),
                    role,
                    diff_hunk: None,
                    minimized: false,
                });
            }

            for comment in &linked.review_comments {
                let Some(author) = &comment.user else {
                    continue;
                };
                let role = classify(
                    CommentKind::Review,
                    Some(author),
                    comment.author_association.as_deref(),
                    pull_author,
                    pull_assignee,
                );
                records.push(CommentRecord {
                    id: comment.id,
                    author: author.clone(),
                    body: comment.body.clone().unwrap_or_default(),
                    url: comment.html_url.clone(),
                    role,
                    diff_hunk: comment.diff_hunk.clone(),
                    minimized: false,
                });
            }
        }

        records
    }
}

async fn fetch_linked_reviews(
    client: &GitHubClient,
    timeline: &[TimelineEvent],
) -> Result<Vec<LinkedReview>> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for event in timeline {
        if event.event != "cross_referenced" {
            continue;
        }
        let Some(source) = event.source.as_ref().and_then(|s| s.issue.as_ref()) else {
            continue;
        };
        if source.pull_request.is_none() {
            continue;
        }
        let Some(repository) = &source.repository else {
            tracing::error!("No repository found for linked pull #{}", source.number);
            continue;
        };
        let key = (
            repository.owner.login.clone(),
            repository.name.clone(),
            source.number,
        );
        if seen.insert(key.clone()) {
            candidates.push(key);
        }
    }

    let futures = candidates.into_iter().map(|(owner, repo, number)| async move {
        let pull = client.get_pull_request(&owner, &repo, number).await?;
        if pull.merged_at.is_none() {
            return Ok(None);
        }
        let (reviews, review_comments) = tokio::try_join!(
            client.get_pull_request_reviews(&owner, &repo, number),
            client.get_review_comments(&owner, &repo, number),
        )?;
        Ok(Some(LinkedReview {
            pull,
            reviews,
            review_comments,
        }))
    });

    let results: Vec<Result<Option<LinkedReview>>> = join_all(futures).await;
    let mut linked = Vec::new();
    for result in results {
        if let Some(review) = result? {
            linked.push(review);
        }
    }
    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: u64, login: &str) -> Account {
        Account {
            id,
            login: login.to_string(),
        }
    }

    fn bare_issue() -> Issue {
        Issue {
            id: 1000,
            number: 1,
            title: "Crash on empty input".to_string(),
            body: Some("The tool crashes when stdin is empty.".to_string()),
            user: Some(account(1, "alice")),
            assignee: Some(account(2, "bob")),
            assignees: vec![account(2, "bob")],
            labels: vec![],
            author_association: Some("MEMBER".to_string()),
            html_url: "https://github.com/acme/widgets/issues/1".to_string(),
        }
    }

    fn issue_comment(id: u64, author: Account, body: &str, association: &str) -> IssueComment {
        IssueComment {
            id,
            node_id: format!("IC_{id}"),
            body: Some(body.to_string()),
            user: Some(author),
            author_association: Some(association.to_string()),
            html_url: format!("https://github.com/acme/widgets/issues/1#issuecomment-{id}"),
            is_minimized: false,
        }
    }

    #[test]
    fn issue_body_becomes_task_pseudo_comment() {
        let activity = IssueActivity {
            issue: bare_issue(),
            events: vec![],
            comments: vec![],
            linked_reviews: vec![],
        };

        let records = activity.all_comments();
        assert_eq!(records.len(), 1);
        let task = &records[0];
        assert!(task.role.contains(RoleFlags::TASK));
        assert!(task.role.contains(RoleFlags::ISSUE));
        assert!(task.role.contains(RoleFlags::ISSUER));
        assert_eq!(task.id, 1000);
    }

    #[test]
    fn comments_are_classified_against_issue_author_and_assignee() {
        let activity = IssueActivity {
            issue: bare_issue(),
            events: vec![],
            comments: vec![
                issue_comment(11, account(2, "bob"), "On it.", "MEMBER"),
                issue_comment(12, account(3, "carol"), "Repro attached.", "CONTRIBUTOR"),
            ],
            linked_reviews: vec![],
        };

        let records = activity.all_comments();
        assert_eq!(records[0].role, RoleFlags::ISSUE | RoleFlags::ASSIGNEE);
        assert_eq!(records[1].role, RoleFlags::ISSUE | RoleFlags::CONTRIBUTOR);
    }

    #[test]
    fn assignee_falls_back_to_events() {
        let mut issue = bare_issue();
        issue.assignee = None;
        issue.assignees = vec![];
        let activity = IssueActivity {
            issue,
            events: vec![IssueEvent {
                event: "assigned".to_string(),
                actor: Some(account(1, "alice")),
                assignee: Some(account(2, "bob")),
                created_at: None,
            }],
            comments: vec![],
            linked_reviews: vec![],
        };

        assert_eq!(activity.assignee().map(|a| a.id), Some(2));
        assert_eq!(activity.assignees().len(), 1);
    }
}
