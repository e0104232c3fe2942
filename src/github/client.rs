use reqwest::{header, Client};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::github::paginator::Paginator;
use crate::github::rate_limiter::RateLimiter;
use crate::github::IssueRef;
use crate::models::comment::{IssueComment, PullReview, ReviewComment};
use crate::models::issue::{Issue, IssueEvent, PullRequest, TimelineEvent};

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
    graphql_url: String,
}

const QUERY_COMMENT_DETAILS: &str = r#"
query($node_ids: [ID!]!) {
  nodes(ids: $node_ids) {
    ... on IssueComment {
      id
      isMinimized
    }
  }
}"#;

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<CommentNodes>,
}

#[derive(Deserialize)]
struct CommentNodes {
    nodes: Vec<Option<CommentNode>>,
}

#[derive(Deserialize)]
struct CommentNode {
    id: String,
    #[serde(rename = "isMinimized")]
    is_minimized: bool,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("issue-rewards/0.1"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(),
            base_url: "https://api.github.com".to_string(),
            graphql_url: "https://api.github.com/graphql".to_string(),
        })
    }

    pub async fn get_issue(&self, issue: &IssueRef) -> Result<Issue> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}",
            self.base_url, issue.owner, issue.repo, issue.number
        );
        self.get_json(&url).await
    }

    pub async fn get_issue_comments(&self, issue: &IssueRef) -> Result<Vec<IssueComment>> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_url, issue.owner, issue.repo, issue.number
        );
        Paginator::new(&self.client, &self.rate_limiter)
            .fetch_all(&url)
            .await
    }

    pub async fn get_issue_events(&self, issue: &IssueRef) -> Result<Vec<IssueEvent>> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/events",
            self.base_url, issue.owner, issue.repo, issue.number
        );
        Paginator::new(&self.client, &self.rate_limiter)
            .fetch_all(&url)
            .await
    }

    pub async fn get_issue_timeline(&self, issue: &IssueRef) -> Result<Vec<TimelineEvent>> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/timeline",
            self.base_url, issue.owner, issue.repo, issue.number
        );
        Paginator::new(&self.client, &self.rate_limiter)
            .fetch_all(&url)
            .await
    }

    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest> {
        let url = format!("{}/repos/{}/{}/pulls/{}", self.base_url, owner, repo, number);
        self.get_json(&url).await
    }

    pub async fn get_pull_request_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<PullReview>> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/reviews",
            self.base_url, owner, repo, number
        );
        Paginator::new(&self.client, &self.rate_limiter)
            .fetch_all(&url)
            .await
    }

    pub async fn get_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<ReviewComment>> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.base_url, owner, repo, number
        );
        Paginator::new(&self.client, &self.rate_limiter)
            .fetch_all(&url)
            .await
    }

    /// Resolves the collapsed state of issue comments, which only the
    /// GraphQL API exposes.
    pub async fn fill_minimized_status(&self, comments: &mut [IssueComment]) -> Result<()> {
        if comments.is_empty() {
            return Ok(());
        }

        self.rate_limiter.wait().await;
        let node_ids: Vec<&str> = comments.iter().map(|c| c.node_id.as_str()).collect();
        let body = serde_json::json!({
            "query": QUERY_COMMENT_DETAILS,
            "variables": { "node_ids": node_ids },
        });

        let response = self.client.post(&self.graphql_url).json(&body).send().await?;
        self.rate_limiter.update_from_response(&response).await;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch comment details: {} - {}",
                status, body
            )));
        }

        let result: GraphQlResponse = response.json().await?;
        let nodes = result.data.map(|d| d.nodes).unwrap_or_default();
        for node in nodes.into_iter().flatten() {
            if let Some(comment) = comments.iter_mut().find(|c| c.node_id == node.id) {
                comment.is_minimized = node.is_minimized;
            }
        }

        Ok(())
    }

    pub async fn post_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<()> {
        self.rate_limiter.wait().await;
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_url, issue.owner, issue.repo, issue.number
        );

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        self.rate_limiter.update_from_response(&response).await;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to post comment: {} - {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.rate_limiter.wait().await;
        tracing::debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;
        self.rate_limiter.update_from_response(&response).await;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Request to {} failed: {} - {}",
                url, status, body
            )));
        }

        Ok(response.json().await?)
    }
}
