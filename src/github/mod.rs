pub mod client;
pub mod paginator;
pub mod rate_limiter;

pub use client::GitHubClient;
pub use rate_limiter::RateLimiter;

use crate::error::{Error, Result};

/// Coordinates of the issue under evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// Parses `https://github.com/<owner>/<repo>/issues/<number>` into an
/// [`IssueRef`].
pub fn parse_issue_url(url: &str) -> Result<IssueRef> {
    let trimmed = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let mut parts = trimmed.split('/');

    let host = parts.next();
    if host != Some("github.com") {
        return Err(Error::Config(format!("not a GitHub issue URL: {url}")));
    }

    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), Some("issues"), Some(number)) if !owner.is_empty() => {
            let number = number
                .parse()
                .map_err(|_| Error::Config(format!("invalid issue number in URL: {url}")))?;
            Ok(IssueRef {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
            })
        }
        _ => Err(Error::Config(format!("not a GitHub issue URL: {url}"))),
    }
}
