pub mod activity;
pub mod config;
pub mod error;
pub mod github;
pub mod llm;
pub mod models;
pub mod roles;
pub mod scoring;

pub use activity::IssueActivity;
pub use config::{Config, IncentivesConfig};
pub use error::{Error, Result};
pub use github::{parse_issue_url, GitHubClient, IssueRef};
pub use llm::{OpenAiProvider, RelevanceProvider};
pub use models::ledger::Ledger;
pub use roles::RoleFlags;
pub use scoring::Processor;
