use async_trait::async_trait;

use crate::activity::IssueActivity;
use crate::config::DataPurgeConfig;
use crate::error::Result;
use crate::models::ledger::Ledger;
use crate::scoring::stage::ScoringStage;

/// Drops comments that must not earn rewards before any scoring runs:
/// minimized (hidden) comments and comments with empty bodies. Entries left
/// with nothing to score are removed unless they hold a task reward.
pub struct DataPurge {
    config: DataPurgeConfig,
}

impl DataPurge {
    pub fn new(config: DataPurgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScoringStage for DataPurge {
    fn name(&self) -> &'static str {
        "data-purge"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn transform(&self, _activity: &IssueActivity, ledger: &mut Ledger) -> Result<()> {
        let mut purged = 0;
        for entry in ledger.values_mut() {
            let before = entry.comments.len();
            entry
                .comments
                .retain(|c| !c.minimized && !c.content.trim().is_empty());
            purged += before - entry.comments.len();
        }
        ledger.retain(|_, entry| !entry.is_empty());

        if purged > 0 {
            tracing::info!("Purged {} hidden or empty comments", purged);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ledger::{CommentScore, ContributorEntry, ScoreRecord};
    use crate::roles::RoleFlags;

    fn comment(id: u64, content: &str, minimized: bool) -> CommentScore {
        CommentScore {
            id,
            content: content.to_string(),
            url: String::new(),
            role: RoleFlags::ISSUE,
            diff_hunk: None,
            minimized,
            score: ScoreRecord::default(),
        }
    }

    #[tokio::test]
    async fn removes_minimized_and_empty_comments() {
        let activity = crate::scoring::pipeline::tests::fixture_activity();
        let mut ledger = Ledger::new();
        let mut entry = ContributorEntry::new(9);
        entry.comments.push(comment(1, "keep me", false));
        entry.comments.push(comment(2, "hidden", true));
        entry.comments.push(comment(3, "   ", false));
        ledger.insert("dave".to_string(), entry);

        let purge = DataPurge::new(DataPurgeConfig::default());
        purge.transform(&activity, &mut ledger).await.unwrap();

        assert_eq!(ledger["dave"].comments.len(), 1);
        assert_eq!(ledger["dave"].comments[0].id, 1);
    }

    #[tokio::test]
    async fn drops_entries_with_nothing_left() {
        let activity = crate::scoring::pipeline::tests::fixture_activity();
        let mut ledger = Ledger::new();
        let mut entry = ContributorEntry::new(9);
        entry.comments.push(comment(2, "hidden", true));
        ledger.insert("dave".to_string(), entry);

        let purge = DataPurge::new(DataPurgeConfig::default());
        purge.transform(&activity, &mut ledger).await.unwrap();

        assert!(ledger.is_empty());
    }
}
