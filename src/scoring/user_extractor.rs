use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::activity::IssueActivity;
use crate::config::UserExtractorConfig;
use crate::error::Result;
use crate::models::issue::Label;
use crate::models::ledger::{ContributorEntry, Ledger, TaskReward};
use crate::scoring::stage::ScoringStage;

/// Seeds the ledger: one entry per comment author in first-encounter order,
/// plus the task reward for the issue assignees when the issue carries a
/// price label.
pub struct UserExtractor {
    config: UserExtractorConfig,
}

impl UserExtractor {
    pub fn new(config: UserExtractorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScoringStage for UserExtractor {
    fn name(&self) -> &'static str {
        "user-extractor"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn transform(&self, activity: &IssueActivity, ledger: &mut Ledger) -> Result<()> {
        for record in activity.all_comments() {
            let entry = ledger
                .entry(record.author.login.clone())
                .or_insert_with(|| ContributorEntry::new(record.author.id));
            entry.comments.push(record.into());
        }

        if let Some(price) = parse_price_label(&activity.issue.labels) {
            let assignees = activity.assignees();
            if !assignees.is_empty() {
                let share = price / Decimal::from(assignees.len());
                for assignee in assignees {
                    let entry = ledger
                        .entry(assignee.login.clone())
                        .or_insert_with(|| ContributorEntry::new(assignee.id));
                    entry.task = Some(TaskReward { reward: share });
                    entry.recompute_total();
                }
            }
        }

        tracing::info!("Seeded ledger with {} contributors", ledger.len());
        Ok(())
    }
}

/// Reads the issue price from a `Price: <amount> [currency]` label.
fn parse_price_label(labels: &[Label]) -> Option<Decimal> {
    labels.iter().find_map(|label| {
        let rest = label.name.strip_prefix("Price:")?.trim();
        let amount = rest.split_whitespace().next()?;
        Decimal::from_str(amount).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn label(name: &str) -> Label {
        Label {
            name: name.to_string(),
        }
    }

    #[test]
    fn parses_price_with_currency_suffix() {
        assert_eq!(
            parse_price_label(&[label("bug"), label("Price: 50 USD")]),
            Some(dec!(50))
        );
    }

    #[test]
    fn parses_fractional_price() {
        assert_eq!(parse_price_label(&[label("Price: 12.5")]), Some(dec!(12.5)));
    }

    #[test]
    fn no_price_label_yields_none() {
        assert_eq!(parse_price_label(&[label("bug"), label("wontfix")]), None);
    }
}
