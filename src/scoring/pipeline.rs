use std::sync::Arc;

use crate::activity::IssueActivity;
use crate::config::IncentivesConfig;
use crate::error::Result;
use crate::github::{GitHubClient, IssueRef};
use crate::llm::provider::RelevanceProvider;
use crate::models::ledger::Ledger;
use crate::scoring::data_purge::DataPurge;
use crate::scoring::formatting::FormattingEvaluator;
use crate::scoring::relevance::ContentEvaluator;
use crate::scoring::report::ReportModule;
use crate::scoring::stage::ScoringStage;
use crate::scoring::user_extractor::UserExtractor;

/// Owns the fixed, declared stage order and threads one ledger through it.
/// Every stage settles completely before the next one reads the ledger;
/// relevance merging in particular assumes formatting has fully committed.
pub struct Processor {
    stages: Vec<Box<dyn ScoringStage>>,
}

impl Processor {
    pub fn new(
        config: &IncentivesConfig,
        provider: Arc<dyn RelevanceProvider>,
        delivery: Option<(Arc<GitHubClient>, IssueRef)>,
    ) -> Self {
        let stages: Vec<Box<dyn ScoringStage>> = vec![
            Box::new(UserExtractor::new(config.user_extractor.clone())),
            Box::new(DataPurge::new(config.data_purge.clone())),
            Box::new(FormattingEvaluator::new(config.formatting_evaluator.clone())),
            Box::new(ContentEvaluator::new(
                config.content_evaluator.clone(),
                provider,
            )),
            Box::new(ReportModule::new(config.report.clone(), delivery)),
        ];
        Self { stages }
    }

    /// Runs every enabled stage in order. Any fatal stage error aborts the
    /// whole run; no partial ledger is returned.
    pub async fn run(&self, activity: &IssueActivity) -> Result<Ledger> {
        let mut ledger = Ledger::new();
        for stage in &self.stages {
            if !stage.enabled() {
                tracing::warn!("Stage {} is disabled, skipping", stage.name());
                continue;
            }
            tracing::info!("Running stage: {}", stage.name());
            stage.transform(activity, &mut ledger).await?;
        }
        Ok(ledger)
    }
}
