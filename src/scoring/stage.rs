use async_trait::async_trait;

use crate::activity::IssueActivity;
use crate::error::Result;
use crate::models::ledger::Ledger;

/// One scoring step in the fixed pipeline. Stages read the aggregated
/// activity and append their fields to the shared ledger; the processor
/// hands the ledger to exactly one stage at a time and awaits it to full
/// completion before the next one runs.
#[async_trait]
pub trait ScoringStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the stage should run. A stage with invalid configuration
    /// reports itself disabled instead of failing the run.
    fn enabled(&self) -> bool;

    async fn transform(&self, activity: &IssueActivity, ledger: &mut Ledger) -> Result<()>;
}
