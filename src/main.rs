use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use issue_rewards::{
    parse_issue_url, Config, GitHubClient, IncentivesConfig, IssueActivity, OpenAiProvider,
    Processor,
};

#[derive(Parser, Debug)]
#[command(name = "issue-rewards")]
#[command(version = "0.1.0")]
#[command(about = "Compute incentive rewards for a GitHub issue conversation")]
struct Args {
    /// URL of the issue to evaluate
    #[arg(short, long)]
    issue: String,

    /// Path to an incentives settings file (JSON)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Post the evaluation report back to the issue
    #[arg(long)]
    post: bool,

    /// Write the resulting ledger to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("issue_rewards=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;

    let mut incentives = IncentivesConfig::load(args.settings.as_deref())?;
    incentives.report.post |= args.post;

    let target = parse_issue_url(&args.issue)?;
    let client = Arc::new(GitHubClient::new(&config.github_token)?);
    let provider = Arc::new(OpenAiProvider::new(
        config.openai_api_key.clone(),
        incentives.content_evaluator.openai.model.clone(),
        incentives.content_evaluator.openai.endpoint.clone(),
    ));

    tracing::info!(
        "Evaluating {}/{}#{}",
        target.owner,
        target.repo,
        target.number
    );
    let activity = IssueActivity::fetch(&client, &target).await?;

    let processor = Processor::new(&incentives, provider, Some((client, target)));
    let ledger = processor.run(&activity).await?;

    let rendered = serde_json::to_string_pretty(&ledger)?;
    if let Some(path) = &args.output {
        std::fs::write(path, &rendered)?;
        tracing::info!("Ledger written to {}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
