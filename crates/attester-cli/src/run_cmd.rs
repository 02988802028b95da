//! `attester-bridge run` command: discover, run and report a campaign.

use anyhow::{Context, Result};
use tracing::info;

use attester_core::Runner;

use crate::report::{ConsoleNotifier, RunSummary};

/// Run the campaign and return its summary.
///
/// With `json` the per-test lines are suppressed and the summary is printed
/// as JSON once the campaign has finished. The caller is expected to have
/// sent engine and browser output to stderr in that mode.
pub async fn run_campaign(runner: &mut dyn Runner, engine: &str, json: bool) -> Result<RunSummary> {
    let tree = runner
        .description()
        .await
        .context("test discovery failed")?
        .clone();
    info!(tests = tree.test_count(), "starting campaign");

    let summary = if json {
        let mut notifier = ConsoleNotifier::new(tree, engine, std::io::sink());
        runner.run(&mut notifier).await.context("campaign failed")?;
        notifier.finish()
    } else {
        let mut notifier = ConsoleNotifier::new(tree, engine, std::io::stdout());
        runner.run(&mut notifier).await.context("campaign failed")?;
        notifier.finish()
    };

    if json {
        let rendered =
            serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?;
        println!("{rendered}");
    } else {
        println!();
        println!(
            "{} started, {} finished, {} ignored, {} failed",
            summary.started, summary.finished, summary.ignored, summary.failed
        );
    }
    Ok(summary)
}
