//! `attester-bridge list` command: discover and print the test tree.

use anyhow::{Context, Result};
use tracing::info;

use attester_core::Runner;

use crate::report;

/// Run the list command.
pub async fn run_list(runner: &mut dyn Runner) -> Result<()> {
    let tree = runner
        .description()
        .await
        .context("test discovery failed")?;
    info!(nodes = tree.len(), tests = tree.test_count(), "discovered tests");

    let mut stdout = std::io::stdout().lock();
    report::write_tree(tree, &mut stdout).context("failed to print test tree")?;
    Ok(())
}
