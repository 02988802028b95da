//! Console reporting of run notifications and the JSON run summary.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use attester_core::{Description, Failure, FailureKind, RunNotifier, TestTree};

/// One failed test in a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Path of the test from the root, `/`-separated.
    pub test: String,
    /// `assertion` or `error`.
    pub kind: &'static str,
    pub message: String,
    pub stack: Vec<String>,
}

/// Outcome of one campaign, serialized by `run --json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub engine: String,
    pub root: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub started: usize,
    pub finished: usize,
    pub ignored: usize,
    pub failed: usize,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    pub fn new(engine: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            root: root.into(),
            started_at: Utc::now(),
            finished_at: None,
            started: 0,
            finished: 0,
            ignored: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// [`RunNotifier`] that prints one line per notification to `out` and
/// accumulates a [`RunSummary`].
pub struct ConsoleNotifier<W> {
    tree: TestTree,
    out: W,
    summary: RunSummary,
}

impl<W: Write + Send> ConsoleNotifier<W> {
    /// `tree` is used to print full test paths.
    pub fn new(tree: TestTree, engine: &str, out: W) -> Self {
        let root = tree.root().name.clone();
        Self {
            tree,
            out,
            summary: RunSummary::new(engine, root),
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Stamp the finish time and return the summary.
    pub fn finish(mut self) -> RunSummary {
        self.summary.finished_at = Some(Utc::now());
        self.summary
    }

    fn line(&mut self, status: &str, description: &Description) {
        let path = self.tree.path(description.id);
        if let Err(e) = writeln!(self.out, "{status:<8} {path}") {
            warn!(error = %e, "failed to write notification");
        }
    }
}

impl<W: Write + Send> RunNotifier for ConsoleNotifier<W> {
    fn test_started(&mut self, description: &Description) {
        self.summary.started += 1;
        self.line("START", description);
    }

    fn test_finished(&mut self, description: &Description) {
        self.summary.finished += 1;
        self.line("DONE", description);
    }

    fn test_ignored(&mut self, description: &Description) {
        self.summary.ignored += 1;
        self.line("IGNORED", description);
    }

    fn test_failure(&mut self, failure: Failure) {
        self.summary.failed += 1;
        let kind = match failure.error.kind() {
            FailureKind::Assertion => "FAILED",
            FailureKind::Error => "ERROR",
        };
        self.line(kind, &failure.description);

        let stack: Vec<String> = failure
            .error
            .stack_trace()
            .iter()
            .map(ToString::to_string)
            .collect();
        let written = writeln!(self.out, "    {}", failure.error).and_then(|()| {
            stack
                .iter()
                .try_for_each(|frame| writeln!(self.out, "        at {frame}"))
        });
        if let Err(e) = written {
            warn!(error = %e, "failed to write failure details");
        }

        self.summary.failures.push(FailureRecord {
            test: self.tree.path(failure.description.id),
            kind: match failure.error.kind() {
                FailureKind::Assertion => "assertion",
                FailureKind::Error => "error",
            },
            message: failure.error.message().to_string(),
            stack,
        });
    }
}

/// Print the tree as an indented outline.
pub fn write_tree<W: Write>(tree: &TestTree, out: &mut W) -> std::io::Result<()> {
    for description in tree.iter() {
        let indent = "  ".repeat(tree.depth(description.id));
        writeln!(out, "{indent}{}", description.name)?;
    }
    Ok(())
}
