//! Shared test utilities for the attester bridge integration tests.
//!
//! Provides a fake engine installation whose entry script is a shell
//! script run by `sh` in place of `node`, plus a notifier that records
//! every callback.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

use attester_core::{Description, EngineConfig, EngineKind, Failure, RunNotifier};

/// Delimiter for the heredoc that carries the scripted messages.
const HEREDOC_TAG: &str = "__ATTESTER_FAKE_ENGINE__";

/// Handshake message for `kind` with the given version.
pub fn handshake(kind: EngineKind, version: &str) -> Value {
    json!({"application": kind.application(), "version": version})
}

/// Builder for a fake engine script.
#[derive(Debug, Clone)]
pub struct FakeEngineBuilder {
    kind: EngineKind,
    prelude: Vec<String>,
    lines: Vec<String>,
    trailer: Vec<String>,
}

impl FakeEngineBuilder {
    /// Start with the standard `1.0` handshake for `kind`.
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            prelude: Vec::new(),
            lines: vec![handshake(kind, "1.0").to_string()],
            trailer: Vec::new(),
        }
    }

    /// Start without any handshake.
    pub fn raw(kind: EngineKind) -> Self {
        Self {
            kind,
            prelude: Vec::new(),
            lines: Vec::new(),
            trailer: Vec::new(),
        }
    }

    /// Emit a JSON message on stdout.
    pub fn message(mut self, message: Value) -> Self {
        self.lines.push(message.to_string());
        self
    }

    /// Emit raw text on stdout (for malformed-stream tests).
    pub fn raw_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Run a shell command after all messages have been written.
    pub fn then(mut self, command: impl Into<String>) -> Self {
        self.trailer.push(command.into());
        self
    }

    /// Run a shell command before any message is written.
    pub fn before(mut self, command: impl Into<String>) -> Self {
        self.prelude.push(command.into());
        self
    }

    /// Write `$@` to `args.txt` in the engine root before emitting output.
    pub fn record_args(mut self) -> Self {
        self.prelude
            .push("printf '%s\\n' \"$@\" > \"$(dirname \"$0\")/../args.txt\"".to_string());
        self
    }

    pub fn build(self) -> FakeEngine {
        let dir = tempfile::tempdir().expect("failed to create fake engine dir");
        let script = dir.path().join(self.kind.entry_script());
        std::fs::create_dir_all(script.parent().expect("entry script has a parent"))
            .expect("failed to create bin dir");

        let mut body = String::from("#!/bin/sh\n");
        for command in &self.prelude {
            body.push_str(command);
            body.push('\n');
        }
        if !self.lines.is_empty() {
            body.push_str(&format!("cat <<'{HEREDOC_TAG}'\n"));
            for line in &self.lines {
                body.push_str(line);
                body.push('\n');
            }
            body.push_str(HEREDOC_TAG);
            body.push('\n');
        }
        for command in &self.trailer {
            body.push_str(command);
            body.push('\n');
        }
        std::fs::write(&script, body).expect("failed to write fake engine script");

        FakeEngine {
            kind: self.kind,
            dir,
        }
    }
}

/// A temporary engine installation.
#[derive(Debug)]
pub struct FakeEngine {
    kind: EngineKind,
    dir: TempDir,
}

impl FakeEngine {
    pub fn builder(kind: EngineKind) -> FakeEngineBuilder {
        FakeEngineBuilder::new(kind)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Config pointing at this installation, with `sh` as the JS runtime
    /// and `true` as the browser.
    pub fn config(&self) -> EngineConfig {
        EngineConfig::new(self.kind, self.dir.path())
            .with_node("sh")
            .with_phantomjs("true")
    }

    /// Arguments recorded by [`FakeEngineBuilder::record_args`].
    pub fn recorded_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("args.txt"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Create an empty file inside the installation and return its path.
    pub fn touch(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, "").expect("failed to create file");
        path
    }
}

/// One recorded notifier callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Started(String),
    Finished(String),
    Ignored(String),
    Failed {
        test: String,
        message: String,
        assertion: bool,
        stack: Vec<String>,
    },
}

/// [`RunNotifier`] that records every callback by test name.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub events: Vec<Notification>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Notification> {
        self.events
            .iter()
            .filter(|n| matches!(n, Notification::Failed { .. }))
    }
}

impl RunNotifier for RecordingNotifier {
    fn test_started(&mut self, description: &Description) {
        self.events
            .push(Notification::Started(description.name.clone()));
    }

    fn test_finished(&mut self, description: &Description) {
        self.events
            .push(Notification::Finished(description.name.clone()));
    }

    fn test_ignored(&mut self, description: &Description) {
        self.events
            .push(Notification::Ignored(description.name.clone()));
    }

    fn test_failure(&mut self, failure: Failure) {
        self.events.push(Notification::Failed {
            test: failure.description.name.clone(),
            message: failure.error.message().to_string(),
            assertion: failure.error.is_assertion(),
            stack: failure
                .error
                .stack_trace()
                .iter()
                .map(ToString::to_string)
                .collect(),
        });
    }
}
