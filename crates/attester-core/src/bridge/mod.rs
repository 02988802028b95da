//! The bridge: drives the engine process and translates its events into
//! host notifications.
//!
//! All mutable state (tree, id index, completion flags) is owned by the
//! [`Bridge`] and only touched by its dispatch loop. Two loops share the
//! same engine process: discovery runs until `tasksList` has been seen,
//! the run loop until `campaignFinished`.

pub mod browsers;

pub use browsers::{BROWSER_INSTANCES, BrowserPool};

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::builder::TestTreeBuilder;
use crate::config::{self, EngineConfig};
use crate::engine::{EngineKind, EngineProcess};
use crate::error::{BridgeError, Result};
use crate::failure::RemoteTestError;
use crate::host::{Description, Failure, RunNotifier, Runner, TestTree};
use crate::protocol::EngineEvent;

/// Argument that disables ANSI colours in attester output.
pub const NO_COLORS_FLAG: &str = "--no-colors";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SessionState {
    received_tests_list: bool,
    all_tests_finished: bool,
    run_active: bool,
}

/// Bridge between one engine process and the host reporting model.
///
/// Supports one discovery phase followed by at most one run.
#[derive(Debug)]
pub struct Bridge {
    config: EngineConfig,
    args: Vec<String>,
    builder: TestTreeBuilder,
    state: SessionState,
    process: Option<EngineProcess>,
    browsers: BrowserPool,
}

impl Bridge {
    /// Create a bridge that passes `args` to the engine after `-j`.
    ///
    /// Nothing is launched until the tree or a run is requested.
    pub fn new(root_name: impl Into<String>, config: EngineConfig, args: Vec<String>) -> Self {
        Self {
            config,
            args,
            builder: TestTreeBuilder::new(root_name),
            state: SessionState::default(),
            process: None,
            browsers: BrowserPool::new(),
        }
    }

    /// Create an attester bridge for the campaign described by
    /// `config_file`, which must exist.
    pub fn attester(
        root_name: impl Into<String>,
        config_file: impl AsRef<Path>,
        config: EngineConfig,
    ) -> Result<Self> {
        let config_file = config_file.as_ref();
        if !config_file.exists() {
            return Err(BridgeError::ConfigFileNotFound {
                path: config::absolute(config_file),
            });
        }
        let config = EngineConfig {
            kind: EngineKind::Attester,
            ..config
        };
        let args = vec![
            NO_COLORS_FLAG.to_string(),
            config_file.to_string_lossy().into_owned(),
        ];
        Ok(Self::new(root_name, config, args))
    }

    /// Create a bridge for the standalone JS test runner.
    pub fn atjstestrunner(root_name: impl Into<String>, config: EngineConfig, args: Vec<String>) -> Self {
        let config = EngineConfig {
            kind: EngineKind::AtJsTestRunner,
            ..config
        };
        Self::new(root_name, config, args)
    }

    pub fn kind(&self) -> EngineKind {
        self.config.kind
    }

    /// Arguments passed to the engine after the JSON output flag.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The tree as currently known, without triggering discovery.
    pub fn tree(&self) -> &TestTree {
        self.builder.tree()
    }

    pub fn is_discovered(&self) -> bool {
        self.state.received_tests_list
    }

    pub fn is_finished(&self) -> bool {
        self.state.all_tests_finished
    }

    pub fn is_running(&self) -> bool {
        self.state.run_active
    }

    /// Engine version from the handshake, once started.
    pub fn engine_version(&self) -> Option<&str> {
        self.process.as_ref().map(EngineProcess::version)
    }

    /// Whether an engine process has been started and not yet torn down.
    pub fn is_engine_alive(&self) -> bool {
        self.process.as_ref().is_some_and(EngineProcess::is_alive)
    }

    pub fn browsers(&self) -> &BrowserPool {
        &self.browsers
    }

    /// Read messages until the engine has sent its tasks list.
    pub async fn discover(&mut self) -> Result<&TestTree> {
        if !self.state.received_tests_list {
            self.ensure_started().await?;
            while !self.state.received_tests_list {
                self.process_next_message(None).await?;
            }
        }
        Ok(self.builder.tree())
    }

    /// Read messages until the campaign has finished, reporting to
    /// `notifier`.
    ///
    /// If the returned future is dropped before the campaign finishes, the
    /// engine and browsers are terminated and later runs fail with
    /// [`BridgeError::UnexpectedTermination`].
    pub async fn run_campaign(&mut self, notifier: &mut dyn RunNotifier) -> Result<()> {
        if self.state.run_active {
            return Err(BridgeError::RunAlreadyActive);
        }
        let mut run = ActiveRun::begin(self);
        run.bridge.run_until_finished(notifier).await
    }

    /// Terminate the engine and every browser.
    pub fn shutdown(&mut self) {
        if let Some(process) = self.process.as_mut() {
            process.check_process_ended();
        }
        self.browsers.shutdown();
    }

    async fn run_until_finished(&mut self, notifier: &mut dyn RunNotifier) -> Result<()> {
        self.ensure_started().await?;
        while !self.state.all_tests_finished {
            self.process_next_message(Some(&mut *notifier)).await?;
        }
        info!(engine = %self.config.kind, "campaign finished");
        Ok(())
    }

    async fn ensure_started(&mut self) -> Result<()> {
        if self.process.is_none() {
            let process = EngineProcess::start(&self.config, &self.args).await?;
            info!(
                engine = %self.config.kind,
                version = process.version(),
                pid = ?process.pid(),
                "engine started"
            );
            self.process = Some(process);
        }
        Ok(())
    }

    async fn process_next_message(&mut self, notifier: Option<&mut dyn RunNotifier>) -> Result<()> {
        let Some(process) = self.process.as_mut() else {
            return Err(BridgeError::UnexpectedTermination {
                application: self.config.kind.application(),
            });
        };
        let message = process.read_message().await;
        let result = message
            .and_then(EngineEvent::from_message)
            .and_then(|event| self.dispatch(event, notifier));
        if result.is_err() {
            self.shutdown();
        }
        result
    }

    fn dispatch(&mut self, event: EngineEvent, notifier: Option<&mut dyn RunNotifier>) -> Result<()> {
        let name = event.name();
        debug!(event = name, "dispatching engine event");
        match event {
            EngineEvent::TasksList { tasks } => {
                self.builder.add_forest(&tasks)?;
                self.state.received_tests_list = true;
                debug!(nodes = self.builder.tree().len(), "test tree built");
            }
            EngineEvent::CampaignFinished => {
                self.state.all_tests_finished = true;
            }
            // Reserved for finer-grained reporting.
            EngineEvent::TestStarted | EngineEvent::TestFinished => {}
            EngineEvent::TaskStarted { task_id } => {
                let test = self.resolve(task_id)?;
                active(notifier, name)?.test_started(test);
            }
            EngineEvent::TaskFinished { task_id } => {
                let test = self.resolve(task_id)?;
                active(notifier, name)?.test_finished(test);
            }
            EngineEvent::TaskIgnored { task_id } => {
                let test = self.resolve(task_id)?;
                active(notifier, name)?.test_ignored(test);
            }
            EngineEvent::Error { task_id, error } => {
                let test = self.resolve(task_id)?.clone();
                let error = RemoteTestError::from_test_error(error);
                active(notifier, name)?.test_failure(Failure::new(test, error));
            }
            EngineEvent::ServerAttached { phantom_js } => {
                self.browsers.launch(
                    &self.config.phantomjs,
                    &phantom_js,
                    BROWSER_INSTANCES,
                    self.config.output,
                )?;
            }
            EngineEvent::Unknown => {}
        }
        Ok(())
    }

    fn resolve(&self, task_id: i64) -> Result<&Description> {
        self.builder
            .resolve(task_id)
            .and_then(|id| self.builder.tree().get(id))
            .ok_or(BridgeError::UnknownTaskId(task_id))
    }
}

/// Marks a run as active for as long as it lives.
struct ActiveRun<'a> {
    bridge: &'a mut Bridge,
}

impl<'a> ActiveRun<'a> {
    fn begin(bridge: &'a mut Bridge) -> Self {
        bridge.state.run_active = true;
        Self { bridge }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.bridge.state.run_active = false;
        if !self.bridge.state.all_tests_finished {
            debug!("run ended before campaignFinished, tearing down engine");
            self.bridge.shutdown();
        }
    }
}

fn active<'a>(
    notifier: Option<&'a mut dyn RunNotifier>,
    event: &'static str,
) -> Result<&'a mut dyn RunNotifier> {
    notifier.ok_or(BridgeError::NoActiveRun { event })
}

#[async_trait]
impl Runner for Bridge {
    fn name(&self) -> &str {
        &self.builder.tree().root().name
    }

    async fn description(&mut self) -> Result<&TestTree> {
        self.discover().await
    }

    async fn run(&mut self, notifier: &mut dyn RunNotifier) -> Result<()> {
        self.run_campaign(notifier).await
    }
}

/// Root test name derived from a configuration file path (its file stem).
pub fn root_name_for(config_file: &Path) -> String {
    config_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config_file.display().to_string())
}
