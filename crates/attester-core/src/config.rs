//! Engine installation and executable settings.
//!
//! Settings come from the environment by default; every value can also be
//! set explicitly. Nothing is validated until the engine is launched.

use std::path::{Path, PathBuf};

use crate::engine::forward::OutputTarget;
use crate::engine::{EngineKind, ExternalExecutable};
use crate::error::{BridgeError, Result};

/// Locations of the engine installation and the executables it needs.
///
/// Reads from `ATTESTER_PATH` / `ATJSTESTRUNNER_PATH` (depending on the
/// engine), `ATTESTER_NODE_BIN` and `ATTESTER_PHANTOMJS_BIN`. The
/// executables fall back to `node` and `phantomjs` on `$PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Which engine this configuration drives.
    pub kind: EngineKind,
    /// Engine installation root. Required before launch.
    pub engine_root: Option<PathBuf>,
    /// JavaScript runtime used to run the entry script.
    pub node: ExternalExecutable,
    /// Browser launched for each attached server slot.
    pub phantomjs: ExternalExecutable,
    /// Where engine diagnostics and browser stdout are forwarded.
    pub output: OutputTarget,
}

impl EngineConfig {
    /// Build a config from the environment.
    pub fn from_env(kind: EngineKind) -> Self {
        let engine_root = std::env::var_os(kind.root_setting()).map(PathBuf::from);
        Self {
            kind,
            engine_root,
            node: ExternalExecutable::node(ExternalExecutable::binary_from_env(
                "node",
                ExternalExecutable::NODE_SETTING,
            )),
            phantomjs: ExternalExecutable::phantomjs(ExternalExecutable::binary_from_env(
                "phantomjs",
                ExternalExecutable::PHANTOMJS_SETTING,
            )),
            output: OutputTarget::default(),
        }
    }

    /// Build a config with an explicit root and default executables.
    pub fn new(kind: EngineKind, engine_root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            engine_root: Some(engine_root.into()),
            node: ExternalExecutable::node("node"),
            phantomjs: ExternalExecutable::phantomjs("phantomjs"),
            output: OutputTarget::default(),
        }
    }

    pub fn with_engine_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.engine_root = Some(root.into());
        self
    }

    pub fn with_node(mut self, binary: impl Into<String>) -> Self {
        self.node = ExternalExecutable::node(binary);
        self
    }

    pub fn with_phantomjs(mut self, binary: impl Into<String>) -> Self {
        self.phantomjs = ExternalExecutable::phantomjs(binary);
        self
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    /// Resolve the absolute path of the engine entry script.
    ///
    /// Fails if the root is not configured or the script does not exist.
    pub fn entry_script(&self) -> Result<PathBuf> {
        let root = self
            .engine_root
            .as_deref()
            .ok_or(BridgeError::MissingSetting {
                application: self.kind.application(),
                setting: self.kind.root_setting(),
            })?;
        let script = absolute(&root.join(self.kind.entry_script()));
        if !script.exists() {
            return Err(BridgeError::EntryScriptNotFound {
                setting: self.kind.root_setting(),
                path: script,
            });
        }
        Ok(script)
    }
}

/// Make `path` absolute against the current directory without touching
/// the filesystem beyond that.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
