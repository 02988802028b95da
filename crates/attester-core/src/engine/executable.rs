//! Named external executables with an environment override.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{BridgeError, Result};

/// An executable the bridge launches, e.g. `node` or `phantomjs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalExecutable {
    /// Display name, also the default binary looked up on `$PATH`.
    pub name: &'static str,
    /// Environment variable that overrides the binary path.
    pub setting: &'static str,
    /// Binary actually launched.
    pub binary: String,
}

impl ExternalExecutable {
    pub const NODE_SETTING: &str = "ATTESTER_NODE_BIN";
    pub const PHANTOMJS_SETTING: &str = "ATTESTER_PHANTOMJS_BIN";

    /// The JavaScript runtime used to run the engine entry script.
    pub fn node(binary: impl Into<String>) -> Self {
        Self {
            name: "node",
            setting: Self::NODE_SETTING,
            binary: binary.into(),
        }
    }

    /// The headless browser started on `serverAttached`.
    pub fn phantomjs(binary: impl Into<String>) -> Self {
        Self {
            name: "phantomjs",
            setting: Self::PHANTOMJS_SETTING,
            binary: binary.into(),
        }
    }

    /// Read the override from the environment, falling back to `name`.
    pub fn binary_from_env(name: &'static str, setting: &'static str) -> String {
        std::env::var(setting).unwrap_or_else(|_| name.to_string())
    }

    /// Spawn the executable with every standard stream piped except stdin.
    ///
    /// The child is killed if its handle is dropped while still running.
    pub fn spawn<I, S>(&self, args: I) -> Result<Child>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| BridgeError::SpawnFailed {
            name: self.name,
            executable: self.binary.clone(),
            setting: self.setting,
            source,
        })?;
        debug!(executable = self.name, binary = %self.binary, pid = ?child.id(), "spawned process");
        Ok(child)
    }
}
