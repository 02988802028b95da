//! Supervision of the engine subprocess.
//!
//! Launches `<node> <root>/bin/<entry>.js -j <args...>`, forwards the
//! engine's stderr to the configured host stream, validates the handshake
//! and hands out decoded messages. Any failure on the start or read path terminates
//! the subprocess before the error is returned.

use serde_json::Value;
use tokio::process::{Child, ChildStdout};
use tracing::{debug, warn};

use super::forward;
use crate::config::EngineConfig;
use crate::engine::EngineKind;
use crate::error::{BridgeError, Result};
use crate::json_stream::JsonStream;
use crate::protocol::Handshake;

/// Flag that makes the engine emit JSON events on stdout.
pub const JSON_OUTPUT_FLAG: &str = "-j";

/// A running engine subprocess and its decoded message stream.
pub struct EngineProcess {
    kind: EngineKind,
    /// `None` once the process has been torn down.
    child: Option<Child>,
    messages: JsonStream<ChildStdout>,
    version: String,
}

impl std::fmt::Debug for EngineProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineProcess")
            .field("kind", &self.kind)
            .field("pid", &self.pid())
            .field("version", &self.version)
            .finish()
    }
}

impl EngineProcess {
    /// Launch the engine and validate its handshake.
    pub async fn start<S: AsRef<str>>(config: &EngineConfig, args: &[S]) -> Result<Self> {
        let kind = config.kind;
        let script = config.entry_script()?;

        let mut argv = Vec::with_capacity(args.len() + 2);
        argv.push(script.into_os_string());
        argv.push(JSON_OUTPUT_FLAG.into());
        argv.extend(args.iter().map(|a| a.as_ref().into()));

        let mut child = config.node.spawn(&argv)?;
        forward::forward_output("engine-stderr", child.stderr.take(), config.output);

        let Some(stdout) = child.stdout.take() else {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to kill engine process");
            }
            return Err(BridgeError::Incompatible {
                application: kind.application(),
                source: None,
            });
        };

        let mut process = Self {
            kind,
            child: Some(child),
            messages: JsonStream::new(stdout),
            version: String::new(),
        };

        if let Err(e) = process.check_compatibility().await {
            process.check_process_ended();
            return Err(e);
        }
        Ok(process)
    }

    /// Read the first message and check application identity and version.
    async fn check_compatibility(&mut self) -> Result<()> {
        let application = self.kind.application();
        let incompatible = |source: Option<Box<dyn std::error::Error + Send + Sync>>| {
            BridgeError::Incompatible {
                application,
                source,
            }
        };

        let first = self
            .messages
            .read()
            .await
            .map_err(|e| incompatible(Some(Box::new(e))))?
            .ok_or_else(|| incompatible(None))?;
        let handshake: Handshake =
            serde_json::from_value(first).map_err(|e| incompatible(Some(Box::new(e))))?;

        if handshake.application != application {
            return Err(incompatible(None));
        }

        let expected = self.kind.expected_major_version();
        if !handshake.has_major_version(expected) {
            warn!(
                application,
                version = %handshake.version,
                expected,
                "using a different version of the engine than expected"
            );
        }
        debug!(application, version = %handshake.version, "engine handshake accepted");
        self.version = handshake.version;
        Ok(())
    }

    /// Wait for the next message from the engine.
    ///
    /// End of stream is an error: completion is only ever signalled by an
    /// in-band event. Any error terminates the subprocess, so a process
    /// that failed a read cannot be read from again.
    pub async fn read_message(&mut self) -> Result<Value> {
        let application = self.kind.application();
        if self.child.is_none() {
            return Err(BridgeError::UnexpectedTermination { application });
        }

        let result = match self.messages.read().await {
            Ok(Some(message)) => return Ok(message),
            Ok(None) => Err(BridgeError::UnexpectedTermination { application }),
            Err(source) => Err(BridgeError::Decode {
                application,
                source,
            }),
        };
        self.check_process_ended();
        result
    }

    /// Terminate the subprocess if it is still running.
    ///
    /// Idempotent: the handle is cleared on the first call, later calls do
    /// nothing.
    pub fn check_process_ended(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(application = self.kind.application(), %status, "engine already exited");
            }
            Ok(None) | Err(_) => {
                debug!(application = self.kind.application(), pid = ?child.id(), "killing engine");
                if let Err(e) = child.start_kill() {
                    warn!(error = %e, "failed to kill engine process");
                }
            }
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Version string reported in the handshake.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// OS pid of the engine, `None` after teardown.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Whether the subprocess handle is still held.
    pub fn is_alive(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.check_process_ended();
    }
}
