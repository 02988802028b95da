//! Error types for the bridge.
//!
//! Every variant is fatal for the bridge that produced it except where
//! noted; there is no retry anywhere in the core.

use std::path::PathBuf;

use crate::json_stream::JsonStreamError;

/// Errors surfaced by the engine process, the dispatcher and the tree
/// builder.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A required setting (environment variable) is not defined.
    #[error("please define the following environment variable to specify the path to {application}: {setting}")]
    MissingSetting {
        application: &'static str,
        setting: &'static str,
    },

    /// The entry script does not exist below the configured root.
    #[error("the path specified in {setting} is invalid: {} does not exist", path.display())]
    EntryScriptNotFound {
        setting: &'static str,
        path: PathBuf,
    },

    /// The per-suite configuration file does not exist.
    #[error("configuration file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    /// An external executable could not be launched.
    #[error(
        "failed to start {name}; the following executable was used: {executable}; \
         you can configure the path to the executable with the {setting} environment variable"
    )]
    SpawnFailed {
        name: &'static str,
        executable: String,
        setting: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The handshake did not identify the expected application.
    #[error(
        "the {application} external program does not behave as expected; \
         either its version is incompatible or there was an unknown error"
    )]
    Incompatible {
        application: &'static str,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The message stream ended before an in-band completion event.
    #[error("the {application} external program terminated unexpectedly")]
    UnexpectedTermination { application: &'static str },

    /// The message stream could not be decoded.
    #[error("failed to decode message from {application}")]
    Decode {
        application: &'static str,
        #[source]
        source: JsonStreamError,
    },

    /// A decoded message does not follow the event schema.
    #[error("malformed event message: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    /// Two task nodes in the tasks list share the same id.
    #[error("received several tests with the same id: {0}")]
    DuplicateTaskId(i64),

    /// An event referenced a task id absent from the tasks list.
    #[error("received an event for an unknown task id: {0}")]
    UnknownTaskId(i64),

    /// `run` was called while a previous run is still marked active.
    #[error("a run is already active on this bridge")]
    RunAlreadyActive,

    /// A task notification arrived while no run was active.
    #[error("received a {event} event while no run is active")]
    NoActiveRun { event: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether this error comes from local configuration rather than from
    /// the engine's behaviour.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingSetting { .. }
                | Self::EntryScriptNotFound { .. }
                | Self::ConfigFileNotFound { .. }
                | Self::SpawnFailed { .. }
        )
    }
}

/// Convenience alias used across the core crate.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
