//! Wire types for the engine's JSON event protocol.
//!
//! Unknown fields are ignored everywhere so newer engines keep working.
//! Optional failure details also accept an explicit `null`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// First message written by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Handshake {
    pub application: String,
    pub version: String,
}

impl Handshake {
    /// Whether the dot-separated leading component of the version equals
    /// `major`.
    pub fn has_major_version(&self, major: &str) -> bool {
        self.version.split('.').next() == Some(major)
    }
}

/// One node of the test tree discovered by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sub_tasks: Option<Vec<TaskNode>>,
}

/// Failure descriptor attached to an `error` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TestError {
    /// `true` for an assertion failure, `false` for an unexpected error.
    #[serde(default, deserialize_with = "null_as_default")]
    pub failure: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default)]
    pub stack: Option<Vec<StackFrame>>,
}

/// One remote stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    #[serde(default, deserialize_with = "null_as_default")]
    pub class_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub function: String,
    #[serde(default)]
    pub file: Option<String>,
    /// Negative when the engine does not know the line.
    #[serde(default)]
    pub line: Option<i64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Every event the bridge reacts to, keyed by the `event` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    TasksList {
        #[serde(default)]
        tasks: Vec<TaskNode>,
    },
    CampaignFinished,
    TestStarted,
    TestFinished,
    TaskStarted {
        #[serde(rename = "taskId")]
        task_id: i64,
    },
    TaskFinished {
        #[serde(rename = "taskId")]
        task_id: i64,
    },
    TaskIgnored {
        #[serde(rename = "taskId")]
        task_id: i64,
    },
    Error {
        #[serde(rename = "taskId")]
        task_id: i64,
        #[serde(default)]
        error: Option<TestError>,
    },
    ServerAttached {
        #[serde(rename = "phantomJS", default)]
        phantom_js: Vec<String>,
    },
    /// Any event type this bridge does not know about.
    #[serde(other)]
    Unknown,
}

impl EngineEvent {
    /// Parse a decoded message. A message without an `event` tag or with a
    /// known tag but an invalid payload is a protocol error.
    pub fn from_message(message: Value) -> Result<Self> {
        serde_json::from_value(message).map_err(BridgeError::MalformedEvent)
    }

    /// The wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TasksList { .. } => "tasksList",
            Self::CampaignFinished => "campaignFinished",
            Self::TestStarted => "testStarted",
            Self::TestFinished => "testFinished",
            Self::TaskStarted { .. } => "taskStarted",
            Self::TaskFinished { .. } => "taskFinished",
            Self::TaskIgnored { .. } => "taskIgnored",
            Self::Error { .. } => "error",
            Self::ServerAttached { .. } => "serverAttached",
            Self::Unknown => "unknown",
        }
    }
}
