//! Bridge between an out-of-process JavaScript test engine (attester or
//! the standalone JS test runner) and a host test reporting model.
//!
//! The engine is launched as a subprocess and streams JSON events on its
//! stdout. The [`Bridge`] decodes them, builds the static [`TestTree`] from
//! the engine's tasks list and turns task events into [`RunNotifier`]
//! callbacks.

pub mod bridge;
pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod failure;
pub mod host;
pub mod json_stream;
pub mod protocol;

pub use bridge::Bridge;
pub use builder::{TaskIndex, TestTreeBuilder, build_tree};
pub use config::EngineConfig;
pub use engine::{EngineKind, EngineProcess, ExternalExecutable, OutputTarget};
pub use error::{BridgeError, Result};
pub use failure::{FailureKind, RemoteTestError, StackTraceElement};
pub use host::{Description, DescriptionId, Failure, RunNotifier, Runner, TestTree};
pub use json_stream::{JsonStream, JsonStreamError};
pub use protocol::{EngineEvent, Handshake, StackFrame, TaskNode, TestError};
