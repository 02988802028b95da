//! External engine definitions and process supervision.
//!
//! # Architecture
//!
//! ```text
//! Bridge
//!     |
//!     v
//! EngineProcess::start(kind, config, args)
//!     |   node <root>/bin/<entry>.js -j <args...>
//!     |        |
//!     |        +-- stderr --> forward task --> host stdout
//!     |        +-- stdout --> JsonStream
//!     |
//!     |   handshake: {"application": ..., "version": ...}
//!     |   read_message() --> serde_json::Value
//!     |   check_process_ended()
//! ```

pub mod executable;
pub mod forward;
pub mod process;

pub use executable::ExternalExecutable;
pub use forward::OutputTarget;
pub use process::EngineProcess;

use std::path::Path;
use std::path::PathBuf;

/// The external engines this crate knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// The attester test campaign runner.
    Attester,
    /// The standalone Aria Templates JS test runner.
    AtJsTestRunner,
}

impl EngineKind {
    /// Identifier the engine reports in its handshake `application` field.
    pub fn application(self) -> &'static str {
        match self {
            Self::Attester => "attester",
            Self::AtJsTestRunner => "atjstestrunner",
        }
    }

    /// Major version this bridge was written against.
    pub fn expected_major_version(self) -> &'static str {
        "1"
    }

    /// Environment variable holding the engine installation root.
    pub fn root_setting(self) -> &'static str {
        match self {
            Self::Attester => "ATTESTER_PATH",
            Self::AtJsTestRunner => "ATJSTESTRUNNER_PATH",
        }
    }

    /// Location of the entry script relative to the installation root.
    pub fn entry_script(self) -> PathBuf {
        match self {
            Self::Attester => Path::new("bin").join("attester.js"),
            Self::AtJsTestRunner => Path::new("bin").join("atjstestrunner.js"),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.application())
    }
}
