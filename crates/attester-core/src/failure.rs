//! Conversion of remote test errors into host-native errors.
//!
//! The stack trace is only built when it is first requested.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::protocol::{StackFrame, TestError};

/// Whether a remote error is an assertion failure or an unexpected error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Assertion,
    Error,
}

/// A host-native stack trace element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTraceElement {
    pub class_name: String,
    pub method_name: String,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
}

impl From<&StackFrame> for StackTraceElement {
    fn from(frame: &StackFrame) -> Self {
        Self {
            class_name: frame.class_name.clone(),
            method_name: frame.function.clone(),
            file_name: frame.file.clone(),
            line_number: frame
                .line
                .and_then(|line| u32::try_from(line).ok()),
        }
    }
}

impl fmt::Display for StackTraceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)?;
        match (&self.file_name, self.line_number) {
            (Some(file), Some(line)) => write!(f, "({file}:{line})"),
            (Some(file), None) => write!(f, "({file})"),
            (None, _) => f.write_str("(Unknown Source)"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    source: TestError,
    stack: OnceLock<Vec<StackTraceElement>>,
}

/// Error materialized from a remote [`TestError`].
///
/// Displays as the remote message. Cloning shares the lazily built trace.
#[derive(Debug, Clone)]
pub struct RemoteTestError {
    kind: FailureKind,
    inner: Arc<Inner>,
}

impl RemoteTestError {
    /// Materialize a remote error. `None` yields an empty, non-assertion
    /// error.
    pub fn from_test_error(error: Option<TestError>) -> Self {
        let source = error.unwrap_or_default();
        let kind = if source.failure {
            FailureKind::Assertion
        } else {
            FailureKind::Error
        };
        Self {
            kind,
            inner: Arc::new(Inner {
                source,
                stack: OnceLock::new(),
            }),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn is_assertion(&self) -> bool {
        self.kind == FailureKind::Assertion
    }

    pub fn message(&self) -> &str {
        &self.inner.source.message
    }

    /// Stack trace in wire order, innermost frame first.
    pub fn stack_trace(&self) -> &[StackTraceElement] {
        self.inner.stack.get_or_init(|| {
            self.inner
                .source
                .stack
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(StackTraceElement::from)
                .collect()
        })
    }

    /// Whether the stack trace has been built yet.
    pub fn is_stack_materialized(&self) -> bool {
        self.inner.stack.get().is_some()
    }
}

impl fmt::Display for RemoteTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for RemoteTestError {}
