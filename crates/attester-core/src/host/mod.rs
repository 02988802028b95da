//! The host test framework's reporting model.
//!
//! A [`Runner`] exposes a static [`TestTree`] of [`Description`]s and then
//! reports progress through a [`RunNotifier`] while it runs.

pub mod tree;

pub use tree::{Description, DescriptionId, TestTree};

use async_trait::async_trait;

use crate::error::Result;
use crate::failure::RemoteTestError;

/// A failed test: the node it belongs to and the materialized error.
#[derive(Debug, Clone)]
pub struct Failure {
    pub description: Description,
    pub error: RemoteTestError,
}

impl Failure {
    pub fn new(description: Description, error: RemoteTestError) -> Self {
        Self { description, error }
    }
}

/// Receiver of run notifications.
///
/// Callbacks run synchronously on the dispatch loop, one at a time.
pub trait RunNotifier: Send {
    fn test_started(&mut self, description: &Description);

    fn test_finished(&mut self, description: &Description);

    fn test_ignored(&mut self, description: &Description);

    fn test_failure(&mut self, failure: Failure);
}

/// A source of tests that the host framework can describe and run.
///
/// # Object Safety
///
/// Every method returns a concrete type, so runners can be stored as
/// `Box<dyn Runner>`.
#[async_trait]
pub trait Runner: Send {
    /// Human-readable name of the runner (the root test name).
    fn name(&self) -> &str;

    /// The full test tree, discovering it first if needed.
    async fn description(&mut self) -> Result<&TestTree>;

    /// Execute the tests, reporting progress to `notifier`.
    async fn run(&mut self, notifier: &mut dyn RunNotifier) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Runner) {}
};
