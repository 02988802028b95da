//! Browser processes started when the engine attaches a server.

use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::engine::forward::{self, OutputTarget};
use crate::engine::ExternalExecutable;
use crate::error::Result;

/// Number of browser instances launched per `serverAttached` event.
pub const BROWSER_INSTANCES: usize = 15;

/// Browser processes owned by a bridge. They are killed when the pool is
/// dropped.
#[derive(Debug, Default)]
pub struct BrowserPool {
    processes: Vec<Child>,
}

impl BrowserPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `count` instances of `browser` with `args`. Their stdout goes
    /// to `output`, their stderr to the host stderr.
    pub fn launch(
        &mut self,
        browser: &ExternalExecutable,
        args: &[String],
        count: usize,
        output: OutputTarget,
    ) -> Result<()> {
        info!(browser = %browser.binary, count, "starting browser instances");
        for slot in 0..count {
            let mut child = browser.spawn(args)?;
            debug!(slot, pid = ?child.id(), "browser started");
            forward::forward_output("browser-stdout", child.stdout.take(), output);
            forward::forward_to_stderr("browser-stderr", child.stderr.take());
            self.processes.push(child);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Number of browsers that have not exited yet.
    pub fn running(&mut self) -> usize {
        self.processes
            .iter_mut()
            .filter_map(|c| c.try_wait().ok())
            .filter(Option::is_none)
            .count()
    }

    /// Kill every browser still running and forget all handles.
    pub fn shutdown(&mut self) {
        for mut child in self.processes.drain(..) {
            if let Ok(None) = child.try_wait() {
                if let Err(e) = child.start_kill() {
                    warn!(error = %e, "failed to kill browser process");
                }
            }
        }
    }
}
