//! Background copying of a child's output streams to the host's own.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawn a task that copies `reader` into `writer` until EOF.
///
/// The task shares nothing with the caller beyond the two stream halves;
/// its handle can be dropped without stopping it. Returns the number of
/// bytes copied.
pub fn forward_stream<R, W>(label: &'static str, mut reader: R, mut writer: W) -> JoinHandle<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::io::copy(&mut reader, &mut writer).await {
            Ok(bytes) => {
                debug!(stream = label, bytes, "forwarded stream reached EOF");
                bytes
            }
            Err(e) => {
                warn!(stream = label, error = %e, "error while forwarding stream");
                0
            }
        }
    })
}

/// Host stream that forwarded diagnostics are written to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Forward `reader` to the host stream selected by `target`.
pub fn forward_output<R>(
    label: &'static str,
    reader: Option<R>,
    target: OutputTarget,
) -> Option<JoinHandle<u64>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    match target {
        OutputTarget::Stdout => forward_to_stdout(label, reader),
        OutputTarget::Stderr => forward_to_stderr(label, reader),
    }
}

/// Forward a child's stdout to the host stdout, if it was piped.
pub fn forward_to_stdout<R>(label: &'static str, reader: Option<R>) -> Option<JoinHandle<u64>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|r| forward_stream(label, r, tokio::io::stdout()))
}

/// Forward a child's stderr to the host stderr, if it was piped.
pub fn forward_to_stderr<R>(label: &'static str, reader: Option<R>) -> Option<JoinHandle<u64>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|r| forward_stream(label, r, tokio::io::stderr()))
}
