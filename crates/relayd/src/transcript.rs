//! Timestamped transcript of relayed traffic.
//!
//! Every join, leave, kick, chat line and operator message that the registry
//! fans out is also written, prefixed with a local timestamp, to the
//! transcript output (stdout for the daemon). This is the operator's view of
//! the room; diagnostics go through `tracing` instead.

use chrono::Local;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::{RegistryEvent, RegistryHandle};

/// Timestamp format used for transcript lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prefixes `line` with the current local time.
pub fn stamp(line: &str) -> String {
    format!("{} {}", Local::now().format(TIMESTAMP_FORMAT), line)
}

/// Writes one stamped line and flushes.
pub async fn write_stamped<W>(out: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut stamped = stamp(line);
    stamped.push('\n');
    out.write_all(stamped.as_bytes()).await?;
    out.flush().await
}

/// Spawns the transcript task.
///
/// Subscribes to the registry immediately, so every event published after
/// this call returns is recorded. The task ends when `cancel_token` fires,
/// the registry goes away, or writing to `out` fails.
pub fn spawn_transcript<W>(
    registry: &RegistryHandle,
    mut out: W,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut events = registry.subscribe();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Transcript shutting down");
                    break;
                }
                result = events.recv() => result,
            };

            match event {
                Ok(event) => {
                    if let Err(e) = record(&mut out, &event).await {
                        warn!(error = %e, "Transcript write failed, stopping");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Transcript lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Registry event channel closed");
                    break;
                }
            }
        }
    })
}

async fn record<W>(out: &mut W, event: &RegistryEvent) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_stamped(out, &event.notification().to_line()).await
}
