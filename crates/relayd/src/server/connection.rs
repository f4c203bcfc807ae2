//! Connection handler for individual client sessions.
//!
//! Each accepted connection gets:
//! - a `ConnectionHandler` that reads one line at a time through a
//!   `RelayLineCodec`, parses it as a `Command`, and routes it to the registry
//! - a writer task that drains the session's `Outbox` onto the socket
//!
//! Whatever ends the read loop (QUIT, end of stream, I/O error, or a kick
//! closing the connection), the session is removed from the registry exactly
//! once, after the loop has exited.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in teardown

use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_core::{DisplayName, SessionId};
use relay_protocol::{
    Command, InboundLine, Notification, ProtocolError, RelayLineCodec, Rejection,
};

use crate::registry::{Outbound, Outbox, RegistryError, RegistryHandle, RemovalReason};

/// Default maximum accepted line length in bytes (64 KiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// How a session's read loop ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// Client sent QUIT.
    Quit,

    /// Client closed its side of the connection.
    Eof,

    /// The connection was closed from our side (kick or writer failure).
    Closed,
}

/// Serves one accepted connection until it is closed.
///
/// Splits the stream, starts the writer task, runs the read loop, and waits
/// for the writer to flush before returning.
pub async fn serve_connection(
    stream: TcpStream,
    session_id: SessionId,
    registry: RegistryHandle,
    max_line_length: usize,
) {
    let (reader, writer) = stream.into_split();
    let (outbox, inbox) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();

    let writer_task = spawn_writer(session_id, writer, inbox, closed.clone());

    let handler = ConnectionHandler::new(session_id, reader, outbox, registry, closed)
        .with_max_line_length(max_line_length);
    handler.run().await;

    if let Err(e) = writer_task.await {
        warn!(session_id = %session_id, error = %e, "Writer task failed");
    }
}

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Identity of this connection
    session_id: SessionId,

    /// Line-framed reader for incoming traffic
    reader: FramedRead<OwnedReadHalf, RelayLineCodec>,

    /// This session's outbound queue (also handed to the registry on JOIN)
    outbox: Outbox,

    /// Handle to the name registry
    registry: RegistryHandle,

    /// Cancelled when the connection is closed from our side
    closed: CancellationToken,

    /// Name claimed by a successful JOIN
    name: Option<DisplayName>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `session_id` - Identity assigned by the listener
    /// * `reader` - Read half of the TCP stream
    /// * `outbox` - Queue drained by this connection's writer task
    /// * `registry` - Handle to the name registry
    /// * `closed` - Token the writer cancels when the connection closes
    pub fn new(
        session_id: SessionId,
        reader: OwnedReadHalf,
        outbox: Outbox,
        registry: RegistryHandle,
        closed: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            reader: FramedRead::new(reader, RelayLineCodec::new(DEFAULT_MAX_LINE_LENGTH)),
            outbox,
            registry,
            closed,
            name: None,
        }
    }

    /// Overrides the maximum accepted line length.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        *self.reader.decoder_mut() = RelayLineCodec::new(max_line_length);
        self
    }

    /// Runs the handler until the connection ends, then cleans up.
    pub async fn run(mut self) {
        debug!(session_id = %self.session_id, "Client connected");

        let reason = match self.process_lines().await {
            Ok(SessionExit::Quit) => RemovalReason::Quit,
            Ok(SessionExit::Eof) | Ok(SessionExit::Closed) => RemovalReason::Disconnected,
            Err(e) => {
                debug!(session_id = %self.session_id, error = %e, "Connection failed");
                RemovalReason::Disconnected
            }
        };

        // Single cleanup path: a kicked session is already gone and this is a no-op
        self.registry.remove(self.session_id, reason).await;

        // Ask the writer to flush and close; ignored if it already stopped
        let _ = self.outbox.send(Outbound::Close);

        info!(
            session_id = %self.session_id,
            name = ?self.name.as_ref().map(DisplayName::as_str),
            "Client disconnected"
        );
    }

    /// Main read loop.
    ///
    /// Undecodable bytes never end the session: the codec replaces them, and
    /// oversized lines are skipped.
    async fn process_lines(&mut self) -> Result<SessionExit, ConnectionError> {
        loop {
            let frame = tokio::select! {
                _ = self.closed.cancelled() => return Ok(SessionExit::Closed),
                frame = self.reader.next() => frame,
            };

            let line = match frame {
                Some(Ok(InboundLine::Line(line))) => line,
                Some(Ok(InboundLine::Oversized(size))) => {
                    warn!(
                        session_id = %self.session_id,
                        size,
                        max = self.reader.decoder().max_length(),
                        "Dropping oversized line"
                    );
                    continue;
                }
                Some(Err(e)) => return Err(ConnectionError::Io(e.to_string())),
                None => {
                    debug!(session_id = %self.session_id, "Client sent EOF");
                    return Ok(SessionExit::Eof);
                }
            };

            match Command::parse(&line) {
                Ok(command) => {
                    if let Some(exit) = self.handle_command(command).await? {
                        return Ok(exit);
                    }
                }
                Err(e) => self.handle_protocol_error(&e),
            }
        }
    }

    /// Handles a single parsed command.
    ///
    /// Returns `Some(exit)` when the read loop should stop.
    async fn handle_command(
        &mut self,
        command: Command,
    ) -> Result<Option<SessionExit>, ConnectionError> {
        debug!(
            session_id = %self.session_id,
            verb = command.verb(),
            "Received command"
        );

        match command {
            Command::Join(name) => {
                match self
                    .registry
                    .try_register(self.session_id, name, self.outbox.clone())
                    .await
                {
                    Ok(name) => self.name = Some(name),
                    Err(e) if e.is_join_rejection() => {
                        debug!(session_id = %self.session_id, error = %e, "Join rejected");
                        self.reply(Notification::Error(Rejection::InvalidName));
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Command::Message(text) => match self.registry.chat(self.session_id, text).await {
                Ok(()) => {}
                Err(RegistryError::NotJoined(_)) => {
                    self.reply(Notification::Error(Rejection::NotJoined));
                }
                Err(e) => return Err(e.into()),
            },

            Command::Quit => {
                self.registry
                    .remove(self.session_id, RemovalReason::Quit)
                    .await;
                return Ok(Some(SessionExit::Quit));
            }

            Command::Kick(target) => {
                match self.registry.kick_as(self.session_id, target.as_str()).await {
                    Ok(kicked) => {
                        info!(
                            session_id = %self.session_id,
                            target = %target,
                            kicked,
                            "Kick requested"
                        );
                    }
                    Err(RegistryError::NotJoined(_)) => {
                        self.reply(Notification::Error(Rejection::NotJoined));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(None)
    }

    /// Reports or drops a line that did not parse.
    fn handle_protocol_error(&self, error: &ProtocolError) {
        if error.is_reportable() {
            debug!(session_id = %self.session_id, error = %error, "Malformed command");
            self.reply(Notification::Error(Rejection::KickFormat));
        } else {
            debug!(session_id = %self.session_id, error = %error, "Ignoring line");
        }
    }

    /// Queues a notification for this session only.
    fn reply(&self, notification: Notification) {
        if self.outbox.send(Outbound::Line(notification.to_line())).is_err() {
            debug!(session_id = %self.session_id, "Reply dropped, writer gone");
        }
    }
}

/// Spawns the task that writes queued lines to the socket.
///
/// The task stops on `Outbound::Close`, on a write failure, or once every
/// outbox sender is gone. In each case it shuts the write half down and
/// cancels `closed` so the read loop unblocks.
pub fn spawn_writer(
    session_id: SessionId,
    writer: OwnedWriteHalf,
    mut inbox: mpsc::UnboundedReceiver<Outbound>,
    closed: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);

        while let Some(item) = inbox.recv().await {
            let Outbound::Line(line) = item else {
                break;
            };

            let result = async {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                Ok::<(), std::io::Error>(())
            }
            .await;

            if let Err(e) = result {
                debug!(session_id = %session_id, error = %e, "Write failed");
                break;
            }
        }

        if let Err(e) = writer.flush().await {
            debug!(session_id = %session_id, error = %e, "Final flush failed");
        }
        if let Err(e) = writer.shutdown().await {
            debug!(session_id = %session_id, error = %e, "Shutdown failed");
        }

        closed.cancel();
    })
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
