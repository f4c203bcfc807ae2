//! Operator console.
//!
//! Reads operator input line by line (stdin for the daemon):
//! - `list` (any case) writes the current user list to the console output
//! - any other non-empty line is broadcast to every session as `SERVER: <line>`
//!
//! The console acts on the registry through the same handle as client
//! sessions, so its broadcasts are ordered with everything else.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{debug, info};

use relay_protocol::Notification;

use crate::registry::RegistryHandle;
use crate::transcript::write_stamped;

/// Console keyword that lists users instead of broadcasting.
const LIST_COMMAND: &str = "list";

/// What the console did with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    /// Blank input, nothing done.
    Ignored,

    /// Wrote the user list; carries the rendered line.
    Listed(String),

    /// Broadcast an operator message to this many sessions.
    Broadcast(usize),
}

/// Operator console bound to an input and an output stream.
pub struct OperatorConsole<R, W> {
    input: R,
    output: W,
    registry: RegistryHandle,
}

impl<R, W> OperatorConsole<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a console reading `input` and writing listings to `output`.
    pub fn new(input: R, output: W, registry: RegistryHandle) -> Self {
        Self {
            input,
            output,
            registry,
        }
    }

    /// Processes input until end of stream.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that stopped reading input or writing output.
    pub async fn run(mut self) -> std::io::Result<()> {
        info!("Operator console ready");

        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line).await? == 0 {
                debug!("Operator console input closed");
                return Ok(());
            }

            self.handle_line(&line).await?;
        }
    }

    /// Handles one line of operator input.
    pub async fn handle_line(&mut self, raw: &str) -> std::io::Result<ConsoleAction> {
        let line = raw.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            return Ok(ConsoleAction::Ignored);
        }

        if line.trim().eq_ignore_ascii_case(LIST_COMMAND) {
            let names = self.registry.snapshot().await;
            let rendered = Notification::user_list(&names).to_line();
            write_stamped(&mut self.output, &rendered).await?;
            return Ok(ConsoleAction::Listed(rendered));
        }

        let recipients = self
            .registry
            .broadcast(Notification::Operator(line.to_string()))
            .await;
        debug!(recipients, "Operator message broadcast");

        Ok(ConsoleAction::Broadcast(recipients))
    }
}
