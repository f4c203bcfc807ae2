//! Outbound notification lines.
//!
//! A notification renders to exactly one line of text without the trailing
//! `\n`; the writer appends the line boundary.

use std::fmt;

use relay_core::DisplayName;

/// Prefix for messages originating from the server itself.
pub const SERVER_PREFIX: &str = "SERVER:";

/// Prefix for rejections sent to a single client.
pub const ERROR_PREFIX: &str = "ERROR:";

/// Messages the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `SERVER: <name> has joined the chat.`
    Joined(DisplayName),

    /// `SERVER: <name> has left the chat.`
    Left(DisplayName),

    /// `SERVER: Current users: <a>, <b>, ...`
    UserList(Vec<DisplayName>),

    /// Final line to the session being kicked.
    YouWereKicked,

    /// `SERVER: <name> has been kicked from the chat.`
    WasKicked(DisplayName),

    /// Relayed chat, `<name>: <text>`.
    Chat { from: DisplayName, text: String },

    /// Operator console broadcast, `SERVER: <text>`.
    Operator(String),

    /// A rejection for the issuing client only.
    Error(Rejection),
}

/// Reasons a client command is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// JOIN with an empty or already-claimed name.
    InvalidName,

    /// KICK without a target.
    KickFormat,

    /// MESSAGE or KICK before a successful JOIN.
    NotJoined,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "Invalid or duplicate username."),
            Self::KickFormat => write!(f, "Invalid kick command format."),
            Self::NotJoined => write!(f, "You must join the chat first."),
        }
    }
}

impl Notification {
    /// Builds a user-list notification from any iterator of names.
    pub fn user_list<'a>(names: impl IntoIterator<Item = &'a DisplayName>) -> Self {
        Self::UserList(names.into_iter().cloned().collect())
    }

    /// Renders the notification as a wire line (without `\n`).
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined(name) => write!(f, "{SERVER_PREFIX} {name} has joined the chat."),
            Self::Left(name) => write!(f, "{SERVER_PREFIX} {name} has left the chat."),
            Self::UserList(names) => {
                write!(f, "{SERVER_PREFIX} Current users: ")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name.as_str())?;
                }
                Ok(())
            }
            Self::YouWereKicked => {
                write!(f, "{SERVER_PREFIX} You have been kicked from the chat.")
            }
            Self::WasKicked(name) => {
                write!(f, "{SERVER_PREFIX} {name} has been kicked from the chat.")
            }
            Self::Chat { from, text } => write!(f, "{from}: {text}"),
            Self::Operator(text) => write!(f, "{SERVER_PREFIX} {text}"),
            Self::Error(rejection) => write!(f, "{ERROR_PREFIX} {rejection}"),
        }
    }
}
