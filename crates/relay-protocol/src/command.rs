//! Parsing inbound protocol lines into typed commands.
//!
//! Every inbound line has the shape `<VERB>:<payload>`. Verbs are
//! case-sensitive. The parser never guesses: anything it does not recognise
//! comes back as a `ProtocolError` and the caller decides whether to report
//! it or drop it.

use thiserror::Error;

/// Separator between the verb and its payload.
const VERB_SEPARATOR: char = ':';

/// A parsed inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Claim a display name. The payload is passed on untrimmed; the
    /// registry validates it as a `DisplayName`.
    Join(String),

    /// Chat text, verbatim after the first colon.
    Message(String),

    /// Voluntary leave. Any payload is ignored.
    Quit,

    /// Request removal of the session holding the target name.
    Kick(String),
}

/// Errors produced while parsing an inbound line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The line has no `:` separating verb and payload.
    #[error("missing verb separator in line: {0:?}")]
    MissingSeparator(String),

    /// The verb is not one of JOIN, MESSAGE, QUIT, KICK.
    #[error("unknown verb: {0:?}")]
    UnknownVerb(String),

    /// KICK with nothing but separators after the verb.
    #[error("malformed kick command: {0:?}")]
    MalformedKick(String),
}

impl ProtocolError {
    /// Whether the issuing client should be told about this error.
    ///
    /// Unknown input is dropped silently; only a malformed KICK is reported.
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::MalformedKick(_))
    }
}

impl Command {
    /// Parses one inbound line.
    ///
    /// A trailing `\r` (from CRLF clients) is stripped first. The line must
    /// not contain the terminating `\n`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingSeparator` if there is no `:`
    /// - `ProtocolError::UnknownVerb` for any verb outside the protocol
    /// - `ProtocolError::MalformedKick` if the KICK payload has no fields
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        let (verb, payload) = line
            .split_once(VERB_SEPARATOR)
            .ok_or_else(|| ProtocolError::MissingSeparator(line.to_string()))?;

        match verb {
            "JOIN" => Ok(Self::Join(payload.to_string())),
            "MESSAGE" => Ok(Self::Message(payload.to_string())),
            "QUIT" => Ok(Self::Quit),
            "KICK" => parse_kick_target(payload).map(Self::Kick),
            other => Err(ProtocolError::UnknownVerb(other.to_string())),
        }
    }

    /// Short verb name for logging.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Join(_) => "JOIN",
            Self::Message(_) => "MESSAGE",
            Self::Quit => "QUIT",
            Self::Kick(_) => "KICK",
        }
    }
}

/// Only the first `:`-separated field of a KICK payload names the target.
///
/// The payload is malformed only when it has no fields at all (empty, or
/// nothing but separators). A blank first field, as in `KICK::bob`, is a
/// valid command naming nobody.
fn parse_kick_target(payload: &str) -> Result<String, ProtocolError> {
    if payload.chars().all(|c| c == VERB_SEPARATOR) {
        return Err(ProtocolError::MalformedKick(payload.to_string()));
    }

    let target = payload
        .split(VERB_SEPARATOR)
        .next()
        .map(str::trim)
        .unwrap_or_default();

    Ok(target.to_string())
}

/// Removes the sender's own `<name>: ` prefix from a chat payload.
///
/// Clients embed their name by convention (`MESSAGE:alice: hi`). The relay
/// derives the sender from the session instead, so the embedded copy is
/// dropped when it matches. Payloads without the prefix come back unchanged.
pub fn strip_sender_prefix<'a>(text: &'a str, sender: &str) -> &'a str {
    text.strip_prefix(sender)
        .and_then(|rest| rest.strip_prefix(": "))
        .unwrap_or(text)
}
