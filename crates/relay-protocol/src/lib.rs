//! Relay Protocol - Line-oriented wire protocol
//!
//! This crate provides the inbound line decoder, the command parser and the
//! outbound notification renderer shared by the relay daemon and its tests.

pub mod codec;
pub mod command;
pub mod notification;

pub use codec::{InboundLine, RelayLineCodec};
pub use command::{strip_sender_prefix, Command, ProtocolError};
pub use notification::{Notification, Rejection, ERROR_PREFIX, SERVER_PREFIX};
