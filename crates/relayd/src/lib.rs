//! Relay Daemon - name registry, broadcast fan-out and TCP listener
//!
//! This crate provides the core infrastructure for the relay daemon:
//! - `registry` - Registry actor owning live sessions and claimed names
//! - `server` - TCP listener and per-connection sessions
//! - `console` - Operator console (user listing, operator broadcasts)
//! - `transcript` - Timestamped record of everything relayed
//! - `config` - Defaults, TOML file and environment overrides
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       relayd daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  RelayServer    │     │     RegistryActor           │   │
//! │  │  (TCP accept)   │     │  (sessions + names owner)   │   │
//! │  └────────┬────────┘     └──────┬───────────────┬──────┘   │
//! │           │                     ▲               │           │
//! │           │ connections         │ commands      │ events    │
//! │           ▼                     │               ▼           │
//! │  ┌─────────────────┐            │     ┌─────────────────┐   │
//! │  │ConnectionHandler│────────────┤     │   Transcript    │   │
//! │  │  (per client)   │            │     │    (stdout)     │   │
//! │  └─────────────────┘            │     └─────────────────┘   │
//! │  ┌─────────────────┐            │                           │
//! │  │ OperatorConsole │────────────┘                           │
//! │  │    (stdin)      │                                        │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod console;
pub mod registry;
pub mod server;
pub mod transcript;
