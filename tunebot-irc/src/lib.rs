//! Protocol layer for tunebot.
//!
//! # Modules
//!
//! - [`irc`] — IRC line parsing/formatting
//! - [`pipeline`] — reader/dispatcher/writer tasks and their channels
//! - [`client`] — TCP/TLS transport and the top-level `run`

pub mod client;
pub mod irc;
pub mod pipeline;
