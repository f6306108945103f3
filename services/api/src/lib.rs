//! Voicebridge API Library Crate
//!
//! This library contains all the core logic for the voice relay service:
//! the application state, configuration, tool registry, WebSocket relay
//! logic, and routing. The `api` binary is a thin wrapper around this
//! library.

pub mod config;
pub mod instruction;
pub mod router;
pub mod state;
pub mod tools;
pub mod ws;
