//! WebSocket Relay Sessions
//!
//! This module contains the core logic for bridging browser connections to
//! the Gemini Live API. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the frame format the browser client speaks.
//! - `session`: Manages the relay lifecycle, from upstream connect to teardown.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
