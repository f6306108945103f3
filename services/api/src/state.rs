//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared,
//! clonable resources every relay session needs.

use crate::config::Config;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. The tool registry is read-only after construction, so sessions
/// share it without locking.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            tools: Arc::new(ToolRegistry::builtin()),
        }
    }
}
