//! Application state for the API server

use crate::{Config, Orchestrator};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the orchestrator instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main Orchestrator instance
    pub orchestrator: Arc<Orchestrator>,

    /// Configuration (read access)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let config = orchestrator.config();
        Self {
            orchestrator,
            config,
        }
    }
}
