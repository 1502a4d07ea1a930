//! Shared application state handed to routes and controller factories.

use crate::config::StackConfig;
use crate::db::DatabaseAgent;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<dyn DatabaseAgent>,
    /// Defaults for records created while serving requests.
    pub stack: StackConfig,
}

impl AppState {
    pub fn new(agent: Arc<dyn DatabaseAgent>, stack: StackConfig) -> Self {
        AppState { agent, stack }
    }
}
