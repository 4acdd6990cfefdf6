//! Shared state for the HTTP server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::session::Session;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    session: Arc<Session>,
}

impl AppState {
    /// Build state with the backends named in the configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        Ok(Self::from_session(Session::new(config)?))
    }

    pub fn from_session(session: Session) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &RagConfig {
        self.session.config()
    }
}
