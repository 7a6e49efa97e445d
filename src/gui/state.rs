use std::sync::Arc;

use crate::{
    backend::Backend,
    config::Config,
    core::{FormError, SessionStore},
};

#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub backend: Option<Arc<Backend>>,
    pub session: SessionStore,
    /// Shown above every screen until dismissed.
    pub banner: Option<String>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            backend: None,
            session: SessionStore::default(),
            banner: None,
        }
    }

    /// Handle for collaborator calls made from a task.
    pub fn backend(&self) -> Result<Arc<Backend>, FormError> {
        self.backend
            .clone()
            .ok_or_else(|| FormError::Precondition("Not connected to the backend".to_string()))
    }
}
