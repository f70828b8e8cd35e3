use std::sync::Arc;

use eqviz_core::config::{Settings, UploadLimits};
use eqviz_core::repository::Repository;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(repository: Arc<dyn Repository>, settings: Settings) -> Self {
        Self {
            repository,
            settings: Arc::new(settings),
        }
    }

    pub fn repository(&self) -> &dyn Repository {
        self.repository.as_ref()
    }

    pub fn limits(&self) -> UploadLimits {
        self.settings.limits
    }
}
