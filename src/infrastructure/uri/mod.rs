//! URI schemes the engine understands.

mod data_uri;
mod file_uri;
mod http_uri;

use std::sync::Arc;

use crate::domain::ports::UriModel;

pub use data_uri::DataUriModel;
pub use file_uri::FileUriModel;
pub use http_uri::HttpUriModel;

/// Ordered set of URI models; the first match wins.
#[derive(Debug, Clone)]
pub struct UriModelRegistry {
    models: Vec<Arc<dyn UriModel>>,
}

impl UriModelRegistry {
    /// Creates a registry with the built-in models.
    #[must_use]
    pub fn new() -> Self {
        Self {
            models: vec![
                Arc::new(HttpUriModel),
                Arc::new(FileUriModel),
                Arc::new(DataUriModel),
            ],
        }
    }

    /// Creates a registry without any model.
    #[must_use]
    pub const fn empty() -> Self {
        Self { models: Vec::new() }
    }

    /// Adds a model ahead of the existing ones.
    pub fn register(&mut self, model: Arc<dyn UriModel>) {
        self.models.insert(0, model);
    }

    /// Returns the model handling `uri`.
    #[must_use]
    pub fn find(&self, uri: &str) -> Option<Arc<dyn UriModel>> {
        self.models.iter().find(|model| model.matches(uri)).cloned()
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for UriModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
