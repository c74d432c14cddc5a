use std::sync::Arc;

use page_extractor::{ArtifactStore, Extractor};

/// Shared, immutable handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
    pub store: Arc<ArtifactStore>,
}

impl AppState {
    pub fn new(extractor: Extractor, store: ArtifactStore) -> Self {
        AppState {
            extractor: Arc::new(extractor),
            store: Arc::new(store),
        }
    }
}
