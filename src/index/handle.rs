use super::VectorIndex;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide slot holding the live index.
///
/// Readers take a cheap `Arc` snapshot and drop the lock immediately, so a replacement never
/// tears an in-flight question. Writers only ever swap in a fully built index.
#[derive(Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<VectorIndex>>>,
}

impl IndexHandle {
    /// Create an empty handle (no document indexed yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the live index, if any.
    pub async fn current(&self) -> Option<Arc<VectorIndex>> {
        self.current.read().await.clone()
    }

    /// Install `index` as the live index, returning the one it replaced.
    pub async fn replace(&self, index: VectorIndex) -> Option<Arc<VectorIndex>> {
        let next = Arc::new(index);
        self.current.write().await.replace(next)
    }

    /// Whether an index has been installed.
    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }
}
