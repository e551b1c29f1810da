//! Request-context access to the application cache.

use crate::file_store::FileCacheStore;
use std::sync::Arc;
use trellis_core::RequestContext;

/// Access to the cache attached to the kernel.
pub trait CacheExt {
    /// The shared [`FileCacheStore`], if the application registered one.
    fn cache(&self) -> Option<Arc<FileCacheStore>>;
}

impl CacheExt for RequestContext {
    fn cache(&self) -> Option<Arc<FileCacheStore>> {
        self.extension::<FileCacheStore>()
    }
}
