//! Cache storage for Trellis.
//!
//! [`CacheStore`] is the backend contract; [`FileCacheStore`] keeps one
//! JSON file per key under `cache.PATH`. The free functions in [`helpers`]
//! add typed access and `remember` on top of any store. Handlers reach a
//! store attached to the kernel through [`CacheExt::cache`].
//!
//! # Examples
//!
//! ```no_run
//! use trellis_cache::*;
//!
//! # async fn example() -> CacheResult<()> {
//! let store = FileCacheStore::new(CacheConfig::file("storage/cache")).await?;
//!
//! put(&store, "greeting", &"hello", Some(60)).await?;
//! let greeting: Option<String> = get(&store, "greeting").await?;
//!
//! let total: u64 = remember(&store, "stats:total", None, || async { Ok(42) }).await?;
//! # let _ = (greeting, total);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod file_store;
pub mod helpers;
pub mod traits;

pub use config::{CacheConfig, DEFAULT_CACHE_TTL};
pub use context::CacheExt;
pub use error::{CacheError, CacheResult};
pub use file_store::FileCacheStore;
pub use helpers::*;
pub use traits::CacheStore;
