//! Quire cache system.
//!
//! A key-value [`CacheStore`] contract with four backends, and a
//! [`TagCache`] in front of it that groups keys under tags for bulk
//! invalidation.
//!
//! Backend failure policy: runtime get/set never propagate transient backend
//! errors; reads degrade to a miss, writes report `false`. Only
//! construction-time failures (missing directory, unreachable database) are
//! fatal.
//!
//! ## Configuration
//!
//! The backend is selected in `quire.toml`:
//!
//! ```toml
//! [cache]
//! backend = "file"      # file | memory | database | none
//! directory = "cache"
//! prefix = "quire:"
//! ttl_seconds = 3600    # 0 disables expiry
//! ```

mod db;
mod file;
mod store;
mod tags;

pub use db::DbCache;
pub use file::FileCache;
pub use store::{CacheStore, CacheStoreExt, MemoryCache, NullCache};
pub use tags::TagCache;
