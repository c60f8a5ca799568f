//! Response caching
//!
//! [`ResponseCache`] stores successful responses with a per-entry TTL and
//! [`cache_key`] derives the identity they are stored under.
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//!
//! use courier_common::cache::{cache_key, CacheConfig, ResponseCache};
//!
//! let cache: ResponseCache<serde_json::Value> = ResponseCache::new(CacheConfig::default());
//! let key = cache_key("GET", "https://api.example.com/users", None, &BTreeMap::new());
//!
//! cache.set(key.clone(), serde_json::json!([1, 2, 3]), Duration::from_secs(30));
//! assert!(cache.has(&key));
//! ```

pub mod config;
pub mod core;
pub mod key;
pub mod stats;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use self::core::{CacheEntry, ResponseCache};
pub use key::cache_key;
pub use stats::CacheStats;
