//! # Suggest Cache
//!
//! Bounded, TTL-based memoization for suggestion and labeling results.
//!
//! - [`ResultCache`] evicts in insertion order and expires entries lazily on
//!   read; [`ResultCache::prune`] is available for periodic sweeps.
//! - [`generate_key`] builds the request fingerprint from the quote, the
//!   nearby context and a hash of the whole document.
//! - Time comes from a [`Clock`], so tests can drive expiry by hand.
//!
//! ```
//! use suggest_cache::{generate_key, CacheConfig, ResultCache};
//!
//! let mut cache = ResultCache::new(CacheConfig::default());
//! let key = generate_key("cowboy", "A ", " rides", "A cowboy rides");
//! cache.set(key.clone(), vec!["A rancher".to_string()]);
//! assert!(cache.has(&key));
//! ```

mod cache;
mod clock;
mod fingerprint;

pub use cache::{CacheConfig, CacheEntry, CacheStats, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::{document_hash, generate_key, Fingerprint, DEFAULT_KEY_CONTEXT_WINDOW};
