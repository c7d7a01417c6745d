use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The largest integer a double precision float represents exactly, `2^53 - 1`.
/// Identifiers are reduced modulo this value so consumers storing them as
/// floating point numbers never lose precision.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// How many names an [`IdHasher`] remembers by default
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Raised when an identifier does not belong to any known dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No dataset is known under the id {0}")]
pub struct UnknownIdError(pub u64);

/// Compute the identifier of `name`.
///
/// The SHA-256 digest of the UTF-8 encoded name is read as a big-endian
/// integer and reduced modulo [`MAX_SAFE_INTEGER`]. The result is stable across
/// runs and platforms.
pub fn name_to_id(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    digest
        .iter()
        .fold(0u64, |acc, byte| ((acc << 8) | u64::from(*byte)) % MAX_SAFE_INTEGER)
}

/// Memoizes [`name_to_id`] in a bounded least-recently-used cache.
#[derive(Debug)]
pub struct IdHasher {
    cache: Mutex<LruCache<String, u64>>,
}

impl Default for IdHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl IdHasher {
    /// Create a hasher remembering up to `capacity` names. A capacity of zero is
    /// treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The identifier of `name`, identical to [`name_to_id`]
    pub fn id_of(&self, name: &str) -> u64 {
        let Ok(mut cache) = self.cache.lock() else {
            return name_to_id(name);
        };
        if let Some(id) = cache.get(name) {
            return *id;
        }
        let id = name_to_id(name);
        cache.put(name.to_string(), id);
        id
    }

    /// The number of names currently remembered
    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.cap().get())
            .unwrap_or_default()
    }
}
