//! Response cache.
//!
//! Alerts responses are large and highly compressible, they are stored
//! gzipped. Everything else is small and stored as is. Both caches are
//! purged after every pull so clients never see data older than the last
//! collection.
//!
//! Every purge bumps a generation counter. Writers pass the generation they
//! read before computing a response, and a write from an older generation
//! is dropped, so a response built from pre-pull data can't outlive the
//! purge that followed it.

use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

const CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// LRU caches of serialized responses.
#[derive(Debug)]
pub struct ResponseCache {
    alerts: Mutex<LruCache<String, Vec<u8>>>,
    plain: Mutex<LruCache<String, Vec<u8>>>,
    generation: AtomicU64,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    /// Creates empty caches.
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(LruCache::new(CAPACITY)),
            plain: Mutex::new(LruCache::new(CAPACITY)),
            generation: AtomicU64::new(0),
        }
    }

    /// Current purge generation. Read it before computing a response that
    /// will be stored.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Decompressed alerts response for `key`.
    pub fn get_alerts(&self, key: &str) -> Option<Vec<u8>> {
        let compressed = self.alerts.lock().get(key).cloned()?;
        let mut body = Vec::new();
        match GzDecoder::new(compressed.as_slice()).read_to_end(&mut body) {
            Ok(_) => Some(body),
            Err(e) => {
                warn!(error = %e, "Failed to decompress cached response");
                self.alerts.lock().pop(key);
                None
            }
        }
    }

    /// Stores a compressed copy of an alerts response computed during
    /// `generation`.
    pub fn put_alerts(&self, key: String, generation: u64, body: &[u8]) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        let compressed = encoder.write_all(body).and_then(|()| encoder.finish());
        match compressed {
            Ok(compressed) => {
                let mut alerts = self.alerts.lock();
                if !self.is_current(generation) {
                    debug!(key = %key, "Dropped alerts response computed before the last purge");
                    return;
                }
                debug!(key = %key, raw = body.len(), compressed = compressed.len(), "Cached alerts response");
                alerts.put(key, compressed);
            }
            Err(e) => warn!(error = %e, "Failed to compress response"),
        }
    }

    /// Cached body for a request URI.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.plain.lock().get(key).cloned()
    }

    /// Stores a body for a request URI computed during `generation`.
    pub fn put(&self, key: String, generation: u64, body: Vec<u8>) {
        let mut plain = self.plain.lock();
        if self.is_current(generation) {
            plain.put(key, body);
        }
    }

    /// Drops every entry and starts a new generation.
    pub fn purge(&self) {
        let mut alerts = self.alerts.lock();
        let mut plain = self.plain.lock();
        alerts.clear();
        plain.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.alerts.lock().len() + self.plain.lock().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
