//! Query response caching.
//!
//! The cache is a side channel: callers may always ask it, and it may always
//! decline. Backend failures are logged here and surface as a miss on read
//! or `false` on write, never as an error.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::response::QueryResponse;

/// Default entry lifetime.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(3600);

/// Connect, read and write timeout for Redis.
const REDIS_TIMEOUT: Duration = Duration::from_secs(2);

/// Key/value store for computed responses, keyed by the exact query.
pub trait QueryCache: Send + Sync {
    /// Fetch a live entry for `query`.
    fn get(&self, query: &str) -> Option<QueryResponse>;

    /// Store `response` under `query` for `expiry`. Returns whether it was stored.
    fn set(&self, query: &str, response: &QueryResponse, expiry: Duration) -> bool;
}

/// Errors raised inside cache backends. Never leave this module.
#[derive(Debug, Error)]
enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl QueryCache for NoopCache {
    fn get(&self, _query: &str) -> Option<QueryResponse> {
        debug!("Cache lookup skipped - cache disabled");
        None
    }

    fn set(&self, _query: &str, _response: &QueryResponse, _expiry: Duration) -> bool {
        debug!("Cache storage skipped - cache disabled");
        false
    }
}

struct MemoryEntry {
    response: QueryResponse,
    expires_at: Instant,
}

/// Process-wide in-memory cache with per-entry expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones not yet evicted included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        evict_expired(&mut entries, Instant::now())
    }

    fn lookup(&self, query: &str) -> Result<Option<QueryResponse>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
            match entries.get(query) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => {
                    return Ok(Some(entry.response.clone()))
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        if entries.get(query).map_or(false, |e| e.expires_at <= now) {
            debug!("Evicting expired entry for query: '{}'", query);
            entries.remove(query);
        }
        Ok(None)
    }

    fn store(
        &self,
        query: &str,
        response: &QueryResponse,
        expiry: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        evict_expired(&mut entries, now);
        entries.insert(
            query.to_string(),
            MemoryEntry {
                response: response.clone(),
                expires_at: now + expiry,
            },
        );
        Ok(())
    }
}

fn evict_expired(entries: &mut HashMap<String, MemoryEntry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.expires_at > now);
    before - entries.len()
}

impl QueryCache for MemoryCache {
    fn get(&self, query: &str) -> Option<QueryResponse> {
        match self.lookup(query) {
            Ok(Some(response)) => {
                info!("Cache HIT for query: '{}'", query);
                Some(response)
            }
            Ok(None) => {
                info!("Cache MISS for query: '{}'", query);
                None
            }
            Err(e) => {
                error!("Error during cache lookup: {}", e);
                None
            }
        }
    }

    fn set(&self, query: &str, response: &QueryResponse, expiry: Duration) -> bool {
        match self.store(query, response, expiry) {
            Ok(()) => {
                info!(
                    "Cached result for query: '{}' (expiry {}s)",
                    query,
                    expiry.as_secs()
                );
                true
            }
            Err(e) => {
                error!("Error storing result in cache: {}", e);
                false
            }
        }
    }
}

/// On-disk entry. The query is kept to guard against hash collisions.
#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    query: String,
    /// Unix seconds after which the entry is stale.
    expires_at: u64,
    response: QueryResponse,
}

/// Cache persisted as one JSON file per query, surviving restarts.
pub struct DiskCache {
    cache_dir: PathBuf,
}

impl DiskCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// File stem for `query`: URL-safe base64 of SHA-256 over `query:<query>`.
    pub fn cache_key(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"query:");
        hasher.update(query.as_bytes());
        let result = hasher.finalize();
        base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, result)
    }

    fn entry_path(&self, query: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", Self::cache_key(query)))
    }

    fn lookup(&self, query: &str) -> Result<Option<QueryResponse>, CacheError> {
        let path = self.entry_path(query);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let entry: DiskEntry = serde_json::from_str(&content)?;

        if entry.query != query {
            debug!("Cache key collision for query: '{}'", query);
            return Ok(None);
        }
        if entry.expires_at <= unix_now() {
            debug!("Cache entry expired for query: '{}'", query);
            return Ok(None);
        }

        Ok(Some(entry.response))
    }

    fn store(
        &self,
        query: &str,
        response: &QueryResponse,
        expiry: Duration,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir)?;
        let entry = DiskEntry {
            query: query.to_string(),
            expires_at: unix_now().saturating_add(expiry.as_secs()),
            response: response.clone(),
        };
        let content = serde_json::to_string_pretty(&entry)?;
        fs::write(self.entry_path(query), content)?;
        Ok(())
    }

    /// Remove every cached entry. Returns the number of files deleted.
    pub fn clear(&self) -> std::io::Result<usize> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                fs::remove_file(path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl QueryCache for DiskCache {
    fn get(&self, query: &str) -> Option<QueryResponse> {
        match self.lookup(query) {
            Ok(Some(response)) => {
                info!("Cache HIT for query: '{}'", query);
                Some(response)
            }
            Ok(None) => {
                info!("Cache MISS for query: '{}'", query);
                None
            }
            Err(e) => {
                error!("Error during cache lookup: {}", e);
                None
            }
        }
    }

    fn set(&self, query: &str, response: &QueryResponse, expiry: Duration) -> bool {
        match self.store(query, response, expiry) {
            Ok(()) => {
                info!(
                    "Cached result for query: '{}' (expiry {}s)",
                    query,
                    expiry.as_secs()
                );
                true
            }
            Err(e) => {
                error!("Error storing result in cache: {}", e);
                false
            }
        }
    }
}

/// Cache on a Redis server. Entries live under `query:<query>` and expire
/// server-side.
pub struct RedisCache {
    client: redis::Client,
    /// Dropped after an IO failure and reopened on the next call.
    connection: Mutex<Option<redis::Connection>>,
}

impl RedisCache {
    /// Connect and `PING`. Fails when the server cannot be reached.
    pub fn connect(host: &str, port: u16) -> Result<Self, redis::RedisError> {
        debug!("Redis configuration: host={}, port={}", host, port);
        let client = redis::Client::open(format!("redis://{}:{}/", host, port))?;

        let started = Instant::now();
        let mut connection = open_connection(&client)?;
        redis::cmd("PING").query::<String>(&mut connection)?;
        info!(
            "Redis connection successful (took {:.4}s)",
            started.elapsed().as_secs_f64()
        );

        Ok(Self {
            client,
            connection: Mutex::new(Some(connection)),
        })
    }

    pub fn cache_key(query: &str) -> String {
        format!("query:{}", query)
    }

    fn with_connection<T>(
        &self,
        command: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> Result<T, CacheError> {
        let mut slot = self.connection.lock().map_err(|_| CacheError::Poisoned)?;
        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => {
                debug!("Reconnecting to Redis");
                open_connection(&self.client)?
            }
        };

        let result = command(&mut connection);
        match &result {
            Err(e) if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() => {
                debug!("Dropping Redis connection after: {}", e);
            }
            _ => *slot = Some(connection),
        }
        Ok(result?)
    }

    fn lookup(&self, query: &str) -> Result<Option<QueryResponse>, CacheError> {
        let key = Self::cache_key(query);
        debug!("Looking up cache key: {}", key);
        let cached: Option<String> =
            self.with_connection(|c| redis::cmd("GET").arg(&key).query(c))?;
        match cached {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// `SETEX` takes whole seconds and rejects zero, so sub-second expiries
    /// round up to one second.
    fn store(
        &self,
        query: &str,
        response: &QueryResponse,
        expiry: Duration,
    ) -> Result<(), CacheError> {
        let key = Self::cache_key(query);
        let data = serde_json::to_string(response)?;
        let seconds = expiry.as_secs().max(1);
        debug!("Storing result in cache with key: {}, expiry: {}s", key, seconds);
        self.with_connection(|c| {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(seconds)
                .arg(&data)
                .query::<()>(c)
        })
    }
}

fn open_connection(client: &redis::Client) -> redis::RedisResult<redis::Connection> {
    let connection = client.get_connection_with_timeout(REDIS_TIMEOUT)?;
    connection.set_read_timeout(Some(REDIS_TIMEOUT))?;
    connection.set_write_timeout(Some(REDIS_TIMEOUT))?;
    Ok(connection)
}

impl QueryCache for RedisCache {
    fn get(&self, query: &str) -> Option<QueryResponse> {
        match self.lookup(query) {
            Ok(Some(response)) => {
                info!("Cache HIT for query: '{}'", query);
                Some(response)
            }
            Ok(None) => {
                info!("Cache MISS for query: '{}'", query);
                None
            }
            Err(e) => {
                error!("Error during cache lookup: {}", e);
                None
            }
        }
    }

    fn set(&self, query: &str, response: &QueryResponse, expiry: Duration) -> bool {
        match self.store(query, response, expiry) {
            Ok(()) => {
                info!(
                    "Cached result for query: '{}' (expiry {}s)",
                    query,
                    expiry.as_secs()
                );
                true
            }
            Err(e) => {
                error!("Error storing result in cache: {}", e);
                false
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParsedRecord;
    use tempfile::tempdir;

    fn response(query: &str) -> QueryResponse {
        QueryResponse {
            generation_time: 0.5,
            parsed_query: ParsedRecord::new(Some("chair"), Some("wooden"), Some("blue")),
            query: query.to_string(),
            cached: false,
            total_time: 0.51,
            cache_lookup_time: Some(0.0001),
        }
    }

    #[test]
    fn test_noop_cache_declines() {
        let cache = NoopCache;
        assert!(!cache.set("chair", &response("chair"), DEFAULT_EXPIRY));
        assert!(cache.get("chair").is_none());
    }

    #[test]
    fn test_memory_cache_hit() {
        let cache = MemoryCache::new();
        assert!(cache.get("blue chair").is_none());
        assert!(cache.set("blue chair", &response("blue chair"), DEFAULT_EXPIRY));
        assert_eq!(cache.get("blue chair"), Some(response("blue chair")));
    }

    #[test]
    fn test_memory_cache_key_is_exact() {
        let cache = MemoryCache::new();
        cache.set("blue chair", &response("blue chair"), DEFAULT_EXPIRY);
        assert!(cache.get("Blue chair").is_none());
        assert!(cache.get("blue  chair").is_none());
        assert!(cache.get("blue chair!").is_none());
    }

    #[test]
    fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.set("sofa", &response("sofa"), Duration::ZERO);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("sofa").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_memory_cache_purge() {
        let cache = MemoryCache::new();
        cache.set("sofa", &response("sofa"), DEFAULT_EXPIRY);
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_memory_cache_stays_bounded() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            let query = format!("chair {}", i);
            cache.set(&query, &response(&query), Duration::ZERO);
            assert!(cache.get(&query).is_none());
        }
        assert!(cache.is_empty());

        for i in 0..1000 {
            let query = format!("table {}", i);
            cache.set(&query, &response(&query), Duration::ZERO);
        }
        assert!(cache.len() <= 1);

        cache.set("lamp", &response("lamp"), DEFAULT_EXPIRY);
        assert_eq!(cache.get("lamp"), Some(response("lamp")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_memory_cache_overwrite() {
        let cache = MemoryCache::new();
        cache.set("sofa", &response("sofa"), Duration::ZERO);
        let mut fresh = response("sofa");
        fresh.generation_time = 1.25;
        cache.set("sofa", &fresh, DEFAULT_EXPIRY);
        assert_eq!(cache.get("sofa").unwrap().generation_time, 1.25);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_disk_cache_key_deterministic() {
        assert_eq!(DiskCache::cache_key("red sofa"), DiskCache::cache_key("red sofa"));
        assert_ne!(DiskCache::cache_key("red sofa"), DiskCache::cache_key("Red sofa"));
    }

    #[test]
    fn test_disk_cache_persists_across_instances() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        assert!(cache.set("oak desk", &response("oak desk"), DEFAULT_EXPIRY));

        let reopened = DiskCache::new(dir.path());
        assert_eq!(reopened.get("oak desk"), Some(response("oak desk")));
    }

    #[test]
    fn test_disk_cache_expired_entry_is_miss() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache.set("oak desk", &response("oak desk"), Duration::ZERO);
        assert!(cache.get("oak desk").is_none());
    }

    #[test]
    fn test_disk_cache_corrupt_file_is_miss() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let path = dir.path().join(format!("{}.json", DiskCache::cache_key("bed")));
        fs::write(path, "not json").unwrap();
        assert!(cache.get("bed").is_none());
    }

    #[test]
    fn test_disk_cache_unwritable_dir_declines() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, "x").unwrap();
        // A regular file where the directory should be.
        let cache = DiskCache::new(&file);
        assert!(!cache.set("bed", &response("bed"), DEFAULT_EXPIRY));
        assert!(cache.get("bed").is_none());
    }

    #[test]
    fn test_redis_cache_key() {
        assert_eq!(RedisCache::cache_key("blue chair"), "query:blue chair");
        assert_ne!(RedisCache::cache_key("Blue chair"), RedisCache::cache_key("blue chair"));
    }

    #[test]
    fn test_redis_connect_refused() {
        // Nothing listens on port 1.
        assert!(RedisCache::connect("127.0.0.1", 1).is_err());
    }

    #[test]
    fn test_disk_cache_clear() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache.set("a", &response("a"), DEFAULT_EXPIRY);
        cache.set("b", &response("b"), DEFAULT_EXPIRY);
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.get("a").is_none());
    }
}
