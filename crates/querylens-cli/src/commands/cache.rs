//! Cache management commands.

use querylens_core::{local_ai_paths, CacheBackend, DiskCache, EngineConfig};

/// Remove every entry from the disk cache.
pub(crate) fn clear() -> miette::Result<()> {
    let dir = match EngineConfig::from_env().cache {
        CacheBackend::Disk(dir) => dir,
        _ => local_ai_paths::cache_dir()
            .map_err(|e| miette::miette!("Failed to locate cache directory: {}", e))?,
    };

    let cache = DiskCache::new(dir);
    let removed = cache
        .clear()
        .map_err(|e| miette::miette!("Failed to clear cache: {}", e))?;

    println!(
        "Removed {} cached {} from {}",
        removed,
        if removed == 1 { "entry" } else { "entries" },
        cache.cache_dir().display()
    );

    Ok(())
}
