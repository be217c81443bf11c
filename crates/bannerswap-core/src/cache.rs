//! Page render cache.
//!
//! Memoizes rasterized PDF pages per (document, page, scale). Entries expire
//! after a fixed time-to-live; expired entries are swept whenever a new entry
//! is inserted. There is no capacity bound.

use crate::layers::RasterSurface;
use crate::loader::DocumentId;
use std::collections::HashMap;
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Default time-to-live for cached pages.
pub const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(30 * 60);

/// Cache key for rendered pages.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct PageCacheKey {
    pub document_id: DocumentId,
    /// 1-based page number.
    pub page: u32,
    /// Scale * 100 as integer for hashing.
    pub scale: u32,
}

impl PageCacheKey {
    pub fn new(document_id: DocumentId, page: u32, scale: f32) -> Self {
        Self {
            document_id,
            page,
            scale: (scale * 100.0).round() as u32,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedPage {
    surface: RasterSurface,
    last_access: Instant,
}

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Time-bounded cache of rendered pages.
#[derive(Debug)]
pub struct PageRenderCache {
    entries: HashMap<PageCacheKey, CachedPage>,
    ttl: Duration,
    stats: CacheStats,
}

impl Default for PageRenderCache {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_TTL)
    }
}

impl PageRenderCache {
    /// Create a cache with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            stats: CacheStats::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Check if a key is cached (expired or not).
    pub fn contains(&self, key: &PageCacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Return the cached surface for `key`, rendering it on a miss.
    pub fn get_or_render<F, E>(&mut self, key: PageCacheKey, render: F) -> Result<RasterSurface, E>
    where
        F: FnOnce() -> Result<RasterSurface, E>,
    {
        self.get_or_render_at(Instant::now(), key, render)
    }

    /// Same as [`get_or_render`](Self::get_or_render) with an explicit clock.
    ///
    /// An entry older than the TTL counts as a miss even if no sweep has
    /// removed it yet. A failed render leaves the cache unchanged.
    pub fn get_or_render_at<F, E>(&mut self, now: Instant, key: PageCacheKey, render: F) -> Result<RasterSurface, E>
    where
        F: FnOnce() -> Result<RasterSurface, E>,
    {
        let ttl = self.ttl;
        if let Some(entry) = self.entries.get_mut(&key) {
            if now.saturating_duration_since(entry.last_access) <= ttl {
                entry.last_access = now;
                self.stats.hits += 1;
                log::debug!("Page cache hit: page {} @ {}%", key.page, key.scale);
                return Ok(entry.surface.clone());
            }
        }

        self.stats.misses += 1;
        log::debug!("Page cache miss: page {} @ {}%", key.page, key.scale);
        let surface = render()?;

        self.cleanup(now);
        self.entries.insert(
            key,
            CachedPage {
                surface: surface.clone(),
                last_access: now,
            },
        );
        Ok(surface)
    }

    /// Remove every entry whose last access is older than the TTL.
    /// Returns the number of evicted entries.
    pub fn cleanup(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_access) <= ttl);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            self.stats.evictions += evicted as u64;
            log::debug!("Page cache evicted {} expired entries", evicted);
        }
        evicted
    }

    /// Drop all entries belonging to a document. Returns the number removed.
    pub fn clear(&mut self, document_id: DocumentId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.document_id != document_id);
        let removed = before - self.entries.len();
        if removed > 0 {
            log::info!("Cleared {} cached pages for document {}", removed, document_id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;
    use uuid::Uuid;

    fn page(color: u8) -> RasterSurface {
        RasterSurface::filled(4, 4, [color, 0, 0, 255])
    }

    #[test]
    fn test_key_scale_rounding() {
        let doc = Uuid::new_v4();
        assert_eq!(PageCacheKey::new(doc, 1, 1.5).scale, 150);
        assert_eq!(PageCacheKey::new(doc, 1, 1.5), PageCacheKey::new(doc, 1, 1.5000001));
        assert_ne!(PageCacheKey::new(doc, 1, 1.5), PageCacheKey::new(doc, 1, 2.0));
        assert_ne!(PageCacheKey::new(doc, 1, 1.5), PageCacheKey::new(doc, 2, 1.5));
    }

    #[test]
    fn test_hit_within_ttl_does_not_render() {
        let mut cache = PageRenderCache::default();
        let key = PageCacheKey::new(Uuid::new_v4(), 1, 1.5);
        let renders = Cell::new(0);
        let render = || {
            renders.set(renders.get() + 1);
            Ok::<_, Infallible>(page(1))
        };

        let t0 = Instant::now();
        let first = cache.get_or_render_at(t0, key, render).unwrap();
        let second = cache
            .get_or_render_at(t0 + Duration::from_secs(29 * 60), key, render)
            .unwrap();

        assert_eq!(renders.get(), 1);
        assert!(first.ptr_eq(&second));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_hit_refreshes_timestamp() {
        let mut cache = PageRenderCache::default();
        let key = PageCacheKey::new(Uuid::new_v4(), 1, 1.5);
        let renders = Cell::new(0);
        let render = || {
            renders.set(renders.get() + 1);
            Ok::<_, Infallible>(page(1))
        };

        let t0 = Instant::now();
        cache.get_or_render_at(t0, key, render).unwrap();
        cache.get_or_render_at(t0 + Duration::from_secs(20 * 60), key, render).unwrap();
        // 40 minutes after first render but only 20 after the last access.
        cache.get_or_render_at(t0 + Duration::from_secs(40 * 60), key, render).unwrap();
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn test_expired_entry_is_rendered_again() {
        let mut cache = PageRenderCache::default();
        let key = PageCacheKey::new(Uuid::new_v4(), 1, 1.5);
        let renders = Cell::new(0);
        let render = || {
            renders.set(renders.get() + 1);
            Ok::<_, Infallible>(page(renders.get() as u8))
        };

        let t0 = Instant::now();
        let first = cache.get_or_render_at(t0, key, render).unwrap();
        let later = cache
            .get_or_render_at(t0 + Duration::from_secs(31 * 60), key, render)
            .unwrap();

        assert_eq!(renders.get(), 2);
        assert!(!first.ptr_eq(&later));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insertion_sweeps_expired_entries() {
        let mut cache = PageRenderCache::default();
        let doc = Uuid::new_v4();
        let t0 = Instant::now();
        for n in 1..=3 {
            cache
                .get_or_render_at(t0, PageCacheKey::new(doc, n, 1.5), || Ok::<_, Infallible>(page(0)))
                .unwrap();
        }
        assert_eq!(cache.len(), 3);

        let later = t0 + Duration::from_secs(31 * 60);
        cache
            .get_or_render_at(later, PageCacheKey::new(doc, 4, 1.5), || Ok::<_, Infallible>(page(0)))
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn test_failed_render_not_cached() {
        let mut cache = PageRenderCache::default();
        let key = PageCacheKey::new(Uuid::new_v4(), 1, 1.5);
        let result = cache.get_or_render(key, || Err::<RasterSurface, _>("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_only_touches_one_document() {
        let mut cache = PageRenderCache::default();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        for doc in [doc_a, doc_b] {
            for n in 1..=2 {
                cache
                    .get_or_render(PageCacheKey::new(doc, n, 1.5), || Ok::<_, Infallible>(page(0)))
                    .unwrap();
            }
        }

        assert_eq!(cache.clear(doc_a), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&PageCacheKey::new(doc_b, 1, 1.5)));
        assert!(!cache.contains(&PageCacheKey::new(doc_a, 1, 1.5)));
        assert_eq!(cache.clear(doc_a), 0);
    }
}
