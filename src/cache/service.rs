//! The render cache.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           RenderCache                            │
//! │                                                                  │
//! │  resolve_page(id, page)                                          │
//! │   1. look up entry ──miss──▶ fetch + decode (single-flight/id)   │
//! │   2. range check                                                 │
//! │   3. slot filled? ──yes──▶ return bytes                          │
//! │   4. render + encode (single-flight/id+page)                     │
//! │   5. commit slot if the entry is still the one rendered from,    │
//! │      release handle when all slots are filled                    │
//! │                                                                  │
//! │  entries: Mutex<HashMap<id, DocumentEntry>>                      │
//! │  (held only for lookups and commits, never across I/O)           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{CacheStats, DebugSnapshot, DocumentEntry, PageLookup};
use super::flight::SingleFlight;
use crate::error::{CacheError, RasterError};
use crate::fetch::DocumentFetcher;
use crate::render::{
    PageRasterizer, PngCompression, PngPageEncoder, RenderSize, PAGE_CONTENT_TYPE,
};

/// Inactivity after which an entry may be swept (24 hours).
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a single decode or render call.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Configuration
// =============================================================================

/// Tunables for [`RenderCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCacheConfig {
    /// Output size of every rendered page
    pub render_size: RenderSize,

    /// Entries idle for longer than this are removed on the next sweep
    pub stale_after: Duration,

    /// Limit for each blocking decode or render call
    pub render_timeout: Duration,

    /// PNG compression level for rendered pages
    pub png_compression: PngCompression,
}

impl Default for RenderCacheConfig {
    fn default() -> Self {
        Self {
            render_size: RenderSize::default(),
            stale_after: DEFAULT_STALE_AFTER,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            png_compression: PngCompression::default(),
        }
    }
}

impl RenderCacheConfig {
    pub fn with_render_size(mut self, render_size: RenderSize) -> Self {
        self.render_size = render_size;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_render_timeout(mut self, render_timeout: Duration) -> Self {
        self.render_timeout = render_timeout;
        self
    }

    pub fn with_png_compression(mut self, png_compression: PngCompression) -> Self {
        self.png_compression = png_compression;
        self
    }
}

// =============================================================================
// Responses
// =============================================================================

/// A rendered page handed back to the caller.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Encoded image bytes (shared with the cache, not copied)
    pub data: Bytes,

    /// MIME type of `data`
    pub content_type: &'static str,

    /// Whether the page was already rendered before this request
    pub cache_hit: bool,
}

/// Why a blocking rasterizer call did not produce a value.
enum BlockingFailure {
    Raster(RasterError),
    TimedOut(Duration),
    Aborted(String),
}

impl fmt::Display for BlockingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockingFailure::Raster(e) => write!(f, "{}", e),
            BlockingFailure::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            BlockingFailure::Aborted(reason) => write!(f, "rasterizer task failed: {}", reason),
        }
    }
}

// =============================================================================
// Render Cache
// =============================================================================

/// Lazy per-page render cache in front of a remote document source.
///
/// Each document is fetched and decoded once, on first reference. Each
/// page is rendered once, on first request, and its PNG kept until the
/// whole entry goes away. The decoded document is dropped as soon as its
/// last page has been rendered. Entries idle for longer than
/// [`RenderCacheConfig::stale_after`] are swept whenever a new document is
/// loaded.
///
/// # Type Parameters
///
/// * `F` - where document bytes come from
/// * `R` - how documents are decoded and pages rasterized
///
/// # Example
///
/// ```ignore
/// use manual_renderer::cache::{RenderCache, RenderCacheConfig};
/// use manual_renderer::fetch::{HttpDocumentFetcher, UrlTemplate};
/// use manual_renderer::render::MupdfRasterizer;
///
/// let fetcher = HttpDocumentFetcher::new(UrlTemplate::parse("https://host/PDF/{}.pdf")?)?;
/// let cache = RenderCache::new(fetcher, MupdfRasterizer::new(), RenderCacheConfig::default());
///
/// let pages = cache.resolve_page_count("Wires").await?;
/// let first = cache.resolve_page("Wires", 0).await?;
/// println!("{} pages, page 0 is {} bytes", pages, first.data.len());
/// ```
pub struct RenderCache<F, R>
where
    F: DocumentFetcher,
    R: PageRasterizer,
{
    fetcher: F,
    rasterizer: Arc<R>,
    encoder: PngPageEncoder,
    clock: Arc<dyn Clock>,
    config: RenderCacheConfig,
    stale_after: TimeDelta,

    entries: Mutex<HashMap<String, DocumentEntry<R::Document>>>,
    next_generation: AtomicU64,
    loads: SingleFlight<String, Result<(), CacheError>>,
    /// Keyed by (id, generation, page)
    renders: SingleFlight<(String, u64, usize), Result<PageImage, CacheError>>,
}

impl<F, R> RenderCache<F, R>
where
    F: DocumentFetcher,
    R: PageRasterizer,
{
    /// Create a cache driven by the system clock.
    pub fn new(fetcher: F, rasterizer: R, config: RenderCacheConfig) -> Self {
        Self::with_clock(fetcher, rasterizer, config, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(
        fetcher: F,
        rasterizer: R,
        config: RenderCacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            rasterizer: Arc::new(rasterizer),
            encoder: PngPageEncoder::with_compression(config.png_compression),
            clock,
            stale_after: TimeDelta::from_std(config.stale_after).unwrap_or(TimeDelta::MAX),
            config,
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            loads: SingleFlight::new(),
            renders: SingleFlight::new(),
        }
    }

    pub fn config(&self) -> &RenderCacheConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Number of pages in document `id`, fetching it on first reference.
    ///
    /// # Errors
    ///
    /// `NotFound`, `FetchFailed` or `DecodeFailed` when the document has to
    /// be loaded and that fails. Nothing is cached in that case.
    pub async fn resolve_page_count(&self, id: &str) -> Result<usize, CacheError> {
        self.with_entry(id, |entry, now| {
            entry.touch(now);
            entry.page_count()
        })
        .await
    }

    /// Page `page` (zero-based) of document `id` as PNG.
    ///
    /// The range check happens only once the page count is known, so an
    /// out-of-range request for an unseen document still loads it.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if `page` is negative or not below the page count;
    ///   the entry is left untouched
    /// - `NotFound`, `FetchFailed`, `DecodeFailed` from loading
    /// - `RenderFailed` if rasterizing or encoding fails; nothing is stored
    pub async fn resolve_page(&self, id: &str, page: i64) -> Result<PageImage, CacheError> {
        let lookup = self
            .with_entry(id, |entry, now| {
                let lookup = entry.lookup(page);
                if matches!(lookup, PageLookup::Hit(_)) {
                    entry.touch(now);
                }
                lookup
            })
            .await?;

        let (index, handle, generation) = match lookup {
            PageLookup::OutOfRange { page_count } => {
                return Err(CacheError::OutOfRange {
                    id: id.to_string(),
                    page,
                    page_count,
                });
            }
            PageLookup::Hit(data) => {
                debug!(id = id, page = page, bytes = data.len(), "Page cache hit");
                return Ok(PageImage {
                    data,
                    content_type: PAGE_CONTENT_TYPE,
                    cache_hit: true,
                });
            }
            // lookup() only reports a miss for an in-range, non-negative index
            PageLookup::Miss { handle, generation } => (page as usize, handle, generation),
        };

        let (image, led) = self
            .renders
            .run((id.to_string(), generation, index), || {
                self.render_and_commit(id, index, generation, handle)
            })
            .await;
        if !led {
            debug!(id = id, page = index, "Joined in-flight render");
        }

        image
    }

    /// Drop every entry. Returns how many were removed.
    pub async fn purge_all(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let removed = entries.len();
        entries.clear();
        info!(removed = removed, "Purged render cache");
        removed
    }

    /// Snapshot of every entry, sorted by id. Does not count as an access.
    pub async fn dump_debug_state(&self) -> DebugSnapshot {
        let entries = self.entries.lock().await;
        let mut snapshots: Vec<_> = entries
            .iter()
            .map(|(id, entry)| entry.snapshot(id))
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));

        DebugSnapshot { entries: snapshots }
    }

    /// Aggregate counters over all entries.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        entries
            .values()
            .fold(CacheStats::default(), |mut stats, entry| {
                stats.documents += 1;
                stats.open_handles += usize::from(entry.has_handle());
                stats.rendered_pages += entry.rendered_count();
                stats.rendered_bytes += entry.rendered_bytes();
                stats
            })
    }

    /// Number of cached documents.
    pub async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Evaluate `view` on the entry for `id` under the map lock, loading
    /// the document first if it is not cached.
    ///
    /// `view` decides whether the access counts; new entries start out
    /// touched.
    async fn with_entry<T>(
        &self,
        id: &str,
        view: impl FnOnce(&mut DocumentEntry<R::Document>, DateTime<Utc>) -> T,
    ) -> Result<T, CacheError> {
        loop {
            {
                let now = self.clock.now();
                let mut entries = self.entries.lock().await;
                if let Some(entry) = entries.get_mut(id) {
                    return Ok(view(entry, now));
                }
            }

            // The entry can be purged again before we get back to it
            let (loaded, led) = self
                .loads
                .run(id.to_string(), || self.load_document(id))
                .await;
            loaded?;
            if !led {
                debug!(id = id, "Joined in-flight document load");
            }
        }
    }

    /// Fetch, decode and insert `id`, then sweep stale entries.
    ///
    /// Runs inside the load flight, so the entry is in the map before any
    /// waiter wakes up.
    async fn load_document(&self, id: &str) -> Result<(), CacheError> {
        if self.entries.lock().await.contains_key(id) {
            return Ok(());
        }

        info!(id = id, "Fetching document");
        let bytes = self.fetcher.fetch(id).await.map_err(|e| {
            warn!(id = id, error = %e, "Document fetch failed");
            CacheError::from_fetch(id, e)
        })?;
        let size = bytes.len();

        let rasterizer = Arc::clone(&self.rasterizer);
        let (document, page_count) = self
            .run_blocking(move || {
                let document = rasterizer.decode(bytes)?;
                let page_count = rasterizer.page_count(&document);
                Ok((document, page_count))
            })
            .await
            .map_err(|failure| {
                warn!(id = id, error = %failure, "Document decode failed");
                match failure {
                    BlockingFailure::Raster(e) => CacheError::from_decode(id, e),
                    other => CacheError::DecodeFailed {
                        id: id.to_string(),
                        message: other.to_string(),
                    },
                }
            })?;

        let now = self.clock.now();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock().await;
        entries.entry(id.to_string()).or_insert_with(|| {
            DocumentEntry::new(Arc::new(document), page_count, generation, now)
        });
        info!(id = id, bytes = size, pages = page_count, "Cached new document");

        self.sweep_stale(&mut entries, id, now);

        Ok(())
    }

    /// Render one page and store it, unless the slot was filled meanwhile.
    ///
    /// Runs inside the render flight, so the slot is filled before any
    /// waiter wakes up.
    async fn render_and_commit(
        &self,
        id: &str,
        page: usize,
        generation: u64,
        handle: Arc<R::Document>,
    ) -> Result<PageImage, CacheError> {
        {
            let now = self.clock.now();
            let mut entries = self.entries.lock().await;
            let current = entries
                .get_mut(id)
                .filter(|entry| entry.generation() == generation);
            if let Some(entry) = current {
                if let Some(data) = entry.page(page).cloned() {
                    entry.touch(now);
                    return Ok(PageImage {
                        data,
                        content_type: PAGE_CONTENT_TYPE,
                        cache_hit: true,
                    });
                }
            }
        }

        let rasterizer = Arc::clone(&self.rasterizer);
        let encoder = self.encoder.clone();
        let size = self.config.render_size;

        let rendered = self
            .run_blocking(move || {
                let bitmap = rasterizer.render(&handle, page, size)?;
                encoder.encode(&bitmap)
            })
            .await
            .map_err(|failure| {
                warn!(id = id, page = page, error = %failure, "Page render failed");
                match failure {
                    BlockingFailure::Raster(e) => CacheError::from_render(id, page, e),
                    other => CacheError::RenderFailed {
                        id: id.to_string(),
                        page,
                        message: other.to_string(),
                    },
                }
            })?;

        info!(id = id, page = page, bytes = rendered.len(), size = %size, "Rendered page");

        Ok(PageImage {
            data: self.commit_page(id, page, generation, rendered).await,
            content_type: PAGE_CONTENT_TYPE,
            cache_hit: false,
        })
    }

    /// Store a rendered page and bump the entry's last access.
    ///
    /// The entry may have been purged or replaced while rendering. Pages
    /// are only stored into the generation they were rendered from; the
    /// caller still gets the bytes either way.
    async fn commit_page(&self, id: &str, page: usize, generation: u64, rendered: Bytes) -> Bytes {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries
            .get_mut(id)
            .filter(|entry| entry.generation() == generation)
        else {
            debug!(
                id = id,
                page = page,
                generation = generation,
                "Entry purged or replaced before render committed"
            );
            return rendered;
        };

        let data = match entry.store_page(page, rendered.clone()) {
            Some(stored) => {
                if stored.released {
                    info!(
                        id = id,
                        pages = entry.page_count(),
                        "All pages rendered, released document handle"
                    );
                }
                stored.data
            }
            None => rendered,
        };
        entry.touch(now);

        data
    }

    /// Remove every entry other than `keep` idle for longer than the
    /// staleness threshold.
    fn sweep_stale(
        &self,
        entries: &mut HashMap<String, DocumentEntry<R::Document>>,
        keep: &str,
        now: DateTime<Utc>,
    ) {
        let before = entries.len();
        entries.retain(|id, entry| {
            id == keep || now.signed_duration_since(entry.last_access()) <= self.stale_after
        });

        let evicted = before - entries.len();
        if evicted > 0 {
            info!(evicted = evicted, "Evicted stale documents");
        }
    }

    /// Run a rasterizer call on the blocking pool, bounded by the render
    /// timeout.
    async fn run_blocking<T, W>(&self, work: W) -> Result<T, BlockingFailure>
    where
        W: FnOnce() -> Result<T, RasterError> + Send + 'static,
        T: Send + 'static,
    {
        let limit = self.config.render_timeout;
        match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
            Ok(Ok(result)) => result.map_err(BlockingFailure::Raster),
            Ok(Err(join_err)) => Err(BlockingFailure::Aborted(join_err.to_string())),
            Err(_) => Err(BlockingFailure::TimedOut(limit)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
