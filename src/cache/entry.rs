//! Per-document cache entries and their read-only snapshots.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};

/// Rendering progress of a cached document.
///
/// The decoded handle exists only while some page is still unrendered.
/// Once the last slot fills, the entry moves to `Complete` and the handle
/// is dropped; there is no way back.
enum EntryState<D> {
    Partial {
        handle: Arc<D>,
        pages: Box<[Option<Bytes>]>,
    },
    Complete {
        pages: Box<[Bytes]>,
    },
}

/// What a page lookup found.
pub(crate) enum PageLookup<D> {
    /// The page is rendered
    Hit(Bytes),
    /// The page still needs rendering from this handle
    Miss { handle: Arc<D>, generation: u64 },
    /// The index is outside the document
    OutOfRange { page_count: usize },
}

/// Result of committing a rendered page.
pub(crate) struct StoredPage {
    /// Bytes now held in the slot. If the slot was already filled, these
    /// are the earlier bytes, not the ones just offered.
    pub data: Bytes,
    /// Whether this store released the document handle
    pub released: bool,
}

/// One cached document.
///
/// `generation` tells apart successive entries for the same id, so a render
/// started on a purged entry cannot land in its replacement.
pub struct DocumentEntry<D> {
    state: EntryState<D>,
    generation: u64,
    last_access: DateTime<Utc>,
}

impl<D> DocumentEntry<D> {
    /// Create an entry with every page slot empty.
    ///
    /// A document without pages has nothing left to render, so its handle
    /// is released immediately.
    pub fn new(handle: Arc<D>, page_count: usize, generation: u64, now: DateTime<Utc>) -> Self {
        let state = if page_count == 0 {
            EntryState::Complete {
                pages: Box::new([]),
            }
        } else {
            EntryState::Partial {
                handle,
                pages: vec![None; page_count].into_boxed_slice(),
            }
        };

        Self {
            state,
            generation,
            last_access: now,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page_count(&self) -> usize {
        match &self.state {
            EntryState::Partial { pages, .. } => pages.len(),
            EntryState::Complete { pages } => pages.len(),
        }
    }

    pub fn has_handle(&self) -> bool {
        matches!(self.state, EntryState::Partial { .. })
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }

    /// Record an access. Never moves the timestamp backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_access {
            self.last_access = now;
        }
    }

    /// Rendered bytes for `page`, if any.
    pub fn page(&self, page: usize) -> Option<&Bytes> {
        match &self.state {
            EntryState::Partial { pages, .. } => pages.get(page).and_then(Option::as_ref),
            EntryState::Complete { pages } => pages.get(page),
        }
    }

    /// Number of pages rendered so far.
    pub fn rendered_count(&self) -> usize {
        match &self.state {
            EntryState::Partial { pages, .. } => pages.iter().flatten().count(),
            EntryState::Complete { pages } => pages.len(),
        }
    }

    /// Total size of all rendered pages.
    pub fn rendered_bytes(&self) -> usize {
        match &self.state {
            EntryState::Partial { pages, .. } => pages.iter().flatten().map(Bytes::len).sum(),
            EntryState::Complete { pages } => pages.iter().map(Bytes::len).sum(),
        }
    }

    pub(crate) fn lookup(&self, page: i64) -> PageLookup<D> {
        let page_count = self.page_count();
        let index = match usize::try_from(page) {
            Ok(index) if index < page_count => index,
            _ => return PageLookup::OutOfRange { page_count },
        };

        match &self.state {
            EntryState::Partial { handle, pages } => match &pages[index] {
                Some(data) => PageLookup::Hit(data.clone()),
                None => PageLookup::Miss {
                    handle: Arc::clone(handle),
                    generation: self.generation,
                },
            },
            EntryState::Complete { pages } => PageLookup::Hit(pages[index].clone()),
        }
    }

    /// Fill slot `page` unless it is already filled, releasing the handle
    /// if this was the last empty slot.
    ///
    /// Returns `None` if `page` is outside this entry.
    pub(crate) fn store_page(&mut self, page: usize, data: Bytes) -> Option<StoredPage> {
        let pages = match &mut self.state {
            EntryState::Complete { pages } => {
                return pages.get(page).map(|existing| StoredPage {
                    data: existing.clone(),
                    released: false,
                });
            }
            EntryState::Partial { pages, .. } => pages,
        };

        let slot = pages.get_mut(page)?;
        let data = slot.get_or_insert(data).clone();

        let complete: Option<Vec<Bytes>> = pages.iter().cloned().collect();
        let released = match complete {
            Some(all) => {
                self.state = EntryState::Complete {
                    pages: all.into_boxed_slice(),
                };
                true
            }
            None => false,
        };

        Some(StoredPage { data, released })
    }

    /// Read-only view of this entry for diagnostics.
    pub fn snapshot(&self, id: &str) -> EntrySnapshot {
        let pages = match &self.state {
            EntryState::Partial { pages, .. } => pages
                .iter()
                .map(|slot| slot.as_ref().map(Bytes::len))
                .collect(),
            EntryState::Complete { pages } => pages.iter().map(|p| Some(p.len())).collect(),
        };

        EntrySnapshot {
            id: id.to_string(),
            handle_present: self.has_handle(),
            pages,
            last_access: self.last_access,
        }
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Diagnostic view of one cached document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub id: String,
    pub handle_present: bool,
    /// Encoded size of each rendered page, `None` where not yet rendered
    pub pages: Vec<Option<usize>>,
    pub last_access: DateTime<Utc>,
}

impl fmt::Display for EntrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" = ({}, [",
            self.id,
            if self.handle_present { "PDF" } else { "released" }
        )?;
        for (i, page) in self.pages.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match page {
                Some(len) => write!(f, "{}", len)?,
                None => f.write_str("_")?,
            }
        }
        write!(
            f,
            "], {})",
            self.last_access.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Diagnostic view of the whole cache, ordered by document id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugSnapshot {
    pub entries: Vec<EntrySnapshot>,
}

impl DebugSnapshot {
    pub fn get(&self, id: &str) -> Option<&EntrySnapshot> {
        self.entries.iter().find(|e| e.id == id)
    }
}

impl fmt::Display for DebugSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Aggregate counters over all entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub documents: usize,
    pub open_handles: usize,
    pub rendered_pages: usize,
    pub rendered_bytes: usize,
}
