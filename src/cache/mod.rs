//! Page render cache.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          RenderCache                            │
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐   │
//! │  │    entry     │  │    flight    │  │        clock         │   │
//! │  │ (per-doc     │  │ (one fetch / │  │ (last access and     │   │
//! │  │  page slots) │  │  render each)│  │  staleness)          │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//!              │                                 │
//!              ▼                                 ▼
//!      DocumentFetcher                    PageRasterizer
//! ```

mod clock;
mod entry;
mod flight;
mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheStats, DebugSnapshot, DocumentEntry, EntrySnapshot};
pub use flight::SingleFlight;
pub use service::{
    PageImage, RenderCache, RenderCacheConfig, DEFAULT_RENDER_TIMEOUT, DEFAULT_STALE_AFTER,
};
