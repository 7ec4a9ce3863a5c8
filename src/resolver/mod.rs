//! Metadata resolution: the read-through, freshness-aware pipeline that
//! turns a relative path into tags and a cover reference.
//!
//! Each request gets a *result cell* - a lock-guarded state slot shared
//! between the awaiting caller and the worker executing the pass. The
//! worker publishes every state transition into the cell as it happens:
//! placeholder, cache-loaded tags, restored cover, refreshed cover,
//! freshly extracted tags. The caller waits for completion up to its
//! deadline and then takes whatever the cell holds at that instant.
//!
//! A deadline expiry stops the *waiting*, never the *working*: the pass
//! keeps running in the background and its cache write still benefits
//! the next request for the same path. Duplicate concurrent passes for
//! one path are tolerated - both produce equivalent wholesale writes.
//!
//! Freshness rules (deliberately asymmetric):
//! - The cache's write timestamp is trusted only when the pass restored
//!   a complete state from it; an incomplete entry counts as stale.
//! - Tag extraction is skipped whenever the cache is valid.
//! - Cover refresh has its own gate: a discovered image whose own
//!   timestamp is at or after the cache write goes through the processor
//!   even when the tag cache is otherwise valid.

mod pool;

pub use pool::WorkerPool;

use parking_lot::Mutex;
use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cover::{self, CoverAsset, CoverStore};
use crate::db::{self, CachedRecord};
use crate::error::Result;
use crate::tags::{self, Tags};

/// Latest known state of one in-flight resolution.
///
/// The only entity mutated in place after creation; everything else in
/// the pipeline is replace-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionState {
    /// Relative path being resolved
    pub path: String,
    /// Stored cover asset filename (starts as the default cover)
    pub cover_filename: String,
    pub cover_width: u32,
    pub cover_height: u32,
    pub tags: Tags,
    /// True only after a successful tag pass; a cover alone is not
    /// completeness
    pub is_complete: bool,
}

impl ResolutionState {
    /// Initial state, visible to the caller before any work starts.
    fn placeholder(path: &str, default_cover: &CoverAsset) -> Self {
        Self {
            path: path.to_string(),
            cover_filename: default_cover.filename.clone(),
            cover_width: default_cover.width,
            cover_height: default_cover.height,
            tags: Tags {
                title: tags::title_fallback(Path::new(path)),
                ..Tags::default()
            },
            is_complete: false,
        }
    }
}

/// Shared state slot readable by the waiter while the worker writes.
type ResultCell = Arc<Mutex<ResolutionState>>;

struct Shared {
    music_dir: PathBuf,
    covers: CoverStore,
    cache: SqlitePool,
    default_cover: CoverAsset,
    /// Workers are plain threads; store calls hop back onto the runtime
    runtime: tokio::runtime::Handle,
}

/// Orchestrates resolution passes over a fixed worker pool.
pub struct Resolver {
    pool: WorkerPool,
    shared: Arc<Shared>,
}

impl Resolver {
    /// Build the resolver and precompute the process-wide default cover.
    ///
    /// Must be called from within the tokio runtime that will await
    /// resolutions.
    pub fn new(
        music_dir: impl Into<PathBuf>,
        covers: CoverStore,
        cache: SqlitePool,
        default_cover_path: Option<&Path>,
        workers: usize,
    ) -> Result<Self> {
        let default_cover = covers.default_cover(default_cover_path)?;
        info!(target: "resolver", cover = %default_cover.filename, "default cover prepared");

        Ok(Self {
            pool: WorkerPool::new(workers)?,
            shared: Arc::new(Shared {
                music_dir: music_dir.into(),
                covers,
                cache,
                default_cover,
                runtime: tokio::runtime::Handle::current(),
            }),
        })
    }

    /// The placeholder cover asset.
    pub fn default_cover(&self) -> &CoverAsset {
        &self.shared.default_cover
    }

    /// Resolve metadata for a path, bounded by `deadline`.
    ///
    /// Always returns a state: the fully resolved one when the worker
    /// finishes in time, otherwise whatever was last published - which
    /// may be the placeholder. The worker is never cancelled.
    pub async fn resolve(
        &self,
        relative_path: &str,
        request_id: &str,
        deadline: Duration,
    ) -> ResolutionState {
        let cell: ResultCell = Arc::new(Mutex::new(ResolutionState::placeholder(
            relative_path,
            &self.shared.default_cover,
        )));

        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let worker_cell = Arc::clone(&cell);
        let id = request_id.to_string();
        self.pool.submit(move || {
            if let Err(e) = resolve_on_worker(&shared, &worker_cell, &id) {
                warn!(target: "resolver", request_id = %id, error = %e, "resolution pass aborted");
            }
            let _ = done_tx.send(());
        });

        if tokio::time::timeout(deadline, done_rx).await.is_err() {
            info!(target: "resolver", request_id, ?deadline, "deadline reached while resolving metadata");
        }

        let state = cell.lock().clone();
        state
    }
}

/// One resolution pass, executed on a pool thread.
///
/// Every mutation of the cell is immediately visible to the waiter; the
/// order of publishes below is the contract.
fn resolve_on_worker(shared: &Shared, cell: &ResultCell, request_id: &str) -> Result<()> {
    let relative_path = cell.lock().path.clone();
    let local_path = shared.music_dir.join(&relative_path);

    // Stale cache data beats no data: publish it before any fresh work
    let cached = match shared
        .runtime
        .block_on(db::get_record(&shared.cache, &relative_path))
    {
        Ok(record) => record,
        Err(e) => {
            warn!(target: "resolver", request_id, error = %e, "cache read failed");
            None
        }
    };

    let mut cover_restored = false;
    if let Some(record) = &cached {
        info!(target: "resolver", request_id, "loading metadata from cache");
        cell.lock().tags = record.tags.clone();

        if !record.cover_filename.is_empty() {
            match shared.covers.read_dimensions(&record.cover_filename) {
                Ok((width, height)) => {
                    let mut state = cell.lock();
                    state.cover_filename = record.cover_filename.clone();
                    state.cover_width = width;
                    state.cover_height = height;
                    state.is_complete = true;
                    cover_restored = true;
                }
                Err(e) if e.is_not_found() => {
                    warn!(target: "resolver", request_id, "cached cover missing");
                }
                Err(e) => {
                    error!(target: "resolver", request_id, error = %e, "error reading cached cover");
                }
            }
        }
    }

    let file_mtime = mtime_secs(&std::fs::metadata(&local_path)?);

    // An incomplete cache entry is never trusted for freshness
    let cache_mtime = match &cached {
        Some(record) if cover_restored => record.mtime.unwrap_or(0),
        _ => 0,
    };
    let cache_is_valid = cached.is_some() && cache_mtime > file_mtime;

    // Embedded pictures are only read when the cache can't be trusted
    // (tag parsing costs the most); sibling files are checked either way
    if let Some(source) = cover::locate_source_image(&local_path, !cache_is_valid)? {
        let source_mtime = source
            .origin
            .as_deref()
            .map(|p| std::fs::metadata(p).map(|m| mtime_secs(&m)).unwrap_or(0))
            .unwrap_or(0);

        if source_mtime >= cache_mtime {
            let origin = source
                .origin
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<tags>".to_string());
            info!(target: "resolver", request_id, source = %origin, "updating cover art");

            let asset = shared.covers.resize_and_store(&source.image)?;
            {
                let mut state = cell.lock();
                state.cover_filename = asset.filename;
                state.cover_width = asset.width;
                state.cover_height = asset.height;
            }
            persist(shared, cell, request_id);
        }
    }

    if cache_is_valid {
        // Cache is newer than the file, nothing left to do
        return Ok(());
    }

    info!(target: "resolver", request_id, "reading file tags");
    let tags = tags::read(&local_path)?;
    {
        let mut state = cell.lock();
        state.tags = tags;
        state.is_complete = true;
    }
    persist(shared, cell, request_id);

    Ok(())
}

/// Write the cell's current state to the cache, wholesale.
///
/// The synthetic default cover is never persisted; its slot is stored as
/// the empty string. Failures are logged - persistence is best-effort
/// from the caller's point of view.
fn persist(shared: &Shared, cell: &ResultCell, request_id: &str) {
    let record = {
        let state = cell.lock();
        CachedRecord {
            path: state.path.clone(),
            mtime: None,
            cover_filename: if state.cover_filename == shared.default_cover.filename {
                String::new()
            } else {
                state.cover_filename.clone()
            },
            tags: state.tags.clone(),
        }
    };

    if let Err(e) = shared
        .runtime
        .block_on(db::put_record(&shared.cache, &record))
    {
        warn!(target: "resolver", request_id, error = %e, "cache write failed");
    }
}

fn mtime_secs(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
