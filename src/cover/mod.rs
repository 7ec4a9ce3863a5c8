//! Cover art discovery, processing and storage.
//!
//! Source discovery is local-only and checked in priority order:
//!
//! 1. **Embedded tags** - picture data inside the audio file
//! 2. **Sibling files** - the first image file in the same directory
//!
//! Discovered images are handed to [`CoverStore`], which deduplicates
//! them by decoded-pixel hash and stores a bounded-size JPEG rendition
//! in a content-addressed directory.

mod embedded;
mod sidecar;
mod store;

pub use store::{COVER_SIZE, CoverAsset, CoverStore};

use std::path::{Path, PathBuf};

use crate::error::Result;

/// A discovered cover image, not yet resized or stored.
#[derive(Debug)]
pub struct SourceImage {
    /// Decoded pixels
    pub image: image::DynamicImage,
    /// Path of the sibling file it came from; `None` for embedded art.
    ///
    /// The resolver uses this to read the source's own modification time
    /// for freshness comparisons (embedded art shares the audio file's).
    pub origin: Option<PathBuf>,
}

/// Find a cover image for an audio file.
///
/// With `prefer_embedded`, picture data inside the file's tags is tried
/// first; sibling image files are the fallback either way. Returns
/// `Ok(None)` when no usable image exists.
///
/// # Errors
///
/// Propagates [`crate::error::Error::Unsupported`] from the embedded
/// lookup when the tag container can't be parsed at all. A sibling file
/// that fails to decode is logged and skipped, not an error.
pub fn locate_source_image(audio_path: &Path, prefer_embedded: bool) -> Result<Option<SourceImage>> {
    if prefer_embedded
        && let Some(image) = embedded::extract_embedded_image(audio_path)?
    {
        return Ok(Some(SourceImage {
            image,
            origin: None,
        }));
    }

    if let Some(path) = sidecar::find_sibling_image(audio_path) {
        match image::open(&path) {
            Ok(image) => {
                return Ok(Some(SourceImage {
                    image,
                    origin: Some(path),
                }));
            }
            Err(e) => {
                tracing::warn!(target: "cover", path = %path.display(), error = %e, "sibling image failed to decode");
            }
        }
    }

    Ok(None)
}
