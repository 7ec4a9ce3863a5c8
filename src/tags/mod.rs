//! Audio tag extraction.
//!
//! Uses the lofty crate for format-independent tag access. Only the
//! fields the preview page needs are read: artist, title, album and
//! release date. Missing fields come back as empty strings, except the
//! title, which falls back to the filename stem so every file has a
//! displayable name.

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};
use std::path::Path;

use crate::error::{Result, from_lofty};

/// Descriptive fields extracted from a file's embedded metadata.
///
/// Immutable once constructed for an extraction pass; a later pass
/// produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub date: String,
}

/// Read tags from an audio file.
///
/// # Errors
///
/// Returns [`crate::error::Error::Unsupported`] when the container format
/// has no extraction path, or a tag error when the file can't be parsed.
pub fn read(path: &Path) -> Result<Tags> {
    let tagged_file = Probe::open(path)
        .map_err(|e| from_lofty(path, e))?
        .read()
        .map_err(|e| from_lofty(path, e))?;

    // Primary tag for the format, or whatever tag is present
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let artist = tag
        .and_then(|t| t.artist().map(|s| s.to_string()))
        .unwrap_or_default();

    let album = tag
        .and_then(|t| t.album().map(|s| s.to_string()))
        .unwrap_or_default();

    let date = tag
        .and_then(|t| {
            t.get_string(&ItemKey::RecordingDate)
                .map(|s| s.to_string())
                .or_else(|| t.year().map(|y| y.to_string()))
        })
        .unwrap_or_default();

    let title = tag
        .and_then(|t| t.title().map(|s| s.to_string()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| title_fallback(path));

    Ok(Tags {
        artist,
        title,
        album,
        date,
    })
}

/// Filename stem used when a file carries no title tag.
pub fn title_fallback(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
