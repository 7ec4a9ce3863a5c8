//! Extract cover art embedded in audio file tags.
//!
//! Uses lofty to read picture data from ID3v2 tags and Vorbis comments.
//! The front cover is preferred; any other picture is accepted as a
//! fallback.

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use std::path::Path;

use crate::error::{Result, from_lofty};

/// Decode the first usable picture embedded in the file's tags.
///
/// Returns `Ok(None)` when the file has no tag or no pictures, and when
/// the picture data itself fails to decode (logged - a broken embedded
/// image should not fail the whole resolution).
///
/// # Errors
///
/// [`crate::error::Error::Unsupported`] when the container format is not
/// recognized at all.
pub fn extract_embedded_image(path: &Path) -> Result<Option<image::DynamicImage>> {
    let tagged_file = Probe::open(path)
        .map_err(|e| from_lofty(path, e))?
        .read()
        .map_err(|e| from_lofty(path, e))?;

    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(None);
    };

    let pictures = tag.pictures();
    let Some(picture) = pictures
        .iter()
        .find(|p| p.pic_type() == lofty::picture::PictureType::CoverFront)
        .or_else(|| pictures.first())
    else {
        return Ok(None);
    };

    match image::load_from_memory(picture.data()) {
        Ok(image) => Ok(Some(image)),
        Err(e) => {
            tracing::warn!(target: "cover", path = %path.display(), error = %e, "embedded picture failed to decode");
            Ok(None)
        }
    }
}
