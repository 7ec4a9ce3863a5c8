//! Find cover image files next to an audio file.
//!
//! Any image in the audio file's directory qualifies; entries are taken
//! in lexicographic filename order so repeated lookups land on the same
//! file.

use std::path::{Path, PathBuf};

/// Image extensions considered cover candidates (lowercase).
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Return the first image file in the audio file's directory.
///
/// Unreadable directories simply yield `None`.
pub fn find_sibling_image(audio_path: &Path) -> Option<PathBuf> {
    let parent = audio_path.parent()?;

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(parent)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();

    candidates.sort();
    candidates.into_iter().next()
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
