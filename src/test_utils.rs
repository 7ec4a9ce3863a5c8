//! Test fixtures shared across modules.
//!
//! Real decodable media is built on the fly: a minimal PCM WAV (the
//! simplest container lofty can read and write), ID3v2 tags written with
//! lofty itself, and flat-color PNGs for cover sources. No binary test
//! assets are checked in.

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use std::path::Path;
use std::time::SystemTime;

/// Write a minimal valid WAV file (8 kHz mono, 8 samples of silence).
pub fn wav_fixture(path: &Path) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&52u32.to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&8000u32.to_le_bytes()); // sample rate
    bytes.extend_from_slice(&16000u32.to_le_bytes()); // byte rate
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 16]);
    std::fs::write(path, bytes).expect("write wav fixture");
}

/// Set tag fields on an existing audio file, preserving other content
/// (pictures included).
pub fn tag_fixture(path: &Path, title: &str, artist: &str, album: &str, date: &str) {
    let mut tag = id3_tag(path);
    if !title.is_empty() {
        tag.set_title(title.to_string());
    }
    if !artist.is_empty() {
        tag.set_artist(artist.to_string());
    }
    if !album.is_empty() {
        tag.set_album(album.to_string());
    }
    if !date.is_empty() {
        tag.insert_text(ItemKey::RecordingDate, date.to_string());
    }
    tag.save_to_path(path, WriteOptions::default())
        .expect("write tag fixture");
}

/// Write a WAV with an embedded flat-color 64x64 PNG front cover.
pub fn wav_fixture_with_cover(path: &Path, rgb: [u8; 3]) {
    wav_fixture(path);

    let mut tag = id3_tag(path);
    tag.push_picture(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Png),
        None,
        png_bytes(64, 64, rgb),
    ));
    tag.save_to_path(path, WriteOptions::default())
        .expect("write cover fixture");
}

/// Read the file's ID3v2 tag, creating an empty one when absent.
fn id3_tag(path: &Path) -> Tag {
    let tagged_file = Probe::open(path)
        .expect("open fixture")
        .read()
        .expect("probe fixture");
    tagged_file
        .tag(TagType::Id3v2)
        .cloned()
        .unwrap_or_else(|| Tag::new(TagType::Id3v2))
}

/// Write a flat-color PNG file.
pub fn png_fixture(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
        .save(path)
        .expect("write png fixture");
}

/// Encode a flat-color PNG in memory.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb(rgb),
    ));
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png fixture");
    bytes
}

/// Force a file's modification time, for freshness tests.
pub fn set_file_mtime(path: &Path, time: SystemTime) {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .expect("open for mtime");
    file.set_modified(time).expect("set mtime");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_fixture_is_probeable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.wav");
        wav_fixture(&path);

        assert!(Probe::open(&path).unwrap().read().is_ok());
    }

    #[test]
    fn test_tagging_preserves_pictures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.wav");
        wav_fixture_with_cover(&path, [1, 2, 3]);
        tag_fixture(&path, "Title", "Artist", "", "");

        let tagged = Probe::open(&path).unwrap().read().unwrap();
        let tag = tagged.tag(TagType::Id3v2).unwrap();
        assert_eq!(tag.title().as_deref(), Some("Title"));
        assert_eq!(tag.pictures().len(), 1);
    }

    #[test]
    fn test_png_bytes_decode_back() {
        let bytes = png_bytes(8, 4, [250, 0, 10]);
        let image = image::load_from_memory(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (8, 4));
        assert_eq!(image.to_rgb8().get_pixel(0, 0).0, [250, 0, 10]);
    }

    #[test]
    fn test_set_file_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.txt");
        std::fs::write(&path, b"x").unwrap();

        let past = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        set_file_mtime(&path, past);
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(modified, past);
    }
}
