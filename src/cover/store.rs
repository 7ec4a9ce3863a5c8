//! Content-addressed storage for resized cover images.
//!
//! An asset's filename is the SHA-256 of the *decoded* pixel buffer it
//! was produced from, so two different encodings of the same picture
//! share one stored file. Assets are written once with a
//! create-if-absent open; concurrent identical writes lose harmlessly.

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Target size of the longer cover dimension after resizing.
pub const COVER_SIZE: u32 = 512;

/// JPEG quality used for stored renditions.
const JPEG_QUALITY: u8 = 95;

/// A stored, resized cover image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverAsset {
    /// Content-hash-derived filename inside the store directory
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Directory of resized cover assets keyed by pixel-content hash.
pub struct CoverStore {
    dir: PathBuf,
}

impl CoverStore {
    /// Open (and create if needed) a store at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of a stored asset.
    pub fn asset_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Read the dimensions of a stored asset without decoding it.
    pub fn read_dimensions(&self, filename: &str) -> Result<(u32, u32)> {
        Ok(image::image_dimensions(self.asset_path(filename))?)
    }

    /// Resize an image and store it, deduplicated by pixel content.
    ///
    /// When an asset for the same pixels already exists only its
    /// dimensions are read back; no resampling or re-encoding happens.
    pub fn resize_and_store(&self, image: &DynamicImage) -> Result<CoverAsset> {
        let mut hasher = Sha256::new();
        hasher.update(image.as_bytes());
        let filename = format!("{:x}.jpg", hasher.finalize());

        let out_path = self.asset_path(&filename);
        if out_path.exists() {
            let (width, height) = image::image_dimensions(&out_path)?;
            return Ok(CoverAsset {
                filename,
                width,
                height,
            });
        }

        let rgb = image.to_rgb8();
        let (width, height) = scaled_dimensions(rgb.width(), rgb.height());
        let resized = image::imageops::resize(&rgb, width, height, FilterType::Lanczos3);

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode_image(&resized)?;

        // create_new so a concurrent worker writing the same hash can't
        // corrupt the file; the loser's bytes are identical anyway
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&out_path)
        {
            Ok(mut file) => file.write_all(&encoded)?,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        Ok(CoverAsset {
            filename,
            width,
            height,
        })
    }

    /// Produce the process-wide placeholder asset.
    ///
    /// Runs the normal resize-and-store path against the configured
    /// default image, or against a synthesized flat-color image when the
    /// file is missing or unreadable, so startup never fails on assets.
    pub fn default_cover(&self, configured: Option<&Path>) -> Result<CoverAsset> {
        let image = match configured {
            Some(path) => match image::open(path) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(target: "cover", path = %path.display(), error = %e, "default cover unreadable, synthesizing placeholder");
                    synthesized_placeholder()
                }
            },
            None => synthesized_placeholder(),
        };
        self.resize_and_store(&image)
    }
}

/// Uniform scale so the longer dimension equals [`COVER_SIZE`].
fn scaled_dimensions(width: u32, height: u32) -> (u32, u32) {
    let ratio = f64::min(
        COVER_SIZE as f64 / width as f64,
        COVER_SIZE as f64 / height as f64,
    );
    let scale = |d: u32| ((d as f64 * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

fn synthesized_placeholder() -> DynamicImage {
    DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        COVER_SIZE,
        COVER_SIZE,
        image::Rgb([0x2b, 0x2b, 0x33]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flat_image(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    fn stored_files(store: &CoverStore) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_resize_bounds_longer_dimension() {
        let temp = tempfile::tempdir().unwrap();
        let store = CoverStore::new(temp.path().join("covers")).unwrap();

        let asset = store
            .resize_and_store(&flat_image(1024, 512, [1, 2, 3]))
            .unwrap();
        assert_eq!((asset.width, asset.height), (512, 256));
        assert!(asset.filename.ends_with(".jpg"));

        // Stored file has the reported geometry
        let (w, h) = store.read_dimensions(&asset.filename).unwrap();
        assert_eq!((w, h), (512, 256));
    }

    #[test]
    fn test_identical_pixels_share_one_asset() {
        let temp = tempfile::tempdir().unwrap();
        let store = CoverStore::new(temp.path().join("covers")).unwrap();

        let first = store
            .resize_and_store(&flat_image(600, 600, [7, 8, 9]))
            .unwrap();
        let second = store
            .resize_and_store(&flat_image(600, 600, [7, 8, 9]))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(stored_files(&store).len(), 1);
    }

    #[test]
    fn test_different_pixels_get_different_assets() {
        let temp = tempfile::tempdir().unwrap();
        let store = CoverStore::new(temp.path().join("covers")).unwrap();

        let first = store
            .resize_and_store(&flat_image(600, 600, [7, 8, 9]))
            .unwrap();
        let second = store
            .resize_and_store(&flat_image(600, 600, [9, 8, 7]))
            .unwrap();

        assert_ne!(first.filename, second.filename);
        assert_eq!(stored_files(&store).len(), 2);
    }

    #[test]
    fn test_missing_asset_dimensions_error() {
        let temp = tempfile::tempdir().unwrap();
        let store = CoverStore::new(temp.path().join("covers")).unwrap();

        let err = store.read_dimensions("0000.jpg").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_default_cover_without_configured_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = CoverStore::new(temp.path().join("covers")).unwrap();

        let asset = store.default_cover(None).unwrap();
        assert_eq!((asset.width, asset.height), (COVER_SIZE, COVER_SIZE));
        assert!(store.asset_path(&asset.filename).is_file());

        // Bootstrapping twice reuses the stored asset
        let again = store.default_cover(None).unwrap();
        assert_eq!(asset, again);
        assert_eq!(stored_files(&store).len(), 1);
    }

    #[test]
    fn test_default_cover_from_configured_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = CoverStore::new(temp.path().join("covers")).unwrap();

        let source = temp.path().join("default.png");
        flat_image(800, 400, [20, 30, 40]).save(&source).unwrap();

        let asset = store.default_cover(Some(&source)).unwrap();
        assert_eq!((asset.width, asset.height), (512, 256));
    }

    proptest! {
        #[test]
        fn scaled_dimensions_hit_target(width in 1u32..8192, height in 1u32..8192) {
            let (w, h) = scaled_dimensions(width, height);
            prop_assert_eq!(w.max(h), COVER_SIZE);
            prop_assert!(w >= 1 && h >= 1);
        }

        #[test]
        fn scaled_dimensions_preserve_orientation(width in 1u32..8192, height in 1u32..8192) {
            let (w, h) = scaled_dimensions(width, height);
            if width > height {
                prop_assert!(w >= h);
            } else if height > width {
                prop_assert!(h >= w);
            } else {
                prop_assert_eq!(w, h);
            }
        }
    }
}
