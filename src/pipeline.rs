use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::embed;
use crate::exif::ExifWriter;
use crate::photo::PhotoInfo;

/// Extensions of files the pipeline will rewrite.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// The result of processing a single image.
///
/// Errors are recorded rather than returned so a batch keeps going past a
/// bad file. In a dry run nothing is written, so both `*_written` flags stay
/// `false` and `dry_run` is set instead.
///
/// # Example
///
/// ```rust,no_run
/// # use sitephoto_meta::config::Config;
/// # use sitephoto_meta::exif::LittleExifWriter;
/// # use sitephoto_meta::pipeline::process_image;
/// let config = Config::default();
/// let result = process_image("photo.jpg".as_ref(), None, &config, &LittleExifWriter);
///
/// if result.error.is_none() {
///     println!("EXIF written: {}", result.exif_written);
///     if let Some(ref backup) = result.backup_path {
///         println!("Backup: {}", backup.display());
///     }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ProcessResult {
    pub path: PathBuf,
    pub dry_run: bool,
    pub exif_written: bool,
    pub xmp_written: bool,
    pub backup_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Collect JPEG files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Only `.jpg` / `.jpeg` files are
/// included, case-insensitively.
///
/// # Example
///
/// ```rust,no_run
/// use sitephoto_meta::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[
///     PathBuf::from("photo.jpg"),       // single file
///     PathBuf::from("./site-photos/"),  // entire directory
/// ]);
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has a JPEG extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Create a backup of the original file. An existing backup is kept.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path).context("Failed to create backup")?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}

/// Embed the configured EXIF tags and, optionally, a photo descriptor into
/// one image.
///
/// 1. **Backup** the original when `output.backup_originals` is set
/// 2. **Embed** EXIF then XMP and atomically replace the file
///
/// With `output.dry_run` the new image is built in memory and discarded, so
/// encoding problems still surface without touching the file.
pub fn process_image(
    path: &Path,
    photo_info: Option<&PhotoInfo>,
    config: &Config,
    exif_writer: &dyn ExifWriter,
) -> ProcessResult {
    let mut result = ProcessResult {
        path: path.to_path_buf(),
        dry_run: config.output.dry_run,
        exif_written: false,
        xmp_written: false,
        backup_path: None,
        error: None,
    };

    let tags = &config.exif_tags;

    if config.output.dry_run {
        let outcome = std::fs::read(path)
            .with_context(|| format!("Failed to read image file {}", path.display()))
            .and_then(|bytes| embed::embed_metadata(&bytes, tags, photo_info, exif_writer));
        if let Err(e) = outcome {
            result.error = Some(format!("{e:#}"));
        }
        return result;
    }

    if config.output.backup_originals {
        match backup_file(path) {
            Ok(backup) => result.backup_path = Some(backup),
            Err(e) => log::warn!("Failed to backup {}: {e}", path.display()),
        }
    }

    match embed::embed_metadata_in_file(path, tags, photo_info, exif_writer) {
        Ok(()) => {
            result.exif_written = true;
            result.xmp_written = photo_info.is_some();
        }
        Err(e) => {
            result.error = Some(format!("Failed to write metadata: {e:#}"));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::ExifField;
    use crate::photo::Measurement;
    use crate::xmp;
    use std::fs;
    use tempfile::TempDir;

    /// Leaves the image untouched, so only the XMP step changes bytes.
    struct PassThroughWriter;

    impl ExifWriter for PassThroughWriter {
        fn write_tags(&self, jpeg: &[u8], _fields: &[ExifField]) -> Result<Vec<u8>> {
            Ok(jpeg.to_vec())
        }
    }

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];

    fn info() -> PhotoInfo {
        PhotoInfo {
            title: "Footing F3".into(),
            measurements: Measurement::default(),
            ..Default::default()
        }
    }

    fn config(dry_run: bool, backup_originals: bool) -> Config {
        let mut config = Config::default();
        config.output.dry_run = dry_run;
        config.output.backup_originals = backup_originals;
        config
    }

    // ── is_supported_image ───────────────────────────────────────────

    #[test]
    fn supported_image_extensions() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.Jpg")));
    }

    #[test]
    fn unsupported_image_extensions() {
        assert!(!is_supported_image(Path::new("photo.png")));
        assert!(!is_supported_image(Path::new("photo.heic")));
        assert!(!is_supported_image(Path::new("readme.txt")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    // ── collect_images ───────────────────────────────────────────────

    #[test]
    fn collect_images_single_file() {
        let dir = TempDir::new().unwrap();
        let jpg = dir.path().join("test.jpg");
        fs::write(&jpg, b"fake").unwrap();

        let images = collect_images(&[jpg.clone()]);
        assert_eq!(images, vec![jpg]);
    }

    #[test]
    fn collect_images_skips_unsupported() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("scan.png");
        fs::write(&png, b"fake").unwrap();

        assert!(collect_images(&[png]).is_empty());
    }

    #[test]
    fn collect_images_directory_recursive() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        fs::write(dir.path().join("a.jpg"), b"fake").unwrap();
        fs::write(sub.join("b.jpeg"), b"fake").unwrap();
        fs::write(sub.join("c.txt"), b"fake").unwrap();

        let images = collect_images(&[dir.path().to_path_buf()]);
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn collect_images_nonexistent_path() {
        assert!(collect_images(&[PathBuf::from("/nonexistent/path")]).is_empty());
    }

    // ── process_image ────────────────────────────────────────────────

    #[test]
    fn writes_file_and_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.jpg");
        fs::write(&path, JPEG).unwrap();

        let result = process_image(&path, Some(&info()), &config(false, true), &PassThroughWriter);

        assert!(result.error.is_none(), "{:?}", result.error);
        assert!(!result.dry_run);
        assert!(result.exif_written);
        assert!(result.xmp_written);

        let backup = result.backup_path.unwrap();
        assert_eq!(backup, dir.path().join("site.jpg.bak"));
        assert_eq!(fs::read(&backup).unwrap(), JPEG);

        let written = fs::read(&path).unwrap();
        let payload = String::from_utf8(xmp::extract_payload(&written).unwrap().to_vec()).unwrap();
        assert!(payload.contains("<photo:Title>Footing F3</photo:Title>"));
    }

    #[test]
    fn dry_run_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.jpg");
        fs::write(&path, JPEG).unwrap();

        let result = process_image(&path, Some(&info()), &config(true, true), &PassThroughWriter);

        assert!(result.error.is_none());
        assert!(result.dry_run);
        assert!(!result.exif_written);
        assert!(!result.xmp_written);
        assert!(result.backup_path.is_none());
        assert_eq!(fs::read(&path).unwrap(), JPEG);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn without_descriptor_no_xmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.jpg");
        fs::write(&path, JPEG).unwrap();

        let result = process_image(&path, None, &config(false, false), &PassThroughWriter);

        assert!(result.exif_written);
        assert!(!result.xmp_written);
        assert!(result.backup_path.is_none());
        assert_eq!(fs::read(&path).unwrap(), JPEG);
    }

    #[test]
    fn dry_run_still_reports_errors() {
        let result = process_image(
            Path::new("/nonexistent/site.jpg"),
            Some(&info()),
            &config(true, false),
            &PassThroughWriter,
        );
        assert!(result.dry_run);
        assert!(result.error.is_some());
    }

    #[test]
    fn missing_file_is_recorded() {
        let result = process_image(
            Path::new("/nonexistent/site.jpg"),
            None,
            &config(false, false),
            &PassThroughWriter,
        );
        assert!(result.error.is_some());
        assert!(!result.exif_written);
    }
}
