//! Embedding flow: EXIF tags first, then the XMP packet.
//!
//! The EXIF write happens before the XMP splice so that the segment scan
//! runs on the buffer that is actually saved. The packet is placed after the
//! EXIF segment: EXIF readers such as nom-exif stop looking once they meet
//! another APP1 first.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::exif::{ExifField, ExifWriter};
use crate::photo::PhotoInfo;
use crate::xmp;

/// Value of the EXIF Flash tag written for every capture (flash fired).
const FLASH_FIRED: u16 = 1;

/// Scalar EXIF values supplied by the caller for every capture.
///
/// Fields missing from a config section keep their defaults, so `software`
/// names this tool unless overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardTags {
    pub image_description: String,
    pub model: String,
    pub software: String,
}

impl Default for StandardTags {
    fn default() -> Self {
        Self {
            image_description: String::new(),
            model: String::new(),
            software: format!("sitephoto-meta {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl StandardTags {
    pub fn new(
        image_description: impl Into<String>,
        model: impl Into<String>,
        software: impl Into<String>,
    ) -> Self {
        Self {
            image_description: image_description.into(),
            model: model.into(),
            software: software.into(),
        }
    }

    /// The full tag set for a capture taken at `captured_at`.
    pub fn fields_at(&self, captured_at: &DateTime<Local>) -> Vec<ExifField> {
        vec![
            ExifField::ImageDescription(self.image_description.clone()),
            ExifField::Model(self.model.clone()),
            ExifField::Software(self.software.clone()),
            ExifField::DateTimeOriginal(captured_at.format("%Y:%m:%d %H:%M:%S").to_string()),
            ExifField::SubSecTimeOriginal(format!("{:03}", captured_at.timestamp_subsec_millis())),
            ExifField::Flash(FLASH_FIRED),
        ]
    }
}

/// Embed EXIF tags and, when `photo_info` is given, the XMP packet into a
/// JPEG buffer, stamping the capture time with the current local time.
pub fn embed_metadata(
    jpeg: &[u8],
    tags: &StandardTags,
    photo_info: Option<&PhotoInfo>,
    exif_writer: &dyn ExifWriter,
) -> Result<Vec<u8>> {
    embed_metadata_at(jpeg, tags, photo_info, exif_writer, &Local::now())
}

/// [`embed_metadata`] with an explicit capture time.
pub fn embed_metadata_at(
    jpeg: &[u8],
    tags: &StandardTags,
    photo_info: Option<&PhotoInfo>,
    exif_writer: &dyn ExifWriter,
    captured_at: &DateTime<Local>,
) -> Result<Vec<u8>> {
    let fields = tags.fields_at(captured_at);
    let tagged = exif_writer
        .write_tags(jpeg, &fields)
        .context("Failed to write EXIF tags")?;

    let Some(info) = photo_info else {
        log::debug!("No photo info supplied, skipping XMP");
        return Ok(tagged);
    };

    let xml = info.to_xmp();
    let output = splice_after_exif(&tagged, &xml).context("Failed to embed XMP packet")?;
    log::debug!("Embedded {} byte XMP packet", xml.len());
    Ok(output)
}

/// Write the XMP packet so that it follows the EXIF segment.
///
/// A packet already sitting after EXIF is replaced in place. One in front
/// of EXIF (as older writers produced) is removed and re-inserted behind it.
fn splice_after_exif(bytes: &[u8], xml: &str) -> Result<Vec<u8>> {
    let mut buffer = bytes.to_vec();
    loop {
        let mut location = xmp::locate(&buffer);
        let Some(exif_head) = location.exif_head else {
            return xmp::write(&buffer, &location, xml);
        };

        match location.xmp_range() {
            Some((head, _)) if head > exif_head => return xmp::write(&buffer, &location, xml),
            Some((head, end)) => {
                log::debug!("Moving XMP segment [{head}, {end}) behind EXIF");
                buffer.drain(head..end.min(exif_head));
            }
            None => {
                location.exif_head = xmp::app1_end(&buffer, exif_head);
                return xmp::write(&buffer, &location, xml);
            }
        }
    }
}

/// Embed metadata into the JPEG at `path`, replacing the file atomically.
///
/// The whole file is read into memory, transformed, written to a temporary
/// file next to it and renamed over the original. On any error the original
/// file is left as it was.
pub fn embed_metadata_in_file(
    path: &Path,
    tags: &StandardTags,
    photo_info: Option<&PhotoInfo>,
    exif_writer: &dyn ExifWriter,
) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image file {}", path.display()))?;
    let output = embed_metadata(&bytes, tags, photo_info, exif_writer)?;
    persist_atomically(path, &output)
}

fn persist_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(bytes).context("Failed to write temporary file")?;
    tmp.as_file().sync_all().context("Failed to flush temporary file")?;

    // Keep the original file's permissions instead of the temp file's 0600.
    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(tmp.path(), meta.permissions())
            .context("Failed to copy file permissions")?;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
