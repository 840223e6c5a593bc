use anyhow::{Context, Result};
use nom_exif::*;
use std::path::Path;

/// The EXIF tags this crate writes, as read back from an image.
#[derive(Debug, Clone, Default)]
pub struct ExifData {
    pub image_description: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub date_time_original: Option<String>,
}

impl ExifData {
    pub fn is_empty(&self) -> bool {
        self.image_description.is_none()
            && self.model.is_none()
            && self.software.is_none()
            && self.date_time_original.is_none()
    }
}

/// Read existing EXIF data from an image file.
pub fn read_exif(path: &Path) -> Result<ExifData> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).context("Failed to open image file")?;

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("No EXIF data found in {}", path.display());
            return Ok(ExifData::default());
        }
    };
    let exif: Exif = iter.into();

    Ok(ExifData {
        image_description: exif.get(ExifTag::ImageDescription).and_then(entry_to_string),
        model: exif.get(ExifTag::Model).and_then(entry_to_string),
        software: exif.get(ExifTag::Software).and_then(entry_to_string),
        date_time_original: exif.get(ExifTag::DateTimeOriginal).and_then(entry_to_string),
    })
}

/// Convert an EntryValue to an Option<String>.
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').to_string();
    if s.is_empty() { None } else { Some(s) }
}
