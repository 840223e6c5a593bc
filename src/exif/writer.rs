use anyhow::{Result, ensure};
use img_parts::Bytes;
use img_parts::ImageEXIF;
use img_parts::jpeg::Jpeg;
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::io::Write;
use tempfile::NamedTempFile;

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

/// A single EXIF tag assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExifField {
    ImageDescription(String),
    Model(String),
    Software(String),
    /// `yyyy:MM:dd HH:mm:ss`
    DateTimeOriginal(String),
    /// Fraction of a second of `DateTimeOriginal`, as decimal digits.
    SubSecTimeOriginal(String),
    /// Raw EXIF flash value; bit 0 set means the flash fired.
    Flash(u16),
}

impl ExifField {
    /// EXIF tag name, as used by exiftool and the EXIF standard.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ImageDescription(_) => "ImageDescription",
            Self::Model(_) => "Model",
            Self::Software(_) => "Software",
            Self::DateTimeOriginal(_) => "DateTimeOriginal",
            Self::SubSecTimeOriginal(_) => "SubSecTimeOriginal",
            Self::Flash(_) => "Flash",
        }
    }

    pub fn value(&self) -> String {
        match self {
            Self::ImageDescription(v)
            | Self::Model(v)
            | Self::Software(v)
            | Self::DateTimeOriginal(v)
            | Self::SubSecTimeOriginal(v) => v.clone(),
            Self::Flash(v) => v.to_string(),
        }
    }

    fn to_tag(&self) -> ExifTag {
        match self {
            Self::ImageDescription(v) => ExifTag::ImageDescription(v.clone()),
            Self::Model(v) => ExifTag::Model(v.clone()),
            Self::Software(v) => ExifTag::Software(v.clone()),
            Self::DateTimeOriginal(v) => ExifTag::DateTimeOriginal(v.clone()),
            Self::SubSecTimeOriginal(v) => ExifTag::SubSecTimeOriginal(v.clone()),
            Self::Flash(v) => ExifTag::Flash(vec![*v]),
        }
    }
}

/// Writes EXIF tags into an in-memory JPEG.
///
/// Implementations must leave every non-EXIF segment untouched so that the
/// XMP splice that follows sees a stable buffer.
pub trait ExifWriter {
    /// Return a copy of `jpeg` with `fields` set, keeping any other existing tags.
    fn write_tags(&self, jpeg: &[u8], fields: &[ExifField]) -> Result<Vec<u8>>;
}

/// [`ExifWriter`] backed by `little_exif` for the TIFF block and `img-parts`
/// for the JPEG segment surgery.
#[derive(Debug, Default, Clone, Copy)]
pub struct LittleExifWriter;

impl ExifWriter for LittleExifWriter {
    /// Strategy:
    /// 1. Parse the JPEG with img-parts (preserves all segments)
    /// 2. Load existing EXIF with little_exif and merge the new tags
    /// 3. Replace the APP1 EXIF segment, keeping its original position
    fn write_tags(&self, jpeg_bytes: &[u8], fields: &[ExifField]) -> Result<Vec<u8>> {
        if fields.is_empty() {
            return Ok(jpeg_bytes.to_vec());
        }

        let mut jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(jpeg_bytes))
            .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;

        // Remember where the EXIF segment was originally positioned
        let orig_exif_pos = find_exif_segment_pos(&jpeg);

        let mut metadata = load_existing_metadata(jpeg_bytes).unwrap_or_else(Metadata::new);
        for field in fields {
            log::debug!("  {}: {}", field.name(), field.value());
            metadata.set_tag(field.to_tag());
        }

        let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
        ensure!(
            exif_bytes.len() > JPEG_EXIF_OVERHEAD,
            "little_exif produced an empty EXIF block"
        );
        jpeg.set_exif(Some(Bytes::from(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())));

        // set_exif() may insert the segment after other APP segments (XMP
        // included). Move it back to where it was.
        if let Some(new_pos) = find_exif_segment_pos(&jpeg) {
            let target_pos = orig_exif_pos.unwrap_or(1); // default: right after APP0
            if target_pos < new_pos {
                let segments = jpeg.segments_mut();
                let seg = segments.remove(new_pos);
                segments.insert(target_pos, seg);
            }
        }

        let output = jpeg.encoder().bytes();
        Ok(output.to_vec())
    }
}

/// Load existing EXIF metadata from an in-memory JPEG using little_exif.
///
/// little_exif 0.4 only reads from a path, so the buffer is staged in a
/// temporary `.jpg` file first. Returns None if it can't parse or finds no
/// tags; little_exif may panic on unusual input.
fn load_existing_metadata(jpeg: &[u8]) -> Option<Metadata> {
    let staged = match stage_jpeg(jpeg) {
        Ok(file) => file,
        Err(e) => {
            log::debug!("Could not stage JPEG for little_exif: {e}");
            return None;
        }
    };
    let path = staged.path().to_path_buf();
    let result = std::panic::catch_unwind(move || Metadata::new_from_path(&path));

    match result {
        Ok(Ok(m)) => {
            if m.data().is_empty() {
                log::debug!("little_exif loaded empty metadata");
                None
            } else {
                log::debug!("little_exif loaded {} existing EXIF tags", m.data().len());
                Some(m)
            }
        }
        Ok(Err(e)) => {
            log::debug!("little_exif could not parse EXIF: {e}");
            None
        }
        Err(_) => {
            log::debug!("little_exif panicked parsing EXIF");
            None
        }
    }
}

fn stage_jpeg(jpeg: &[u8]) -> std::io::Result<NamedTempFile> {
    // little_exif picks the container format from the extension.
    let mut file = tempfile::Builder::new().suffix(".jpg").tempfile()?;
    file.write_all(jpeg)?;
    file.flush()?;
    Ok(file)
}

/// Find the position of the EXIF APP1 segment in a JPEG.
/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}
