//! # sitephoto-meta
//!
//! Embed construction-site photo metadata into JPEG files: a fixed set of
//! EXIF tags (description, model, software, capture time, flash) plus a
//! custom XMP packet describing the construction work the photo documents.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sitephoto_meta::embed::{StandardTags, embed_metadata_in_file};
//! use sitephoto_meta::exif::LittleExifWriter;
//! use sitephoto_meta::photo::PhotoInfo;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let info = PhotoInfo::load(Path::new("photo-info.json"))?;
//!     let tags = StandardTags::new("Blackboard photo", "Pixel 8", "sitephoto 1.0");
//!
//!     // EXIF first, then the XMP packet; the file is replaced atomically.
//!     embed_metadata_in_file(Path::new("IMG_0001.jpg"), &tags, Some(&info), &LittleExifWriter)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The XMP codec works on plain byte buffers and can be used on its own:
//!
//! ```rust
//! use sitephoto_meta::xmp;
//!
//! let jpeg = [0xFF, 0xD8, 0xFF, 0xD9];
//! let with_xmp = xmp::embed(&jpeg, "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>").unwrap();
//!
//! // Embedding again replaces the packet instead of adding a second one.
//! let again = xmp::embed(&with_xmp, "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>").unwrap();
//! assert_eq!(again, with_xmp);
//! ```
//!
//! ## Modules
//!
//! - [`xmp`]: locate, build and splice the XMP APP1 segment
//! - [`photo`]: photo descriptor model, JSON parsing and XMP rendering
//! - [`exif`]: EXIF tag writing and reading
//! - [`embed`]: EXIF-then-XMP embedding of a single image
//! - [`config`]: configuration types and loading/saving
//! - [`pipeline`]: batch processing and image collection

pub mod config;
pub mod embed;
pub mod exif;
pub mod photo;
pub mod pipeline;
pub mod xmp;
