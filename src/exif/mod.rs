//! EXIF tag reading and writing.
//!
//! - [`ExifWriter`]: the capability used by the embedding flow to set tags
//! - [`LittleExifWriter`]: the production implementation
//! - [`read_exif`]: read the written tags back from a file

mod reader;
mod writer;

pub use reader::{ExifData, read_exif};
pub use writer::{ExifField, ExifWriter, LittleExifWriter};
