//! XMP APP1 segment handling for raw JPEG byte buffers.
//!
//! The codec works directly on the marker structure of the file instead of
//! parsing it into segments, so bytes outside the spliced range are copied
//! through untouched:
//!
//! - [`locate`]: find an existing XMP segment and the EXIF anchor
//! - [`write`]: replace or insert the XMP segment
//! - [`embed`]: `locate` followed by `write`
//! - [`app1_end`]: where an APP1 segment ends, for callers choosing an anchor
//! - [`extract_payload`]: read back the XML of the embedded packet

mod segment;

pub use segment::{
    SegmentLocation, XMP_SIGNATURE, app1_end, build_segment, embed, extract_payload, locate, write,
};
