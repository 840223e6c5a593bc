//! Construction-site photo attributes and their XMP rendering.
//!
//! A [`PhotoInfo`] is parsed once per capture from the JSON handed over by the
//! calling application and rendered with [`PhotoInfo::to_xmp`] into the
//! RDF/XML payload embedded by [`crate::xmp`].
//!
//! ```rust
//! use sitephoto_meta::photo::PhotoInfo;
//!
//! let info = PhotoInfo::from_json(r#"{
//!     "title": "Rebar inspection",
//!     "classificationRemarks": ["north wall"],
//!     "measurements": { "classification": 0, "measurementItems": [] }
//! }"#).unwrap();
//!
//! let xml = info.to_xmp();
//! assert!(xml.contains("<photo:Title>Rebar inspection</photo:Title>"));
//! ```

mod info;
mod render;

pub use info::{Measurement, MeasurementClassification, MeasurementItem, PhotoInfo};
pub use render::xml_escape;
