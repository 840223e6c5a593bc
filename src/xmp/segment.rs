use anyhow::{Result, ensure};

/// Adobe XMP namespace signature that opens an XMP APP1 segment (without NUL).
pub const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/";

const MARKER_PREFIX: u8 = 0xFF;
const APP1: u8 = 0xE1;

const XPACKET_HEADER: &str = "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>";
// Same header without the byte order mark, as some writers emit it.
const XPACKET_HEADER_NO_BOM: &str = "<?xpacket begin=\"\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>";
const XPACKET_FOOTER: &str = "<?xpacket end=\"w\"?>";

// The length field is a u16 that counts itself.
const MAX_SEGMENT_LENGTH: usize = u16::MAX as usize;

/// Byte offsets found by [`locate`].
///
/// Every field is independent: a JPEG may carry an XMP segment, an EXIF
/// segment, both, or neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentLocation {
    /// Offset of the `0xFF` byte of the XMP APP1 marker.
    pub head: Option<usize>,
    /// Offset immediately after the XMP segment (start of the next marker).
    pub end: Option<usize>,
    /// Offset of the `0xFF` byte of the last non-XMP APP1 marker.
    pub exif_head: Option<usize>,
}

impl SegmentLocation {
    /// The `[head, end)` range of an existing XMP segment, if both ends are known.
    pub fn xmp_range(&self) -> Option<(usize, usize)> {
        match (self.head, self.end) {
            (Some(head), Some(end)) => Some((head, end)),
            _ => None,
        }
    }
}

/// Scan a JPEG buffer for APP1 segments.
///
/// Every `FF E1` pair is inspected; the scan does not stop at the first
/// match, so the last XMP segment and the last non-XMP APP1 segment win.
/// Reads past the end of the buffer are clamped and count as a non-match.
pub fn locate(bytes: &[u8]) -> SegmentLocation {
    let mut location = SegmentLocation::default();

    for index in 0..bytes.len().saturating_sub(1) {
        if bytes[index] != MARKER_PREFIX || bytes[index + 1] != APP1 {
            continue;
        }

        let signature_start = index + 4;
        if has_xmp_signature(bytes, signature_start) {
            // The signature lies beyond the length field, so it is readable.
            let length = read_u16_be(bytes, index + 2).unwrap_or_default() as usize;
            location.head = Some(index);
            location.end = Some(index + length + 2);
            log::debug!("XMP APP1 segment at {index}, length {length}");
        } else {
            location.exif_head = Some(index);
            log::debug!("Non-XMP APP1 segment at {index}");
        }
    }

    location
}

/// Offset immediately after the APP1 segment whose marker starts at `head`,
/// clamped to the buffer. None when `head` is not an APP1 marker with a
/// readable length field.
pub fn app1_end(bytes: &[u8], head: usize) -> Option<usize> {
    if bytes.get(head..head + 2)? != [MARKER_PREFIX, APP1] {
        return None;
    }
    let length = read_u16_be(bytes, head + 2)? as usize;
    Some((head + 2 + length).min(bytes.len()))
}

/// Build a complete XMP APP1 segment around an XML payload.
///
/// Layout: `FF E1`, big-endian length, signature + NUL, xpacket header,
/// payload, xpacket footer. The length counts everything after the marker,
/// including the two length bytes.
pub fn build_segment(xml: &str) -> Result<Vec<u8>> {
    let body_len = XMP_SIGNATURE.len()
        + 1
        + XPACKET_HEADER.len()
        + xml.len()
        + XPACKET_FOOTER.len();
    let length = body_len + 2;
    ensure!(
        length <= MAX_SEGMENT_LENGTH,
        "XMP packet too large for a single APP1 segment ({length} > {MAX_SEGMENT_LENGTH} bytes)"
    );

    let mut segment = Vec::with_capacity(2 + length);
    segment.extend_from_slice(&[MARKER_PREFIX, APP1]);
    segment.extend_from_slice(&(length as u16).to_be_bytes());
    segment.extend_from_slice(XMP_SIGNATURE);
    segment.push(0x00);
    segment.extend_from_slice(XPACKET_HEADER.as_bytes());
    segment.extend_from_slice(xml.as_bytes());
    segment.extend_from_slice(XPACKET_FOOTER.as_bytes());
    Ok(segment)
}

/// Splice a freshly built XMP segment into `bytes`.
///
/// An existing segment at `[head, end)` is replaced in place. Otherwise the
/// segment goes right before the EXIF APP1 marker, or at the end of the
/// buffer when there is no anchor. The result is built in one allocation
/// from prefix, segment and suffix.
pub fn write(bytes: &[u8], location: &SegmentLocation, xml: &str) -> Result<Vec<u8>> {
    let segment = build_segment(xml)?;

    let (cut_start, cut_end) = match location.xmp_range() {
        Some((head, end)) => {
            let head = head.min(bytes.len());
            (head, end.clamp(head, bytes.len()))
        }
        None => {
            let at = location.exif_head.unwrap_or(bytes.len()).min(bytes.len());
            (at, at)
        }
    };

    if location.xmp_range().is_some() {
        log::debug!("Replacing XMP segment [{cut_start}, {cut_end})");
    } else if location.exif_head.is_some() {
        log::debug!("Inserting XMP segment before EXIF at {cut_start}");
    } else {
        log::debug!("No APP1 anchor, appending XMP segment at {cut_start}");
    }

    let mut result = Vec::with_capacity(bytes.len() - (cut_end - cut_start) + segment.len());
    result.extend_from_slice(&bytes[..cut_start]);
    result.extend_from_slice(&segment);
    result.extend_from_slice(&bytes[cut_end..]);
    Ok(result)
}

/// Locate the current XMP segment and splice `xml` in its place.
pub fn embed(bytes: &[u8], xml: &str) -> Result<Vec<u8>> {
    let location = locate(bytes);
    write(bytes, &location, xml)
}

/// Return the XML payload of the embedded XMP segment, if any.
///
/// The signature is stripped, as are the standard xpacket header (with or
/// without the byte order mark) and footer when present.
pub fn extract_payload(bytes: &[u8]) -> Option<&[u8]> {
    let (head, end) = locate(bytes).xmp_range()?;
    let start = head + 4 + XMP_SIGNATURE.len() + 1;
    let end = end.min(bytes.len());
    if start > end {
        return None;
    }

    let mut payload = &bytes[start..end];
    for header in [XPACKET_HEADER, XPACKET_HEADER_NO_BOM] {
        if let Some(rest) = payload.strip_prefix(header.as_bytes()) {
            payload = rest;
            break;
        }
    }
    if let Some(rest) = payload.strip_suffix(XPACKET_FOOTER.as_bytes()) {
        payload = rest;
    }
    Some(payload)
}

fn has_xmp_signature(bytes: &[u8], start: usize) -> bool {
    bytes
        .get(start..start + XMP_SIGNATURE.len())
        .is_some_and(|window| window == XMP_SIGNATURE)
}

fn read_u16_be(bytes: &[u8], offset: usize) -> Option<u16> {
    let pair = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([pair[0], pair[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SOI, a 32-byte non-XMP APP1 segment, some filler, EOI.
    fn jpeg_with_exif() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x20];
        bytes.extend_from_slice(b"Exif\0\0MM\0*\0\0\0\x08\0\0\0\0\0\0\0\0\0\0\0\0\0\0");
        bytes.extend_from_slice(&[0x11, 0x22, 0x33]);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    fn count_xmp_segments(bytes: &[u8]) -> usize {
        bytes
            .windows(4 + XMP_SIGNATURE.len())
            .filter(|w| w[0] == 0xFF && w[1] == 0xE1 && &w[4..] == XMP_SIGNATURE)
            .count()
    }

    // ── locate ───────────────────────────────────────────────────────

    #[test]
    fn locate_finds_exif_anchor_only() {
        let bytes = jpeg_with_exif();
        let location = locate(&bytes);
        assert_eq!(location.exif_head, Some(2));
        assert_eq!(location.head, None);
        assert_eq!(location.end, None);
    }

    #[test]
    fn locate_empty_and_tiny_buffers() {
        assert_eq!(locate(&[]), SegmentLocation::default());
        assert_eq!(locate(&[0xFF]), SegmentLocation::default());
        assert_eq!(locate(&[0xFF, 0xD8]), SegmentLocation::default());
    }

    #[test]
    fn locate_truncated_app1_is_an_anchor() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE1, 0x00];
        let location = locate(&bytes);
        assert_eq!(location.exif_head, Some(2));
        assert_eq!(location.head, None);
    }

    #[test]
    fn locate_partial_signature_is_not_xmp() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x40];
        bytes.extend_from_slice(&XMP_SIGNATURE[..20]);
        let location = locate(&bytes);
        assert_eq!(location.head, None);
        assert_eq!(location.exif_head, Some(2));
    }

    #[test]
    fn locate_last_non_xmp_app1_wins() {
        let mut bytes = jpeg_with_exif();
        bytes.truncate(bytes.len() - 2);
        let second = bytes.len();
        bytes.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x04, 0xAA, 0xBB, 0xFF, 0xD9]);
        assert_eq!(locate(&bytes).exif_head, Some(second));
    }

    #[test]
    fn locate_ignores_other_markers() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, 0xFF, 0x00, 0xFF, 0xD9];
        assert_eq!(locate(&bytes), SegmentLocation::default());
    }

    // ── app1_end ─────────────────────────────────────────────────────

    #[test]
    fn app1_end_follows_length_field() {
        // APP1 with length 6: the two length bytes plus four content bytes.
        let bytes = [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x06, 1, 2, 3, 4, 0xFF, 0xD9];
        assert_eq!(app1_end(&bytes, 2), Some(10));
        assert_eq!(&bytes[10..], &[0xFF, 0xD9]);
    }

    #[test]
    fn app1_end_rejects_other_offsets() {
        let bytes = jpeg_with_exif();
        assert_eq!(app1_end(&bytes, 0), None);
        assert_eq!(app1_end(&bytes, bytes.len()), None);
        assert_eq!(app1_end(&[0xFF, 0xE1, 0x00], 0), None);
    }

    #[test]
    fn app1_end_clamps_corrupt_length() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE1, 0xFF, 0xFF, 0x00];
        assert_eq!(app1_end(&bytes, 2), Some(bytes.len()));
    }

    // ── build_segment ────────────────────────────────────────────────

    #[test]
    fn build_segment_layout() {
        let segment = build_segment("<x/>").unwrap();
        assert_eq!(&segment[..2], &[0xFF, 0xE1]);

        let length = u16::from_be_bytes([segment[2], segment[3]]) as usize;
        assert_eq!(length + 2, segment.len());

        assert_eq!(&segment[4..4 + XMP_SIGNATURE.len()], XMP_SIGNATURE);
        assert_eq!(segment[4 + XMP_SIGNATURE.len()], 0x00);

        let text = String::from_utf8(segment[5 + XMP_SIGNATURE.len()..].to_vec()).unwrap();
        assert!(text.starts_with("<?xpacket begin="));
        assert!(text.contains("<x/>"));
        assert!(text.ends_with("<?xpacket end=\"w\"?>"));
    }

    #[test]
    fn build_segment_rejects_oversized_payload() {
        let xml = "a".repeat(MAX_SEGMENT_LENGTH);
        assert!(build_segment(&xml).is_err());
    }

    // ── write ────────────────────────────────────────────────────────

    #[test]
    fn write_inserts_before_exif() {
        let bytes = jpeg_with_exif();
        let location = locate(&bytes);
        let segment = build_segment("<x/>").unwrap();

        let out = write(&bytes, &location, "<x/>").unwrap();
        assert_eq!(out.len(), bytes.len() + segment.len());
        assert_eq!(&out[..2], &bytes[..2]);
        assert_eq!(&out[2..2 + segment.len()], segment.as_slice());
        assert_eq!(&out[2 + segment.len()..], &bytes[2..]);
    }

    #[test]
    fn write_appends_without_anchor() {
        let bytes = vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];
        let location = locate(&bytes);
        let out = write(&bytes, &location, "<x/>").unwrap();

        assert_eq!(&out[..bytes.len()], bytes.as_slice());
        assert_eq!(&out[bytes.len()..], build_segment("<x/>").unwrap().as_slice());
    }

    #[test]
    fn write_replaces_existing_segment() {
        let first = embed(&jpeg_with_exif(), "<first/>").unwrap();
        let second = embed(&first, "<second-and-longer/>").unwrap();

        assert_eq!(count_xmp_segments(&second), 1);
        assert_eq!(extract_payload(&second).unwrap(), b"<second-and-longer/>");

        // Bytes around the replaced range are untouched.
        let old = locate(&first).xmp_range().unwrap();
        let new = locate(&second).xmp_range().unwrap();
        assert_eq!(old.0, new.0);
        assert_eq!(&first[..old.0], &second[..new.0]);
        assert_eq!(&first[old.1..], &second[new.1..]);
    }

    #[test]
    fn write_clamps_corrupt_length() {
        // XMP segment claiming more bytes than the buffer holds.
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1, 0xFF, 0xF0];
        bytes.extend_from_slice(XMP_SIGNATURE);
        bytes.push(0);
        bytes.extend_from_slice(b"<old/>");

        let out = embed(&bytes, "<new/>").unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(&out[2..], build_segment("<new/>").unwrap().as_slice());
    }

    #[test]
    fn rescan_length_matches_range() {
        let out = embed(&jpeg_with_exif(), "<rdf:RDF/>").unwrap();
        let (head, end) = locate(&out).xmp_range().unwrap();
        let length = u16::from_be_bytes([out[head + 2], out[head + 3]]) as usize;
        assert_eq!(length + 2, end - head);
        // The segment ends exactly where the EXIF marker now starts.
        assert_eq!(locate(&out).exif_head, Some(end));
    }

    #[test]
    fn write_preserves_non_utf8_bytes() {
        let mut bytes = vec![0xFF, 0xD8, 0xC3, 0x28, 0xA0, 0xA1, 0xF0, 0x28, 0x8C, 0xBC];
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        let out = embed(&bytes, "<x>日本語</x>").unwrap();
        assert_eq!(&out[..bytes.len()], bytes.as_slice());
    }

    // ── extract_payload ──────────────────────────────────────────────

    #[test]
    fn extract_payload_none_without_xmp() {
        assert!(extract_payload(&jpeg_with_exif()).is_none());
    }

    #[test]
    fn extract_payload_strips_header_without_bom() {
        let mut contents = XMP_SIGNATURE.to_vec();
        contents.push(0);
        contents.extend_from_slice(XPACKET_HEADER_NO_BOM.as_bytes());
        contents.extend_from_slice(b"<x:xmpmeta/>");
        contents.extend_from_slice(XPACKET_FOOTER.as_bytes());

        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1];
        bytes.extend_from_slice(&((contents.len() + 2) as u16).to_be_bytes());
        bytes.extend_from_slice(&contents);
        bytes.extend_from_slice(&[0xFF, 0xD9]);

        assert_eq!(extract_payload(&bytes).unwrap(), b"<x:xmpmeta/>");
    }

    #[test]
    fn extract_payload_round_trips_utf8() {
        let out = embed(&jpeg_with_exif(), "<t>現場写真</t>").unwrap();
        let payload = extract_payload(&out).unwrap();
        assert_eq!(std::str::from_utf8(payload).unwrap(), "<t>現場写真</t>");
    }
}
