use std::fmt::Write;

use super::info::{Measurement, MeasurementItem, PhotoInfo};

const NS_PHOTO: &str = "http://dcpadv.org/schema/3.0/photoinfo";
const NS_MEASUREMENT: &str = "http://dcpadv.org/schema/3.0/measurement";
const NS_ITEM: &str = "http://dcpadv.org/schema/3.0/measurementitem";

impl PhotoInfo {
    /// Render the XMP payload (the `x:xmpmeta` element, without xpacket wrapper).
    ///
    /// Output is deterministic: the same descriptor always yields the same
    /// string. All free text is XML-escaped.
    pub fn to_xmp(&self) -> String {
        let mut xmp = String::new();
        xmp.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
        xmp.push_str("<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
        xmp.push_str("<rdf:Description rdf:about=\"\"\n");
        let _ = writeln!(xmp, "  xmlns:photo=\"{NS_PHOTO}\"");
        let _ = writeln!(xmp, "  xmlns:measurement=\"{NS_MEASUREMENT}\"");
        let _ = writeln!(xmp, "  xmlns:item=\"{NS_ITEM}\">");

        push_element(&mut xmp, 1, "photo:ConstructionName", &self.construction_name);
        push_element(&mut xmp, 1, "photo:Contractor", &self.contractor);
        push_element(&mut xmp, 1, "photo:LargeClassification", &self.large_classification);
        push_element(&mut xmp, 1, "photo:PhotoClassification", &self.photo_classification);
        push_element(&mut xmp, 1, "photo:ConstructionType", &self.construction_type);
        push_element(&mut xmp, 1, "photo:MiddleClassification", &self.middle_classification);
        push_element(&mut xmp, 1, "photo:SmallClassification", &self.small_classification);
        push_element(&mut xmp, 1, "photo:Title", &self.title);
        push_seq(&mut xmp, 1, "photo:ClassificationRemarks", &self.classification_remarks);
        push_element(&mut xmp, 1, "photo:ShootingSpot", &self.shooting_spot);
        push_element(&mut xmp, 1, "photo:IsRepresentative", bool_literal(self.is_representative));
        push_element(
            &mut xmp,
            1,
            "photo:IsFrequencyOfSubmission",
            bool_literal(self.is_frequency_of_submission),
        );

        xmp.push_str("  <photo:Measurements>\n");
        self.measurements.render_into(&mut xmp, 2);
        xmp.push_str("  </photo:Measurements>\n");

        push_element(&mut xmp, 1, "photo:ContractorRemarks", &self.contractor_remarks);

        xmp.push_str("</rdf:Description>\n");
        xmp.push_str("</rdf:RDF>\n");
        xmp.push_str("</x:xmpmeta>\n");
        xmp
    }
}

impl Measurement {
    fn render_into(&self, xmp: &mut String, depth: usize) {
        let pad = indent(depth);
        let _ = writeln!(xmp, "{pad}<rdf:Description>");
        push_element(
            xmp,
            depth + 1,
            "measurement:Classification",
            &self.classification.ordinal().to_string(),
        );
        let _ = writeln!(xmp, "{pad}  <measurement:MeasurementItems>");
        let _ = writeln!(xmp, "{pad}    <rdf:Seq>");
        for item in &self.measurement_items {
            item.render_into(xmp, depth + 3);
        }
        let _ = writeln!(xmp, "{pad}    </rdf:Seq>");
        let _ = writeln!(xmp, "{pad}  </measurement:MeasurementItems>");
        let _ = writeln!(xmp, "{pad}</rdf:Description>");
    }
}

impl MeasurementItem {
    fn render_into(&self, xmp: &mut String, depth: usize) {
        let pad = indent(depth);
        let _ = writeln!(xmp, "{pad}<rdf:li>");
        let _ = writeln!(xmp, "{pad}  <rdf:Description>");
        push_element(xmp, depth + 2, "item:Name", &self.name);
        push_element(xmp, depth + 2, "item:Mark", &self.mark);
        push_element(xmp, depth + 2, "item:DesignedValue", &self.designed_value);
        push_element(xmp, depth + 2, "item:MeasuredValue", &self.measured_value);
        push_element(xmp, depth + 2, "item:UnitName", &self.unit_name);
        push_seq(xmp, depth + 2, "item:Remarks", &self.remarks);
        let _ = writeln!(xmp, "{pad}  </rdf:Description>");
        let _ = writeln!(xmp, "{pad}</rdf:li>");
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn bool_literal(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn push_element(xmp: &mut String, depth: usize, tag: &str, value: &str) {
    let _ = writeln!(xmp, "{}<{tag}>{}</{tag}>", indent(depth), xml_escape(value));
}

fn push_seq(xmp: &mut String, depth: usize, tag: &str, values: &[String]) {
    let pad = indent(depth);
    let _ = writeln!(xmp, "{pad}<{tag}>");
    let _ = writeln!(xmp, "{pad}  <rdf:Seq>");
    for value in values {
        let _ = writeln!(xmp, "{pad}    <rdf:li>{}</rdf:li>", xml_escape(value));
    }
    let _ = writeln!(xmp, "{pad}  </rdf:Seq>");
    let _ = writeln!(xmp, "{pad}</{tag}>");
}

/// Escape special XML characters.
///
/// Characters XML 1.0 cannot carry at all (C0 controls other than tab, LF
/// and CR, plus U+FFFE and U+FFFF) are dropped.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            '\u{0}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' => {}
            _ => out.push(c),
        }
    }
    out
}
