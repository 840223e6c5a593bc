use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Attributes of one construction-site photograph.
///
/// Every field except `measurements` falls back to its default (empty text,
/// `false`, empty list) when missing or `null`. `measurements` is required:
/// rendering a photo without its measurement record would embed misleading
/// metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub construction_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contractor: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub large_classification: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub photo_classification: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub construction_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub middle_classification: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub small_classification: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub classification_remarks: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub shooting_spot: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_representative: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_frequency_of_submission: bool,
    pub measurements: Measurement,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contractor_remarks: String,
}

/// Measurement record attached to a photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    #[serde(default)]
    pub classification: MeasurementClassification,
    #[serde(default, deserialize_with = "null_as_default")]
    pub measurement_items: Vec<MeasurementItem>,
}

/// A single measured quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mark: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub designed_value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub measured_value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remarks: Vec<String>,
}

/// Kind of value a measurement record holds. Serialized as its ordinal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MeasurementClassification {
    #[default]
    ConstructionManagementValue,
    QualityCertificationValue,
    SupervisionValue,
    InspectionValue,
    Reserved4,
    Reserved5,
    Reserved6,
    Reserved7,
    Reserved8,
    Others,
}

impl MeasurementClassification {
    pub const ALL: [Self; 10] = [
        Self::ConstructionManagementValue,
        Self::QualityCertificationValue,
        Self::SupervisionValue,
        Self::InspectionValue,
        Self::Reserved4,
        Self::Reserved5,
        Self::Reserved6,
        Self::Reserved7,
        Self::Reserved8,
        Self::Others,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Japanese display label used on the blackboard.
    pub fn label(self) -> &'static str {
        match self {
            Self::ConstructionManagementValue => "施工管理値",
            Self::QualityCertificationValue => "品質証明値",
            Self::SupervisionValue => "監督値",
            Self::InspectionValue => "検査値",
            Self::Reserved4 => "予約1",
            Self::Reserved5 => "予約2",
            Self::Reserved6 => "予約3",
            Self::Reserved7 => "予約4",
            Self::Reserved8 => "予約5",
            Self::Others => "その他",
        }
    }

    /// Parse a display label; unknown labels map to the first classification.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.label() == label)
            .unwrap_or_default()
    }
}

impl Serialize for MeasurementClassification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawClassification {
    Ordinal(i64),
    Label(String),
}

impl<'de> Deserialize<'de> for MeasurementClassification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let classification = match Option::<RawClassification>::deserialize(deserializer)? {
            None => Self::default(),
            Some(RawClassification::Ordinal(n)) => Self::from_ordinal(n).unwrap_or_else(|| {
                log::warn!("Unknown measurement classification {n}, using default");
                Self::default()
            }),
            Some(RawClassification::Label(label)) => Self::from_label(&label),
        };
        Ok(classification)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PhotoInfo {
    /// Parse the JSON payload sent across the plugin boundary.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse photo info")
    }

    /// Build from an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("Failed to parse photo info")
    }

    /// Load the JSON payload from a file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read photo info {}", path.display()))?;
        Self::from_json(&contents)
    }
}
