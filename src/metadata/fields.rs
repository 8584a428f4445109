//! The fixed set of descriptive fields shared by every metadata tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a field's value is shaped, and therefore how custom text is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Comma separated when stored as a custom value.
    List,
    Integer,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "subtitle")]
    Subtitle,
    #[serde(rename = "author")]
    Author,
    #[serde(rename = "narrator")]
    Narrator,
    #[serde(rename = "description")]
    Description,
    #[serde(rename = "coverURL")]
    CoverUrl,
    #[serde(rename = "seriesName")]
    SeriesName,
    #[serde(rename = "seriesSequence")]
    SeriesSequence,
    #[serde(rename = "releaseDate")]
    ReleaseDate,
    #[serde(rename = "isbn")]
    Isbn,
    #[serde(rename = "asin")]
    Asin,
    #[serde(rename = "language")]
    Language,
    #[serde(rename = "publisher")]
    Publisher,
    #[serde(rename = "genres")]
    Genres,
    #[serde(rename = "durationSec")]
    DurationSec,
    #[serde(rename = "rating")]
    Rating,
    #[serde(rename = "ratingCount")]
    RatingCount,
}

impl MetadataField {
    pub const ALL: [MetadataField; 17] = [
        MetadataField::Title,
        MetadataField::Subtitle,
        MetadataField::Author,
        MetadataField::Narrator,
        MetadataField::Description,
        MetadataField::CoverUrl,
        MetadataField::SeriesName,
        MetadataField::SeriesSequence,
        MetadataField::ReleaseDate,
        MetadataField::Isbn,
        MetadataField::Asin,
        MetadataField::Language,
        MetadataField::Publisher,
        MetadataField::Genres,
        MetadataField::DurationSec,
        MetadataField::Rating,
        MetadataField::RatingCount,
    ];

    /// Canonical wire name, also used as the key in the custom tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Subtitle => "subtitle",
            MetadataField::Author => "author",
            MetadataField::Narrator => "narrator",
            MetadataField::Description => "description",
            MetadataField::CoverUrl => "coverURL",
            MetadataField::SeriesName => "seriesName",
            MetadataField::SeriesSequence => "seriesSequence",
            MetadataField::ReleaseDate => "releaseDate",
            MetadataField::Isbn => "isbn",
            MetadataField::Asin => "asin",
            MetadataField::Language => "language",
            MetadataField::Publisher => "publisher",
            MetadataField::Genres => "genres",
            MetadataField::DurationSec => "durationSec",
            MetadataField::Rating => "rating",
            MetadataField::RatingCount => "ratingCount",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            MetadataField::Genres => FieldKind::List,
            MetadataField::DurationSec | MetadataField::RatingCount => FieldKind::Integer,
            MetadataField::Rating => FieldKind::Real,
            _ => FieldKind::Text,
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldName(pub String);

impl fmt::Display for UnknownFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown metadata field '{}'", self.0)
    }
}

impl std::error::Error for UnknownFieldName {}

impl FromStr for MetadataField {
    type Err = UnknownFieldName;

    /// Accepts the canonical camelCase names and their snake_case spelling,
    /// ignoring ASCII case ("coverURL", "cover_url", "COVERURL").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        MetadataField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| UnknownFieldName(s.to_string()))
    }
}

/// One field's value as contributed by a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Integer(i64),
    Real(f64),
}

impl FieldValue {
    /// Empty values never win the cascade. Zero is a value, not emptiness.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|i| i.trim().is_empty()),
            FieldValue::Integer(_) | FieldValue::Real(_) => false,
        }
    }

    /// Text form stored in the custom tier.
    pub fn to_custom_string(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items.join(", "),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Real(r) => r.to_string(),
        }
    }

    pub fn text(value: &Option<String>) -> Option<FieldValue> {
        value
            .as_ref()
            .map(|s| FieldValue::Text(s.clone()))
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFieldValue {
    pub field: MetadataField,
    pub value: String,
    pub reason: &'static str,
}

impl fmt::Display for InvalidFieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid value '{}' for field '{}': {}",
            self.value, self.field, self.reason
        )
    }
}

impl std::error::Error for InvalidFieldValue {}

/// Parses the text form of a custom value. Blank text is `Ok(None)`, which for
/// numeric fields means "locked to absent" and never zero.
pub fn parse_custom(field: MetadataField, raw: &str) -> Result<Option<FieldValue>, InvalidFieldValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let invalid = |reason| InvalidFieldValue {
        field,
        value: raw.to_string(),
        reason,
    };
    match field.kind() {
        FieldKind::Text => Ok(Some(FieldValue::Text(raw.to_string()))),
        FieldKind::List => {
            let items = split_list(trimmed);
            Ok(Some(FieldValue::List(items)).filter(|v| !v.is_empty()))
        }
        FieldKind::Integer => {
            let parsed: i64 = trimmed.parse().map_err(|_| invalid("expected an integer"))?;
            if parsed < 0 {
                return Err(invalid("must be non-negative"));
            }
            Ok(Some(FieldValue::Integer(parsed)))
        }
        FieldKind::Real => {
            let parsed: f64 = trimmed.parse().map_err(|_| invalid("expected a number"))?;
            if !parsed.is_finite() {
                return Err(invalid("must be a finite number"));
            }
            if parsed < 0.0 {
                return Err(invalid("must be non-negative"));
            }
            Ok(Some(FieldValue::Real(parsed)))
        }
    }
}

/// Splits a comma or semicolon separated list, dropping blank entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
