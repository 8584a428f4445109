//! Data models for the metadata tiers and the resolved view.

use super::fields::{split_list, FieldValue, MetadataField};
use serde::{Deserialize, Serialize};

/// Metadata as returned by an external provider adapter.
///
/// Maps 1:1 onto [`AgentRecord`]; `(source, external_id)` identifies it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderResult {
    pub source: String,
    #[serde(rename = "externalID", alias = "externalId")]
    pub external_id: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "coverURL", alias = "coverUrl")]
    pub cover_url: Option<String>,
    pub series_name: Option<String>,
    pub series_sequence: Option<String>,
    pub release_date: Option<String>,
    pub isbn: Option<String>,
    pub asin: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub duration_sec: Option<i64>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub genres: Vec<String>,
}

/// Shared provider record. Many catalog items may reference the same one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: i64,
    #[serde(flatten)]
    pub data: ProviderResult,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AgentRecord {
    pub fn field_value(&self, field: MetadataField) -> Option<FieldValue> {
        let d = &self.data;
        match field {
            MetadataField::Title => FieldValue::text(&d.title),
            MetadataField::Subtitle => FieldValue::text(&d.subtitle),
            MetadataField::Author => FieldValue::text(&d.author),
            MetadataField::Narrator => FieldValue::text(&d.narrator),
            MetadataField::Description => FieldValue::text(&d.description),
            MetadataField::CoverUrl => FieldValue::text(&d.cover_url),
            MetadataField::SeriesName => FieldValue::text(&d.series_name),
            MetadataField::SeriesSequence => FieldValue::text(&d.series_sequence),
            MetadataField::ReleaseDate => FieldValue::text(&d.release_date),
            MetadataField::Isbn => FieldValue::text(&d.isbn),
            MetadataField::Asin => FieldValue::text(&d.asin),
            MetadataField::Language => FieldValue::text(&d.language),
            MetadataField::Publisher => FieldValue::text(&d.publisher),
            MetadataField::Genres => Some(FieldValue::List(d.genres.clone())),
            MetadataField::DurationSec => d.duration_sec.map(FieldValue::Integer),
            MetadataField::Rating => d.rating.map(FieldValue::Real),
            MetadataField::RatingCount => d.rating_count.map(FieldValue::Integer),
        }
        .filter(|v| !v.is_empty())
    }
}

/// Raw tag values read from an item's media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddedRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub track: Option<String>,
    pub comment: Option<String>,
    #[serde(skip)]
    pub cover_data: Option<Vec<u8>>,
    pub cover_mime: Option<String>,
}

impl EmbeddedRecord {
    /// Album, track and cover art are kept for display but do not feed the cascade.
    pub fn field_value(&self, field: MetadataField) -> Option<FieldValue> {
        match field {
            MetadataField::Title => FieldValue::text(&self.title),
            MetadataField::Author => FieldValue::text(&self.author),
            MetadataField::Narrator => FieldValue::text(&self.narrator),
            MetadataField::Description => FieldValue::text(&self.comment),
            MetadataField::ReleaseDate => FieldValue::text(&self.year),
            MetadataField::Genres => self
                .genre
                .as_deref()
                .map(|g| FieldValue::List(split_list(g)))
                .filter(|v| !v.is_empty()),
            _ => None,
        }
    }
}

/// A per-item override. Only locked entries exist; unlocking deletes the row.
///
/// `value` is always defined while locked. An empty string is a deliberate
/// "locked to empty" that suppresses every lower tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub field: MetadataField,
    pub value: String,
    pub locked: bool,
}

/// One entry of a batch mutation, as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOverride {
    pub value: Option<String>,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub agent_record_id: Option<i64>,
    pub created_at: i64,
}

/// Unmerged per-tier view of an item, for provenance display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataLayers {
    pub item_id: String,
    pub agent: Option<AgentRecord>,
    pub embedded: Option<EmbeddedRecord>,
    pub custom: Vec<CustomField>,
}

impl MetadataLayers {
    pub fn custom_field(&self, field: MetadataField) -> Option<&CustomField> {
        self.custom.iter().find(|c| c.field == field)
    }
}

/// The effective record for an item. Recomputed on every read, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMetadata {
    // Agent bookkeeping, passed through verbatim.
    pub agent_id: Option<i64>,
    pub source: Option<String>,
    #[serde(rename = "externalID")]
    pub external_id: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,

    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "coverURL")]
    pub cover_url: Option<String>,
    pub series_name: Option<String>,
    pub series_sequence: Option<String>,
    pub release_date: Option<String>,
    pub isbn: Option<String>,
    pub asin: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub genres: Vec<String>,
    pub duration_sec: Option<i64>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
}

impl ResolvedMetadata {
    pub fn get(&self, field: MetadataField) -> Option<FieldValue> {
        match field {
            MetadataField::Title => FieldValue::text(&self.title),
            MetadataField::Subtitle => FieldValue::text(&self.subtitle),
            MetadataField::Author => FieldValue::text(&self.author),
            MetadataField::Narrator => FieldValue::text(&self.narrator),
            MetadataField::Description => FieldValue::text(&self.description),
            MetadataField::CoverUrl => FieldValue::text(&self.cover_url),
            MetadataField::SeriesName => FieldValue::text(&self.series_name),
            MetadataField::SeriesSequence => FieldValue::text(&self.series_sequence),
            MetadataField::ReleaseDate => FieldValue::text(&self.release_date),
            MetadataField::Isbn => FieldValue::text(&self.isbn),
            MetadataField::Asin => FieldValue::text(&self.asin),
            MetadataField::Language => FieldValue::text(&self.language),
            MetadataField::Publisher => FieldValue::text(&self.publisher),
            MetadataField::Genres => {
                Some(FieldValue::List(self.genres.clone())).filter(|v| !v.is_empty())
            }
            MetadataField::DurationSec => self.duration_sec.map(FieldValue::Integer),
            MetadataField::Rating => self.rating.map(FieldValue::Real),
            MetadataField::RatingCount => self.rating_count.map(FieldValue::Integer),
        }
    }

    /// Stores `value` into `field`. A value whose shape does not match the
    /// field's kind leaves the field empty.
    pub(crate) fn set(&mut self, field: MetadataField, value: Option<FieldValue>) {
        let text = match &value {
            Some(FieldValue::Text(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        };
        match field {
            MetadataField::Title => self.title = text,
            MetadataField::Subtitle => self.subtitle = text,
            MetadataField::Author => self.author = text,
            MetadataField::Narrator => self.narrator = text,
            MetadataField::Description => self.description = text,
            MetadataField::CoverUrl => self.cover_url = text,
            MetadataField::SeriesName => self.series_name = text,
            MetadataField::SeriesSequence => self.series_sequence = text,
            MetadataField::ReleaseDate => self.release_date = text,
            MetadataField::Isbn => self.isbn = text,
            MetadataField::Asin => self.asin = text,
            MetadataField::Language => self.language = text,
            MetadataField::Publisher => self.publisher = text,
            MetadataField::Genres => {
                self.genres = match value {
                    Some(FieldValue::List(items)) => items,
                    _ => Vec::new(),
                }
            }
            MetadataField::DurationSec => {
                self.duration_sec = match value {
                    Some(FieldValue::Integer(i)) => Some(i),
                    _ => None,
                }
            }
            MetadataField::Rating => {
                self.rating = match value {
                    Some(FieldValue::Real(r)) => Some(r),
                    _ => None,
                }
            }
            MetadataField::RatingCount => {
                self.rating_count = match value {
                    Some(FieldValue::Integer(i)) => Some(i),
                    _ => None,
                }
            }
        }
    }
}
