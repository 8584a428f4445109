//! Merges the metadata tiers of one catalog item into its effective record.
//!
//! Per field: a locked custom entry always wins, even when its value is empty.
//! Otherwise the fallback tiers are scanned in their configured order and the
//! first non-empty value is taken. The resolver holds no state besides that
//! order, so identical inputs always produce identical output.

use super::fields::{parse_custom, FieldValue, MetadataField};
use super::models::{AgentRecord, CustomField, EmbeddedRecord, MetadataLayers, ResolvedMetadata};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A metadata source, ranked by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Custom,
    Agent,
    Embedded,
    /// Derived from file names. No store feeds it yet.
    Parsed,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Custom => "custom",
            Tier::Agent => "agent",
            Tier::Embedded => "embedded",
            Tier::Parsed => "parsed",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "custom" => Ok(Tier::Custom),
            "agent" => Ok(Tier::Agent),
            "embedded" => Ok(Tier::Embedded),
            "parsed" => Ok(Tier::Parsed),
            other => bail!("Unknown metadata tier '{}'", other),
        }
    }
}

/// Where a resolved field's value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "lowercase")]
pub enum FieldSource {
    Custom,
    Agent { source: String },
    Embedded,
    Parsed,
}

impl FieldSource {
    /// Human readable provenance, e.g. "from audible".
    pub fn label(&self) -> String {
        match self {
            FieldSource::Custom => "Custom".to_string(),
            FieldSource::Agent { source } => format!("from {}", source),
            FieldSource::Embedded => "from file tags".to_string(),
            FieldSource::Parsed => "from file name".to_string(),
        }
    }
}

/// Resolved record plus the tier each non-empty field came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub metadata: ResolvedMetadata,
    pub sources: BTreeMap<MetadataField, FieldSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    fallback_tiers: Vec<Tier>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            fallback_tiers: vec![Tier::Agent, Tier::Embedded],
        }
    }
}

impl Resolver {
    /// Builds a resolver scanning `fallback_tiers` in order after the custom tier.
    pub fn new(fallback_tiers: Vec<Tier>) -> Result<Self> {
        for (i, tier) in fallback_tiers.iter().enumerate() {
            if *tier == Tier::Custom {
                bail!("The custom tier always ranks first and cannot be a fallback tier");
            }
            if fallback_tiers[..i].contains(tier) {
                bail!("Fallback tier '{}' is listed more than once", tier);
            }
        }
        Ok(Self { fallback_tiers })
    }

    pub fn fallback_tiers(&self) -> &[Tier] {
        &self.fallback_tiers
    }

    pub fn resolve(
        &self,
        agent: Option<&AgentRecord>,
        embedded: Option<&EmbeddedRecord>,
        custom: &[CustomField],
    ) -> ResolvedMetadata {
        self.resolve_with_sources(agent, embedded, custom).metadata
    }

    pub fn resolve_layers(&self, layers: &MetadataLayers) -> Resolution {
        self.resolve_with_sources(
            layers.agent.as_ref(),
            layers.embedded.as_ref(),
            &layers.custom,
        )
    }

    pub fn resolve_with_sources(
        &self,
        agent: Option<&AgentRecord>,
        embedded: Option<&EmbeddedRecord>,
        custom: &[CustomField],
    ) -> Resolution {
        let mut metadata = ResolvedMetadata::default();
        if let Some(agent) = agent {
            metadata.agent_id = Some(agent.id);
            metadata.source = Some(agent.data.source.clone());
            metadata.external_id = Some(agent.data.external_id.clone());
            metadata.created_at = Some(agent.created_at);
            metadata.updated_at = Some(agent.updated_at);
        }

        let mut sources = BTreeMap::new();
        for field in MetadataField::ALL {
            if let Some((value, source)) = self.effective(field, agent, embedded, custom) {
                metadata.set(field, value);
                sources.insert(field, source);
            }
        }
        Resolution { metadata, sources }
    }

    /// The value `field` resolves to right now, as used for lock snapshots.
    pub fn effective_value(
        &self,
        field: MetadataField,
        agent: Option<&AgentRecord>,
        embedded: Option<&EmbeddedRecord>,
        custom: &[CustomField],
    ) -> Option<FieldValue> {
        self.effective(field, agent, embedded, custom)
            .and_then(|(value, _)| value)
    }

    fn effective(
        &self,
        field: MetadataField,
        agent: Option<&AgentRecord>,
        embedded: Option<&EmbeddedRecord>,
        custom: &[CustomField],
    ) -> Option<(Option<FieldValue>, FieldSource)> {
        if let Some(entry) = custom.iter().find(|c| c.field == field && c.locked) {
            let value = parse_custom(field, &entry.value).unwrap_or_else(|e| {
                warn!("Ignoring malformed custom value: {}", e);
                None
            });
            return Some((value, FieldSource::Custom));
        }

        self.fallback_tiers.iter().find_map(|tier| {
            let (value, source) = match tier {
                Tier::Agent => {
                    let agent = agent?;
                    (
                        agent.field_value(field),
                        FieldSource::Agent {
                            source: agent.data.source.clone(),
                        },
                    )
                }
                Tier::Embedded => (embedded?.field_value(field), FieldSource::Embedded),
                Tier::Parsed | Tier::Custom => return None,
            };
            value
                .filter(|v| !v.is_empty())
                .map(|v| (Some(v), source))
        })
    }
}

/// Resolves with the default tier order (agent, then embedded).
pub fn resolve(
    agent: Option<&AgentRecord>,
    embedded: Option<&EmbeddedRecord>,
    custom: &[CustomField],
) -> ResolvedMetadata {
    Resolver::default().resolve(agent, embedded, custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::models::ProviderResult;

    fn agent(title: Option<&str>, author: Option<&str>) -> AgentRecord {
        AgentRecord {
            id: 7,
            data: ProviderResult {
                source: "audible".to_string(),
                external_id: "B000".to_string(),
                title: title.map(str::to_string),
                author: author.map(str::to_string),
                ..Default::default()
            },
            created_at: 1_700_000_000,
            updated_at: 1_700_000_100,
        }
    }

    fn locked(field: MetadataField, value: &str) -> CustomField {
        CustomField {
            field,
            value: value.to_string(),
            locked: true,
        }
    }

    #[test]
    fn test_all_inputs_absent_resolves_empty() {
        let resolved = resolve(None, None, &[]);
        assert_eq!(resolved, ResolvedMetadata::default());
    }

    #[test]
    fn test_locked_custom_beats_agent() {
        let agent = agent(Some("A"), Some("B"));
        let custom = vec![locked(MetadataField::Author, "C")];

        let resolved = resolve(Some(&agent), None, &custom);

        assert_eq!(resolved.title.as_deref(), Some("A"));
        assert_eq!(resolved.author.as_deref(), Some("C"));
        assert_eq!(resolved.narrator, None);
    }

    #[test]
    fn test_locked_empty_suppresses_lower_tiers() {
        let agent = agent(Some("A"), None);
        let custom = vec![locked(MetadataField::Title, "")];

        let resolution = Resolver::default().resolve_with_sources(Some(&agent), None, &custom);

        assert_eq!(resolution.metadata.title, None);
        assert_eq!(
            resolution.sources.get(&MetadataField::Title),
            Some(&FieldSource::Custom)
        );
    }

    #[test]
    fn test_unlocked_custom_entry_is_ignored() {
        let agent = agent(Some("A"), None);
        let custom = vec![CustomField {
            field: MetadataField::Title,
            value: "stale".to_string(),
            locked: false,
        }];

        let resolved = resolve(Some(&agent), None, &custom);
        assert_eq!(resolved.title.as_deref(), Some("A"));
    }

    #[test]
    fn test_embedded_fills_gaps_left_by_agent() {
        let agent = agent(Some("Agent Title"), Some("   "));
        let embedded = EmbeddedRecord {
            title: Some("Tag Title".to_string()),
            author: Some("Tag Author".to_string()),
            comment: Some("From the tags".to_string()),
            genre: Some("Fantasy; Epic".to_string()),
            ..Default::default()
        };

        let resolution =
            Resolver::default().resolve_with_sources(Some(&agent), Some(&embedded), &[]);

        let resolved = &resolution.metadata;
        assert_eq!(resolved.title.as_deref(), Some("Agent Title"));
        assert_eq!(resolved.author.as_deref(), Some("Tag Author"));
        assert_eq!(resolved.description.as_deref(), Some("From the tags"));
        assert_eq!(resolved.genres, vec!["Fantasy", "Epic"]);
        assert_eq!(
            resolution.sources[&MetadataField::Title].label(),
            "from audible"
        );
        assert_eq!(
            resolution.sources[&MetadataField::Author].label(),
            "from file tags"
        );
    }

    #[test]
    fn test_tier_order_is_configurable() {
        let agent = agent(Some("Agent Title"), None);
        let embedded = EmbeddedRecord {
            title: Some("Tag Title".to_string()),
            ..Default::default()
        };
        let resolver = Resolver::new(vec![Tier::Embedded, Tier::Agent]).unwrap();

        let resolved = resolver.resolve(Some(&agent), Some(&embedded), &[]);
        assert_eq!(resolved.title.as_deref(), Some("Tag Title"));
    }

    #[test]
    fn test_parsed_tier_contributes_nothing_yet() {
        let resolver = Resolver::new(vec![Tier::Parsed, Tier::Agent]).unwrap();
        let agent = agent(Some("A"), None);

        let resolved = resolver.resolve(Some(&agent), None, &[]);
        assert_eq!(resolved.title.as_deref(), Some("A"));
    }

    #[test]
    fn test_new_rejects_custom_and_duplicates() {
        assert!(Resolver::new(vec![Tier::Custom]).is_err());
        assert!(Resolver::new(vec![Tier::Agent, Tier::Agent]).is_err());
        assert!(Resolver::new(vec![]).is_ok());
    }

    #[test]
    fn test_bookkeeping_passes_through() {
        let agent = agent(None, None);
        let custom = vec![locked(MetadataField::Title, "Mine")];

        let resolved = resolve(Some(&agent), None, &custom);

        assert_eq!(resolved.agent_id, Some(7));
        assert_eq!(resolved.source.as_deref(), Some("audible"));
        assert_eq!(resolved.external_id.as_deref(), Some("B000"));
        assert_eq!(resolved.created_at, Some(1_700_000_000));
        assert_eq!(resolved.updated_at, Some(1_700_000_100));
    }

    #[test]
    fn test_numeric_zero_is_kept_and_locked_empty_is_absent() {
        let mut with_numbers = agent(None, None);
        with_numbers.data.duration_sec = Some(0);
        with_numbers.data.rating = Some(4.2);
        with_numbers.data.rating_count = Some(12);
        let custom = vec![locked(MetadataField::Rating, "")];

        let resolved = resolve(Some(&with_numbers), None, &custom);

        assert_eq!(resolved.duration_sec, Some(0));
        assert_eq!(resolved.rating, None);
        assert_eq!(resolved.rating_count, Some(12));
    }

    #[test]
    fn test_locked_numeric_value() {
        let custom = vec![locked(MetadataField::DurationSec, "5400")];
        let resolved = resolve(None, None, &custom);
        assert_eq!(resolved.duration_sec, Some(5400));
    }

    #[test]
    fn test_resolve_is_pure() {
        let agent = agent(Some("Dune"), Some("Frank Herbert"));
        let embedded = EmbeddedRecord {
            narrator: Some("Scott Brick".to_string()),
            ..Default::default()
        };
        let custom = vec![locked(MetadataField::Subtitle, "Book One")];

        let first = resolve(Some(&agent), Some(&embedded), &custom);
        let second = resolve(Some(&agent), Some(&embedded), &custom);
        assert_eq!(first, second);
    }

    #[test]
    fn test_effective_value_snapshots_cascade() {
        let agent = agent(Some("Dune"), None);
        let resolver = Resolver::default();

        assert_eq!(
            resolver.effective_value(MetadataField::Title, Some(&agent), None, &[]),
            Some(FieldValue::Text("Dune".to_string()))
        );
        assert_eq!(
            resolver.effective_value(MetadataField::Narrator, Some(&agent), None, &[]),
            None
        );
    }
}
