//! Knowledge-card records as they appear on disk.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque policy, abbreviation or range card: one JSON object per file.
pub type Card = Map<String, Value>;

/// The kind of knowledge card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Field,
    Policy,
    Abbreviation,
    Range,
    Lexicon,
}

impl CardKind {
    /// Kinds stored one-file-per-card, in load order.
    pub const DIRECTORY_KINDS: [CardKind; 4] = [
        CardKind::Policy,
        CardKind::Abbreviation,
        CardKind::Range,
        CardKind::Lexicon,
    ];
}

impl std::fmt::Display for CardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field => write!(f, "field"),
            Self::Policy => write!(f, "policy"),
            Self::Abbreviation => write!(f, "abbreviation"),
            Self::Range => write!(f, "range"),
            Self::Lexicon => write!(f, "lexicon"),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Tolerant readers for hand-edited card attributes.
///
/// A card is only rejected for a missing or unusable name; odd attribute
/// shapes are coerced instead.
mod lenient {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    use super::LexiconEntry;

    fn scalar_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// `null` reads as empty, a lone value as a one-item list.
    pub fn values<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Value>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            other => vec![other],
        })
    }

    /// Scalars as text; nested arrays and objects are dropped.
    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(values(d)?.iter().filter_map(scalar_text).collect())
    }

    pub fn scalar<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(scalar_text(&Value::deserialize(d)?))
    }

    /// Only a string counts; anything else reads as absent.
    pub fn string_only<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    pub fn name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Value::deserialize(d)?;
        scalar_text(&value)
            .ok_or_else(|| D::Error::custom(format!("canonical_name must be a scalar, got {value}")))
    }

    /// Entries that are not objects are skipped.
    pub fn entries<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<LexiconEntry>, D::Error> {
        Ok(values(d)?
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }
}

/// One extractable form field, parsed from a line of `field_cards.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCard {
    #[serde(deserialize_with = "lenient::name")]
    pub canonical_name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient::scalar")]
    pub field_type: Option<String>,
    /// Scalar synonyms as text; other shapes are dropped.
    #[serde(default, deserialize_with = "lenient::strings")]
    pub synonyms: Vec<String>,
    #[serde(default, deserialize_with = "lenient::values")]
    pub cuewords: Vec<Value>,
    /// Extraction patterns, usually regex strings.
    #[serde(default, deserialize_with = "lenient::values")]
    pub patterns: Vec<Value>,
    /// Normalization rules; opaque to the store.
    #[serde(default = "empty_object")]
    pub normalization: Value,
    /// Valid-value ranges; opaque to the store.
    #[serde(default = "empty_object")]
    pub ranges: Value,
    /// Attributes not modelled above, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldCard {
    /// Minimal card with only a canonical name.
    pub fn named(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            field_type: None,
            synonyms: Vec::new(),
            cuewords: Vec::new(),
            patterns: Vec::new(),
            normalization: empty_object(),
            ranges: empty_object(),
            extra: Map::new(),
        }
    }

    pub fn with_type(mut self, field_type: &str) -> Self {
        self.field_type = Some(field_type.to_string());
        self
    }

    pub fn with_synonyms(mut self, synonyms: &[&str]) -> Self {
        self.synonyms = synonyms.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Synonym keys as stored in the synonym index: trimmed, lowercased, non-empty.
    pub fn synonym_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.synonyms
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }
}

/// A canonical term and its known surface forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    #[serde(default, deserialize_with = "lenient::scalar")]
    pub canonical: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub variants: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LexiconEntry {
    pub fn new(canonical: &str, variants: &[&str]) -> Self {
        Self {
            canonical: Some(canonical.to_string()),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            extra: Map::new(),
        }
    }

    /// True if any variant, lowercased, is in `tokens` (expected lowercased).
    pub fn matches_any(&self, tokens: &HashSet<String>) -> bool {
        self.variants
            .iter()
            .any(|v| tokens.contains(&v.to_lowercase()))
    }
}

/// A lexicon card: ordered entries of canonical values and variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconCard {
    /// Same rule as [`card_key`]: a non-string id reads as absent.
    #[serde(default, deserialize_with = "lenient::string_only")]
    pub card_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::entries")]
    pub entries: Vec<LexiconEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Index key of a directory card: its own string `card_id`, else the file stem.
pub fn card_key(card: &Card, path: &Path) -> String {
    match card.get("card_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
