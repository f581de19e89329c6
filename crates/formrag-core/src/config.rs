//! Runtime configuration for store location and context assembly defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::paths::KnowledgePaths;

/// Default medication lexicon card.
pub const DEFAULT_MEDS_LEXICON_KEY: &str = "lexicon/meds_observed:v1";

/// Default number of lexicon entries when no filter applies.
pub const DEFAULT_MEDS_TOP_K: usize = 12;

/// Configuration shared by the store and the context assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagConfig {
    /// Base directory of the knowledge cards.
    pub cards_dir: PathBuf,
    pub meds_lexicon_key: String,
    pub meds_top_k: usize,
    pub include_abbreviations: bool,
    pub include_policies: bool,
    pub include_ranges: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            cards_dir: PathBuf::from("cards"),
            meds_lexicon_key: DEFAULT_MEDS_LEXICON_KEY.to_string(),
            meds_top_k: DEFAULT_MEDS_TOP_K,
            include_abbreviations: true,
            include_policies: true,
            include_ranges: true,
        }
    }
}

impl RagConfig {
    /// Config rooted at `cards_dir` with default assembly settings.
    pub fn new(cards_dir: impl AsRef<Path>) -> Self {
        Self {
            cards_dir: cards_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Create from environment variables.
    ///
    /// Reads:
    /// - FORMRAG_CARDS_DIR (optional, default: "cards")
    /// - FORMRAG_MEDS_LEXICON (optional, default: "lexicon/meds_observed:v1")
    /// - FORMRAG_MEDS_TOP_K (optional, default: 12)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup("FORMRAG_CARDS_DIR") {
            config.cards_dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("FORMRAG_MEDS_LEXICON") {
            config.meds_lexicon_key = key;
        }
        if let Some(raw) = lookup("FORMRAG_MEDS_TOP_K") {
            config.meds_top_k = raw.trim().parse().map_err(|_| {
                RagError::InvalidConfig(format!(
                    "FORMRAG_MEDS_TOP_K must be a non-negative integer, got {raw:?}"
                ))
            })?;
        }
        Ok(config)
    }

    pub fn with_meds_lexicon(mut self, key: impl Into<String>) -> Self {
        self.meds_lexicon_key = key.into();
        self
    }

    pub fn with_meds_top_k(mut self, top_k: usize) -> Self {
        self.meds_top_k = top_k;
        self
    }

    pub fn with_abbreviations(mut self, include: bool) -> Self {
        self.include_abbreviations = include;
        self
    }

    pub fn with_policies(mut self, include: bool) -> Self {
        self.include_policies = include;
        self
    }

    pub fn with_ranges(mut self, include: bool) -> Self {
        self.include_ranges = include;
        self
    }

    /// Resolved knowledge-card paths.
    pub fn paths(&self) -> KnowledgePaths {
        KnowledgePaths::from_base(&self.cards_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = RagConfig::default();
        assert_eq!(c.meds_lexicon_key, "lexicon/meds_observed:v1");
        assert_eq!(c.meds_top_k, 12);
        assert!(c.include_abbreviations && c.include_policies && c.include_ranges);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let c = RagConfig::from_lookup(lookup_from(&[
            ("FORMRAG_CARDS_DIR", "/srv/cards"),
            ("FORMRAG_MEDS_LEXICON", "lexicon/meds:v2"),
            ("FORMRAG_MEDS_TOP_K", " 5 "),
        ]))
        .unwrap();
        assert_eq!(c.cards_dir, PathBuf::from("/srv/cards"));
        assert_eq!(c.meds_lexicon_key, "lexicon/meds:v2");
        assert_eq!(c.meds_top_k, 5);
        assert_eq!(c.paths().field_cards, PathBuf::from("/srv/cards/field_cards.jsonl"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_top_k() {
        let err = RagConfig::from_lookup(lookup_from(&[("FORMRAG_MEDS_TOP_K", "many")])).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder() {
        let c = RagConfig::new("/tmp/k")
            .with_meds_top_k(3)
            .with_policies(false)
            .with_ranges(false)
            .with_abbreviations(false)
            .with_meds_lexicon("lexicon/x");
        assert_eq!(c.cards_dir, PathBuf::from("/tmp/k"));
        assert_eq!(c.meds_top_k, 3);
        assert!(!c.include_policies && !c.include_ranges && !c.include_abbreviations);
        assert_eq!(c.meds_lexicon_key, "lexicon/x");
    }
}
