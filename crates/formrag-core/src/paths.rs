//! Fixed on-disk layout of a knowledge-card directory.
//!
//! Layout: `<base>/field_cards.jsonl`, `<base>/{policy,abbr,range,lexicon}/*.json`.
//! Nothing here touches the filesystem; existence is checked by the store.

use std::path::{Path, PathBuf};

use crate::cards::CardKind;

/// Field-card index file name under the base directory.
pub const FIELD_CARDS_FILE: &str = "field_cards.jsonl";

/// Resolved paths of a knowledge-card directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgePaths {
    pub base_dir: PathBuf,
    pub field_cards: PathBuf,
    pub policy_dir: PathBuf,
    pub abbr_dir: PathBuf,
    pub range_dir: PathBuf,
    pub lexicon_dir: PathBuf,
}

impl KnowledgePaths {
    /// Derive every sub-path from `base`.
    pub fn from_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            base_dir: base.to_path_buf(),
            field_cards: base.join(FIELD_CARDS_FILE),
            policy_dir: base.join("policy"),
            abbr_dir: base.join("abbr"),
            range_dir: base.join("range"),
            lexicon_dir: base.join("lexicon"),
        }
    }

    /// Directory holding cards of `kind`. `None` for field cards, which live in one file.
    pub fn dir_for(&self, kind: CardKind) -> Option<&Path> {
        match kind {
            CardKind::Field => None,
            CardKind::Policy => Some(&self.policy_dir),
            CardKind::Abbreviation => Some(&self.abbr_dir),
            CardKind::Range => Some(&self.range_dir),
            CardKind::Lexicon => Some(&self.lexicon_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_base_layout() {
        let p = KnowledgePaths::from_base("/data/cards");
        assert_eq!(p.base_dir, PathBuf::from("/data/cards"));
        assert_eq!(p.field_cards, PathBuf::from("/data/cards/field_cards.jsonl"));
        assert_eq!(p.policy_dir, PathBuf::from("/data/cards/policy"));
        assert_eq!(p.abbr_dir, PathBuf::from("/data/cards/abbr"));
        assert_eq!(p.range_dir, PathBuf::from("/data/cards/range"));
        assert_eq!(p.lexicon_dir, PathBuf::from("/data/cards/lexicon"));
    }

    #[test]
    fn test_nonexistent_base_is_not_validated() {
        let p = KnowledgePaths::from_base("/definitely/not/here");
        assert!(!p.field_cards.exists());
    }

    #[test]
    fn test_dir_for_kind() {
        let p = KnowledgePaths::from_base("base");
        assert!(p.dir_for(CardKind::Field).is_none());
        assert_eq!(p.dir_for(CardKind::Lexicon), Some(Path::new("base/lexicon")));
        assert_eq!(p.dir_for(CardKind::Abbreviation), Some(Path::new("base/abbr")));
    }
}
