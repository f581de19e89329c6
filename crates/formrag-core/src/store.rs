//! On-disk knowledge store: loads field cards and card directories into
//! in-memory indices and serves read-only lookups.
//!
//! A store is built empty from explicit [`KnowledgePaths`] and populated by
//! [`KnowledgeStore::load`], which rebuilds every index from scratch. `load`
//! takes `&mut self`; once loaded, `&KnowledgeStore` can be shared freely.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cards::{card_key, Card, CardKind, FieldCard, LexiconCard, LexiconEntry};
use crate::error::{RagError, Result};
use crate::obs;
use crate::paths::KnowledgePaths;

/// Outcome of loading one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    /// Indexed under `key`.
    Loaded { key: String },
    /// Not valid JSON, not an object, or not the expected shape.
    Malformed { reason: String },
    /// Parsed, but a required attribute is absent or empty.
    MissingField { field: String },
}

impl LoadStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded { key } => write!(f, "loaded as {key}"),
            Self::Malformed { reason } => write!(f, "skipped: malformed ({reason})"),
            Self::MissingField { field } => write!(f, "skipped: missing required field {field}"),
        }
    }
}

/// Load outcome for a single field-card line or card file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDiagnostic {
    pub kind: CardKind,
    /// `path:line` for field cards, the file path otherwise.
    pub source: String,
    pub status: LoadStatus,
}

/// Everything that happened during one [`KnowledgeStore::load`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub base_dir: PathBuf,
    pub loaded_at: DateTime<Utc>,
    pub diagnostics: Vec<LoadDiagnostic>,
}

impl LoadReport {
    fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            loaded_at: Utc::now(),
            diagnostics: Vec::new(),
        }
    }

    fn record(&mut self, kind: CardKind, source: String, status: LoadStatus) {
        if !status.is_loaded() {
            obs::emit_card_skipped(kind, &source, &status);
        }
        self.diagnostics.push(LoadDiagnostic {
            kind,
            source,
            status,
        });
    }

    /// Number of records successfully indexed.
    pub fn loaded_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.status.is_loaded())
            .count()
    }

    /// Records that were skipped, in load order.
    pub fn skipped(&self) -> Vec<&LoadDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| !d.status.is_loaded())
            .collect()
    }

    /// Loaded records of one kind.
    pub fn loaded_of(&self, kind: CardKind) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == kind && d.status.is_loaded())
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.iter().all(|d| d.status.is_loaded())
    }
}

/// A lexicon card reduced to selected entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexiconSlice {
    pub card_id: Option<String>,
    pub entries: Vec<LexiconEntry>,
}

impl LexiconSlice {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// In-memory indices over a knowledge-card directory.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    paths: KnowledgePaths,
    fields_by_name: HashMap<String, FieldCard>,
    fields_by_synonym: HashMap<String, BTreeSet<String>>,
    policies: BTreeMap<String, Card>,
    abbreviations: BTreeMap<String, Card>,
    ranges: BTreeMap<String, Card>,
    lexicons: BTreeMap<String, LexiconCard>,
}

impl KnowledgeStore {
    /// Create an empty store. Nothing is read until [`load`](Self::load).
    pub fn new(paths: KnowledgePaths) -> Self {
        Self {
            paths,
            fields_by_name: HashMap::new(),
            fields_by_synonym: HashMap::new(),
            policies: BTreeMap::new(),
            abbreviations: BTreeMap::new(),
            ranges: BTreeMap::new(),
            lexicons: BTreeMap::new(),
        }
    }

    /// Create and load a store in one step, discarding the report.
    pub fn open(paths: KnowledgePaths) -> Result<Self> {
        let mut store = Self::new(paths);
        store.load()?;
        Ok(store)
    }

    pub fn paths(&self) -> &KnowledgePaths {
        &self.paths
    }

    /// Clear and repopulate every index.
    ///
    /// Fails with [`RagError::FieldCardsNotFound`] if the field-card file is
    /// missing; the store is left empty in that case. Malformed records and
    /// missing card directories are not errors.
    pub fn load(&mut self) -> Result<LoadReport> {
        self.clear();
        let mut report = LoadReport::new(&self.paths.base_dir);

        self.load_field_cards(&mut report)?;
        for kind in CardKind::DIRECTORY_KINDS {
            self.load_directory(kind, &mut report)?;
        }

        obs::emit_store_loaded(
            &self.paths.base_dir,
            self.fields_by_name.len(),
            self.fields_by_synonym.len(),
            report.skipped().len(),
        );
        Ok(report)
    }

    fn clear(&mut self) {
        self.fields_by_name.clear();
        self.fields_by_synonym.clear();
        self.policies.clear();
        self.abbreviations.clear();
        self.ranges.clear();
        self.lexicons.clear();
    }

    fn load_field_cards(&mut self, report: &mut LoadReport) -> Result<()> {
        let path = &self.paths.field_cards;
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RagError::FieldCardsNotFound { path: path.clone() }
            } else {
                RagError::Io(e)
            }
        })?;

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let source = format!("{}:{}", path.display(), idx + 1);
            match parse_field_card(line) {
                Ok(card) => {
                    let key = card.canonical_name.clone();
                    // Last line wins for duplicate canonical names.
                    self.fields_by_name.insert(key.clone(), card);
                    report.record(CardKind::Field, source, LoadStatus::Loaded { key });
                }
                Err(status) => report.record(CardKind::Field, source, status),
            }
        }

        self.rebuild_synonym_index();
        Ok(())
    }

    /// Synonym index is derived from the surviving field cards only.
    fn rebuild_synonym_index(&mut self) {
        self.fields_by_synonym.clear();
        for (name, card) in &self.fields_by_name {
            for key in card.synonym_keys() {
                self.fields_by_synonym
                    .entry(key)
                    .or_default()
                    .insert(name.clone());
            }
        }
    }

    fn load_directory(&mut self, kind: CardKind, report: &mut LoadReport) -> Result<()> {
        let Some(dir) = self.paths.dir_for(kind).map(Path::to_path_buf) else {
            return Ok(());
        };
        if !dir.is_dir() {
            obs::emit_directory_absent(kind, &dir);
            return Ok(());
        }

        for path in json_files(&dir)? {
            let source = path.display().to_string();
            let card = match parse_card_file(&path) {
                Ok(card) => card,
                Err(status) => {
                    report.record(kind, source, status);
                    continue;
                }
            };
            let key = card_key(&card, &path);
            let status = self.insert_card(kind, key.clone(), card);
            report.record(kind, source, status);
        }
        Ok(())
    }

    fn insert_card(&mut self, kind: CardKind, key: String, card: Card) -> LoadStatus {
        match kind {
            CardKind::Policy => {
                self.policies.insert(key.clone(), card);
            }
            CardKind::Abbreviation => {
                self.abbreviations.insert(key.clone(), card);
            }
            CardKind::Range => {
                self.ranges.insert(key.clone(), card);
            }
            CardKind::Lexicon => match serde_json::from_value::<LexiconCard>(Value::Object(card)) {
                Ok(lexicon) => {
                    self.lexicons.insert(key.clone(), lexicon);
                }
                Err(e) => {
                    return LoadStatus::Malformed {
                        reason: e.to_string(),
                    }
                }
            },
            CardKind::Field => {
                return LoadStatus::Malformed {
                    reason: "field cards are loaded from the index file".to_string(),
                }
            }
        }
        LoadStatus::Loaded { key }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Field cards for every known name, in the caller's order. Unknown names are omitted.
    pub fn get_field_cards<S: AsRef<str>>(&self, names: &[S]) -> Vec<&FieldCard> {
        names
            .iter()
            .filter_map(|n| self.fields_by_name.get(n.as_ref()))
            .collect()
    }

    pub fn field_card(&self, name: &str) -> Option<&FieldCard> {
        self.fields_by_name.get(name)
    }

    /// Canonical names whose synonyms match any cue, case-insensitively after trimming.
    ///
    /// Set semantics; the result is sorted lexically and carries no relevance order.
    pub fn search_fields_by_synonyms<S: AsRef<str>>(&self, cues: &[S]) -> Vec<String> {
        let mut hits = BTreeSet::new();
        for cue in cues {
            let key = cue.as_ref().trim().to_lowercase();
            if let Some(names) = self.fields_by_synonym.get(&key) {
                hits.extend(names.iter().cloned());
            }
        }
        hits.into_iter().collect()
    }

    /// Select entries from the lexicon card `key`.
    ///
    /// Without tokens (or with an empty list) the first `top_k` entries are
    /// returned. With tokens, every entry having a variant equal to a token
    /// (case-insensitive) is returned, untruncated. When no entry matches,
    /// this falls back to the first `top_k` entries, so "no match" and "no
    /// filter" produce the same slice. A missing card yields an empty slice.
    pub fn slice_lexicon(
        &self,
        key: &str,
        include_tokens: Option<&[String]>,
        top_k: usize,
    ) -> LexiconSlice {
        let Some(card) = self.lexicons.get(key) else {
            return LexiconSlice::default();
        };
        let head = || card.entries.iter().take(top_k).cloned().collect::<Vec<_>>();

        let entries = match include_tokens {
            Some(tokens) if !tokens.is_empty() => {
                let wanted: HashSet<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
                let matched: Vec<LexiconEntry> = card
                    .entries
                    .iter()
                    .filter(|e| e.matches_any(&wanted))
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    head()
                } else {
                    matched
                }
            }
            _ => head(),
        };

        LexiconSlice {
            card_id: card.card_id.clone(),
            entries,
        }
    }

    pub fn policies(&self) -> &BTreeMap<String, Card> {
        &self.policies
    }

    pub fn abbreviations(&self) -> &BTreeMap<String, Card> {
        &self.abbreviations
    }

    pub fn ranges(&self) -> &BTreeMap<String, Card> {
        &self.ranges
    }

    pub fn lexicons(&self) -> &BTreeMap<String, LexiconCard> {
        &self.lexicons
    }

    pub fn lexicon(&self, key: &str) -> Option<&LexiconCard> {
        self.lexicons.get(key)
    }

    pub fn field_count(&self) -> usize {
        self.fields_by_name.len()
    }

    pub fn synonym_count(&self) -> usize {
        self.fields_by_synonym.len()
    }

    /// All canonical field names, sorted.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields_by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.fields_by_name.is_empty()
            && self.policies.is_empty()
            && self.abbreviations.is_empty()
            && self.ranges.is_empty()
            && self.lexicons.is_empty()
    }
}

fn parse_field_card(line: &str) -> std::result::Result<FieldCard, LoadStatus> {
    let value: Value = serde_json::from_str(line).map_err(|e| LoadStatus::Malformed {
        reason: e.to_string(),
    })?;
    let Value::Object(obj) = &value else {
        return Err(LoadStatus::Malformed {
            reason: "expected a JSON object".to_string(),
        });
    };
    match obj.get("canonical_name") {
        None | Some(Value::Null) => {
            return Err(LoadStatus::MissingField {
                field: "canonical_name".to_string(),
            })
        }
        Some(Value::String(name)) if name.is_empty() => {
            return Err(LoadStatus::MissingField {
                field: "canonical_name".to_string(),
            })
        }
        _ => {}
    }
    serde_json::from_value(value).map_err(|e| LoadStatus::Malformed {
        reason: e.to_string(),
    })
}

fn parse_card_file(path: &Path) -> std::result::Result<Card, LoadStatus> {
    let text = fs::read_to_string(path).map_err(|e| LoadStatus::Malformed {
        reason: e.to_string(),
    })?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(card)) => Ok(card),
        Ok(_) => Err(LoadStatus::Malformed {
            reason: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(LoadStatus::Malformed {
            reason: e.to_string(),
        }),
    }
}

/// `*.json` files directly under `dir`, sorted by path.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
