//! Context assembly: select knowledge for a set of target fields and
//! serialize it into ordered prompt chunks.
//!
//! Selection ([`ContextAssembler::build_context`]) copies whole card maps;
//! filtering by key happens only at serialization
//! ([`ContextAssembler::to_prompt_chunks`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cards::{Card, FieldCard};
use crate::config::{RagConfig, DEFAULT_MEDS_LEXICON_KEY, DEFAULT_MEDS_TOP_K};
use crate::error::Result;
use crate::obs;
use crate::sections::fields_for_section;
use crate::store::{KnowledgeStore, LexiconSlice};

/// Target fields that pull the medication lexicon into the payload.
pub const MEDS_TRIGGER_FIELDS: [&str; 3] = [
    "treatment_history",
    "followup_visits",
    "treatment_followup_notes",
];

const POLICY_KEY_TAGS: [&str; 3] = ["notation", "units", "date"];
const ABBREVIATION_KEY_TAG: &str = "dermatology";
const RANGE_KEY_TAGS: [&str; 3] = ["labs", "scorad", "anthro"];

const MAX_SYNONYMS: usize = 8;
const MAX_CUEWORDS: usize = 12;
const MAX_PATTERNS: usize = 2;

/// Parameters for one context assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRequest {
    pub target_fields: Vec<String>,
    pub page_tokens: Option<Vec<String>>,
    pub include_abbreviations: bool,
    pub include_policies: bool,
    pub include_ranges: bool,
    pub meds_lexicon_key: String,
    pub meds_top_k: usize,
}

impl ContextRequest {
    pub fn new<I, S>(target_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_fields: target_fields.into_iter().map(Into::into).collect(),
            page_tokens: None,
            include_abbreviations: true,
            include_policies: true,
            include_ranges: true,
            meds_lexicon_key: DEFAULT_MEDS_LEXICON_KEY.to_string(),
            meds_top_k: DEFAULT_MEDS_TOP_K,
        }
    }

    /// Request for every field of a section (empty for an unknown section).
    pub fn for_section(section: &str) -> Self {
        Self::new(fields_for_section(section).iter().copied())
    }

    /// Apply the assembly defaults from `config`.
    pub fn with_config(mut self, config: &RagConfig) -> Self {
        self.include_abbreviations = config.include_abbreviations;
        self.include_policies = config.include_policies;
        self.include_ranges = config.include_ranges;
        self.meds_lexicon_key = config.meds_lexicon_key.clone();
        self.meds_top_k = config.meds_top_k;
        self
    }

    pub fn with_page_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.page_tokens = Some(tokens.into_iter().map(Into::into).collect());
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

    pub fn with_meds_lexicon(mut self, key: impl Into<String>) -> Self {
        self.meds_lexicon_key = key.into();
        self
    }

    pub fn with_meds_top_k(mut self, top_k: usize) -> Self {
        self.meds_top_k = top_k;
        self
    }

    /// True if any target field is a treatment or follow-up field.
    pub fn wants_medications(&self) -> bool {
        self.target_fields
            .iter()
            .any(|f| MEDS_TRIGGER_FIELDS.contains(&f.as_str()))
    }
}

/// Knowledge selected for one request. Transient; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub field_cards: Vec<FieldCard>,
    pub policies: BTreeMap<String, Card>,
    pub abbreviations: BTreeMap<String, Card>,
    pub ranges: BTreeMap<String, Card>,
    /// At most one slice, keyed by the requested lexicon key.
    pub lexicon: BTreeMap<String, LexiconSlice>,
}

/// Section of the payload a chunk was serialized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    FieldCards,
    Policies,
    Abbreviations,
    Ranges,
    Lexicon,
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCards => write!(f, "field_cards"),
            Self::Policies => write!(f, "policies"),
            Self::Abbreviations => write!(f, "abbreviations"),
            Self::Ranges => write!(f, "ranges"),
            Self::Lexicon => write!(f, "lexicon"),
        }
    }
}

/// One self-contained JSON text block destined for the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptChunk {
    pub kind: ChunkKind,
    pub text: String,
    pub estimated_tokens: usize,
}

impl PromptChunk {
    fn new(kind: ChunkKind, text: String) -> Self {
        let estimated_tokens = estimate_tokens(&text);
        Self {
            kind,
            text,
            estimated_tokens,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// At most `max_chars` characters of the text.
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

impl std::fmt::Display for PromptChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Serialize)]
struct FieldCardDigest<'a> {
    canonical_name: &'a str,
    #[serde(rename = "type")]
    field_type: Option<&'a str>,
    synonyms: &'a [String],
    cuewords: &'a [Value],
    patterns: &'a [Value],
    normalization: &'a Value,
    ranges: &'a Value,
}

impl<'a> From<&'a FieldCard> for FieldCardDigest<'a> {
    fn from(card: &'a FieldCard) -> Self {
        Self {
            canonical_name: &card.canonical_name,
            field_type: card.field_type.as_deref(),
            synonyms: head(&card.synonyms, MAX_SYNONYMS),
            cuewords: head(&card.cuewords, MAX_CUEWORDS),
            patterns: head(&card.patterns, MAX_PATTERNS),
            normalization: &card.normalization,
            ranges: &card.ranges,
        }
    }
}

#[derive(Serialize)]
struct FieldCardsBlock<'a> {
    field_cards: Vec<FieldCardDigest<'a>>,
}

#[derive(Serialize)]
struct PoliciesBlock<'a> {
    policies: BTreeMap<&'a str, &'a Card>,
}

#[derive(Serialize)]
struct AbbreviationBlock<'a> {
    abbr: &'a Card,
}

#[derive(Serialize)]
struct RangesBlock<'a> {
    ranges: BTreeMap<&'a str, &'a Card>,
}

#[derive(Serialize)]
struct LexiconEntryDigest<'a> {
    canonical: Option<&'a str>,
    variants: &'a [String],
}

#[derive(Serialize)]
struct LexiconBlock<'a> {
    lexicon_key: &'a str,
    entries: Vec<LexiconEntryDigest<'a>>,
}

/// Selects knowledge from a loaded store and serializes it for a prompt.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler<'a> {
    store: &'a KnowledgeStore,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(store: &'a KnowledgeStore) -> Self {
        Self { store }
    }

    /// Build the payload for `request`.
    ///
    /// Field cards follow the request order with unknown names dropped.
    /// Enabled policy, abbreviation and range maps are copied whole. The
    /// medication lexicon slice is added only when a treatment or follow-up
    /// field is targeted, and inherits the fallback of
    /// [`KnowledgeStore::slice_lexicon`].
    pub fn build_context(&self, request: &ContextRequest) -> ContextPayload {
        let mut payload = ContextPayload {
            field_cards: self
                .store
                .get_field_cards(request.target_fields.as_slice())
                .into_iter()
                .cloned()
                .collect(),
            ..ContextPayload::default()
        };

        if request.include_policies {
            payload.policies = self.store.policies().clone();
        }
        if request.include_abbreviations {
            payload.abbreviations = self.store.abbreviations().clone();
        }
        if request.include_ranges {
            payload.ranges = self.store.ranges().clone();
        }

        let mut lexicon_entries = None;
        if request.wants_medications() {
            let slice = self.store.slice_lexicon(
                &request.meds_lexicon_key,
                request.page_tokens.as_deref(),
                request.meds_top_k,
            );
            lexicon_entries = Some(slice.entries.len());
            payload
                .lexicon
                .insert(request.meds_lexicon_key.clone(), slice);
        }

        obs::emit_context_built(
            request.target_fields.len(),
            payload.field_cards.len(),
            lexicon_entries,
        );
        payload
    }

    /// Serialize `payload` into chunks, in this order:
    /// field cards, filtered policies, dermatology abbreviation cards,
    /// filtered ranges, lexicon slices. Empty sections produce no chunk.
    pub fn to_prompt_chunks(&self, payload: &ContextPayload) -> Result<Vec<PromptChunk>> {
        let mut chunks = Vec::new();

        if !payload.field_cards.is_empty() {
            let block = FieldCardsBlock {
                field_cards: payload.field_cards.iter().map(FieldCardDigest::from).collect(),
            };
            chunks.push(PromptChunk::new(
                ChunkKind::FieldCards,
                serde_json::to_string(&block)?,
            ));
        }

        let policies = select_by_key(&payload.policies, &POLICY_KEY_TAGS);
        if !policies.is_empty() {
            chunks.push(PromptChunk::new(
                ChunkKind::Policies,
                serde_json::to_string(&PoliciesBlock { policies })?,
            ));
        }

        for (key, card) in &payload.abbreviations {
            if key.contains(ABBREVIATION_KEY_TAG) {
                chunks.push(PromptChunk::new(
                    ChunkKind::Abbreviations,
                    serde_json::to_string(&AbbreviationBlock { abbr: card })?,
                ));
            }
        }

        let ranges = select_by_key(&payload.ranges, &RANGE_KEY_TAGS);
        if !ranges.is_empty() {
            chunks.push(PromptChunk::new(
                ChunkKind::Ranges,
                serde_json::to_string(&RangesBlock { ranges })?,
            ));
        }

        for (key, slice) in &payload.lexicon {
            let block = LexiconBlock {
                lexicon_key: key,
                entries: slice
                    .entries
                    .iter()
                    .map(|e| LexiconEntryDigest {
                        canonical: e.canonical.as_deref(),
                        variants: &e.variants,
                    })
                    .collect(),
            };
            chunks.push(PromptChunk::new(
                ChunkKind::Lexicon,
                serde_json::to_string(&block)?,
            ));
        }

        obs::emit_chunks_serialized(
            chunks.len(),
            chunks.iter().map(|c| c.estimated_tokens).sum(),
        );
        Ok(chunks)
    }
}

/// Chunk texts followed by the instruction, separated by blank lines.
pub fn render_prompt(chunks: &[PromptChunk], instruction: &str) -> String {
    chunks
        .iter()
        .map(PromptChunk::as_str)
        .chain(std::iter::once(instruction))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Estimate token count from text (~4 chars per token heuristic).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

fn head<T>(items: &[T], n: usize) -> &[T] {
    &items[..items.len().min(n)]
}

/// Entries whose key contains any of `tags`.
fn select_by_key<'a>(cards: &'a BTreeMap<String, Card>, tags: &[&str]) -> BTreeMap<&'a str, &'a Card> {
    cards
        .iter()
        .filter(|(key, _)| tags.iter().any(|tag| key.contains(tag)))
        .map(|(key, card)| (key.as_str(), card))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::LexiconEntry;
    use crate::paths::KnowledgePaths;
    use serde_json::json;

    fn card(value: Value) -> Card {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn empty_store() -> KnowledgeStore {
        KnowledgeStore::new(KnowledgePaths::from_base("/unused"))
    }

    #[test]
    fn test_request_defaults() {
        let r = ContextRequest::new(["duration"]);
        assert_eq!(r.target_fields, vec!["duration"]);
        assert!(r.page_tokens.is_none());
        assert_eq!(r.meds_lexicon_key, "lexicon/meds_observed:v1");
        assert_eq!(r.meds_top_k, 12);
        assert!(!r.wants_medications());
    }

    #[test]
    fn test_request_for_section() {
        assert!(ContextRequest::for_section("history").wants_medications());
        assert!(ContextRequest::for_section("followups").wants_medications());
        assert!(!ContextRequest::for_section("scorad").wants_medications());
        assert!(ContextRequest::for_section("unknown").target_fields.is_empty());
    }

    #[test]
    fn test_request_with_config() {
        let cfg = RagConfig::new("/x").with_meds_top_k(4).with_ranges(false);
        let r = ContextRequest::new(["a"]).with_config(&cfg);
        assert_eq!(r.meds_top_k, 4);
        assert!(!r.include_ranges);
        assert!(r.include_policies);
    }

    #[test]
    fn test_field_card_chunk_truncates_lists() {
        let mut fc = FieldCard::named("symptoms").with_type("text");
        fc.synonyms = (0..10).map(|i| format!("s{i}")).collect();
        fc.cuewords = (0..15).map(|i| json!(format!("c{i}"))).collect();
        fc.patterns = vec![json!("p1"), json!("p2"), json!("p3")];
        fc.extra.insert("internal".into(), json!(true));
        let payload = ContextPayload {
            field_cards: vec![fc],
            ..ContextPayload::default()
        };

        let store = empty_store();
        let chunks = ContextAssembler::new(&store).to_prompt_chunks(&payload).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::FieldCards);

        let v: Value = serde_json::from_str(&chunks[0].text).unwrap();
        let c = &v["field_cards"][0];
        assert_eq!(c["canonical_name"], "symptoms");
        assert_eq!(c["type"], "text");
        assert_eq!(c["synonyms"].as_array().unwrap().len(), 8);
        assert_eq!(c["cuewords"].as_array().unwrap().len(), 12);
        assert_eq!(c["patterns"], json!(["p1", "p2"]));
        assert_eq!(c["normalization"], json!({}));
        assert!(c.get("internal").is_none());
    }

    #[test]
    fn test_policy_and_range_filters() {
        let mut payload = ContextPayload::default();
        payload.policies.insert("policy/units:v1".into(), card(json!({"u": 1})));
        payload.policies.insert("policy/date_format".into(), card(json!({"d": 1})));
        payload.policies.insert("policy/tone".into(), card(json!({"t": 1})));
        payload.ranges.insert("range/labs".into(), card(json!({"hb": [10, 17]})));
        payload.ranges.insert("range/vitals".into(), card(json!({"hr": [60, 100]})));
        payload.ranges.insert("range/anthro".into(), card(json!({"wt": [2, 120]})));

        let store = empty_store();
        let chunks = ContextAssembler::new(&store).to_prompt_chunks(&payload).unwrap();
        let kinds: Vec<ChunkKind> = chunks.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChunkKind::Policies, ChunkKind::Ranges]);

        let pol: Value = serde_json::from_str(&chunks[0].text).unwrap();
        let keys: Vec<&String> = pol["policies"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["policy/date_format", "policy/units:v1"]);

        let rng: Value = serde_json::from_str(&chunks[1].text).unwrap();
        assert_eq!(rng["ranges"].as_object().unwrap().len(), 2);
        assert!(rng["ranges"].get("range/vitals").is_none());
    }

    #[test]
    fn test_one_chunk_per_dermatology_abbreviation_card() {
        let mut payload = ContextPayload::default();
        payload
            .abbreviations
            .insert("abbr/dermatology:v1".into(), card(json!({"bd": "twice daily"})));
        payload
            .abbreviations
            .insert("abbr/dermatology_extra".into(), card(json!({"od": "once daily"})));
        payload
            .abbreviations
            .insert("abbr/general".into(), card(json!({"pt": "patient"})));

        let store = empty_store();
        let chunks = ContextAssembler::new(&store).to_prompt_chunks(&payload).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Abbreviations));
        let first: Value = serde_json::from_str(&chunks[0].text).unwrap();
        assert_eq!(first, json!({"abbr": {"bd": "twice daily"}}));
    }

    #[test]
    fn test_lexicon_chunk_drops_metadata() {
        let mut payload = ContextPayload::default();
        let mut entry = LexiconEntry::new("tacrolimus", &["tacroz"]);
        entry.extra.insert("class".into(), json!("calcineurin inhibitor"));
        payload.lexicon.insert(
            "lexicon/meds".into(),
            LexiconSlice {
                card_id: Some("lexicon/meds".into()),
                entries: vec![entry],
            },
        );

        let store = empty_store();
        let chunks = ContextAssembler::new(&store).to_prompt_chunks(&payload).unwrap();
        assert_eq!(chunks.len(), 1);
        let v: Value = serde_json::from_str(&chunks[0].text).unwrap();
        assert_eq!(
            v,
            json!({
                "lexicon_key": "lexicon/meds",
                "entries": [{"canonical": "tacrolimus", "variants": ["tacroz"]}]
            })
        );
    }

    #[test]
    fn test_empty_payload_has_no_chunks() {
        let store = empty_store();
        let chunks = ContextAssembler::new(&store)
            .to_prompt_chunks(&ContextPayload::default())
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_render_prompt_appends_instruction() {
        let chunks = vec![
            PromptChunk::new(ChunkKind::Policies, "{\"a\":1}".into()),
            PromptChunk::new(ChunkKind::Ranges, "{\"b\":2}".into()),
        ];
        assert_eq!(
            render_prompt(&chunks, "Extract the fields."),
            "{\"a\":1}\n\n{\"b\":2}\n\nExtract the fields."
        );
        assert_eq!(render_prompt(&[], "only"), "only");
    }

    #[test]
    fn test_preview_and_token_estimate() {
        let chunk = PromptChunk::new(ChunkKind::Lexicon, "abcdefghij".into());
        assert_eq!(chunk.estimated_tokens, 3);
        assert_eq!(chunk.preview(4), "abcd");
        assert_eq!(chunk.preview(100), "abcdefghij");
        assert_eq!(estimate_tokens(""), 0);
    }
}
