//! formrag core library
//!
//! Loads knowledge cards (field definitions, policies, abbreviation tables,
//! value ranges, medication lexicons) from a card directory and assembles
//! the subset relevant to a set of form fields into ordered prompt chunks
//! for a vision-language model.
//!
//! Flow: [`KnowledgePaths`] → [`KnowledgeStore::load`] →
//! [`ContextAssembler::build_context`] → [`ContextAssembler::to_prompt_chunks`].

pub mod assembler;
pub mod cards;
pub mod config;
pub mod error;
pub mod obs;
pub mod paths;
pub mod sections;
pub mod store;
pub mod telemetry;

pub use assembler::{
    estimate_tokens, render_prompt, ChunkKind, ContextAssembler, ContextPayload, ContextRequest,
    PromptChunk, MEDS_TRIGGER_FIELDS,
};
pub use cards::{Card, CardKind, FieldCard, LexiconCard, LexiconEntry};
pub use config::{RagConfig, DEFAULT_MEDS_LEXICON_KEY, DEFAULT_MEDS_TOP_K};
pub use error::{RagError, Result};
pub use paths::{KnowledgePaths, FIELD_CARDS_FILE};
pub use sections::{fields_for_section, section_ids};
pub use store::{KnowledgeStore, LexiconSlice, LoadDiagnostic, LoadReport, LoadStatus};
pub use telemetry::init_tracing;

/// formrag version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
