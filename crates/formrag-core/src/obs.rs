//! Structured log events for store loading and context assembly.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! Verbosity follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use std::path::Path;

use tracing::{debug, info, warn};

use crate::cards::CardKind;

/// Emit event: store load completed.
pub fn emit_store_loaded(base_dir: &Path, fields: usize, synonyms: usize, skipped: usize) {
    info!(
        event = "store.loaded",
        base_dir = %base_dir.display(),
        fields = fields,
        synonyms = synonyms,
        skipped = skipped,
    );
}

/// Emit event: a card was skipped during load (warning level).
pub fn emit_card_skipped(kind: CardKind, source: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "store.card_skipped", kind = %kind, source = %source, reason = %reason);
}

/// Emit event: a card directory was absent and treated as empty.
pub fn emit_directory_absent(kind: CardKind, dir: &Path) {
    debug!(event = "store.directory_absent", kind = %kind, dir = %dir.display());
}

/// Emit event: a context payload was built.
pub fn emit_context_built(requested: usize, resolved: usize, lexicon_entries: Option<usize>) {
    debug!(
        event = "context.built",
        requested = requested,
        resolved = resolved,
        lexicon_entries = ?lexicon_entries,
    );
}

/// Emit event: a payload was serialized into prompt chunks.
pub fn emit_chunks_serialized(chunks: usize, estimated_tokens: usize) {
    debug!(
        event = "chunks.serialized",
        chunks = chunks,
        estimated_tokens = estimated_tokens,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_without_subscriber() {
        emit_store_loaded(Path::new("/tmp/cards"), 3, 5, 1);
        emit_card_skipped(CardKind::Policy, "policy/bad.json", &"expected value");
        emit_directory_absent(CardKind::Range, Path::new("/tmp/cards/range"));
        emit_context_built(2, 1, Some(4));
        emit_chunks_serialized(3, 120);
    }
}
