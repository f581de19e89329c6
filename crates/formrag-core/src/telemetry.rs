//! Log output for the `formrag` binary.
//!
//! Everything is written to stderr: stdout carries prompt chunks and model
//! output, which callers pipe into other tools.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the `level` argument.
const FORMRAG_TARGETS: [&str; 3] = ["formrag_core", "formrag_candidates", "formrag"];

/// Default filter: formrag crates at `level`, everything else at `warn`.
fn default_directives(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(FORMRAG_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.join(",")
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter. With `json`, each event is one
/// JSON object per line, so `store.card_skipped` diagnostics can be grepped by
/// their `event` field. Returns `false` if a subscriber was already installed.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let plain = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let structured = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .try_init()
        .is_ok()
}
