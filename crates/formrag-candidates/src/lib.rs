//! Candidate token extraction for formrag
//!
//! Asks a vision-language model to list the headings, labels and medication
//! mentions visible on a form page, then normalizes the answer into page
//! tokens usable as a lexicon filter.

pub mod error;
pub mod normalize;
pub mod runner;

use std::path::Path;

use tracing::info;

pub use error::{CandidateError, Result};
pub use normalize::{default_prompt, normalize_tokens};
pub use runner::{FnRunner, ModelRunner, StubRunner, STUB_OUTPUT};

/// Runs a [`ModelRunner`] over a page image and normalizes its output.
pub struct CandidateExtractor<R> {
    runner: R,
    prompt: String,
}

impl CandidateExtractor<StubRunner> {
    /// Extractor backed by [`StubRunner`].
    pub fn stub() -> Self {
        Self::new(StubRunner)
    }
}

impl<R: ModelRunner> CandidateExtractor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            prompt: default_prompt().to_string(),
        }
    }

    /// Replace the instruction sent with each image.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Generate and normalize candidate tokens for one page image.
    pub fn extract_candidates(&self, image: &Path) -> Result<Vec<String>> {
        let raw = self.runner.generate(image, &self.prompt)?;
        let tokens = normalize_tokens(&raw);
        info!(
            event = "candidates.extracted",
            image = %image.display(),
            tokens = tokens.len()
        );
        Ok(tokens)
    }

    /// Like [`extract_candidates`](Self::extract_candidates), but fails with
    /// [`CandidateError::ImageNotFound`] unless `image` is an existing file.
    pub fn extract_from_file(&self, image: &Path) -> Result<Vec<String>> {
        if !image.is_file() {
            return Err(CandidateError::ImageNotFound(image.display().to_string()));
        }
        self.extract_candidates(image)
    }
}
