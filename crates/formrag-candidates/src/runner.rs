//! Model-invocation capability.
//!
//! A [`ModelRunner`] turns an image plus a prompt into generated text. The
//! caller picks the implementation when constructing an extractor:
//! [`StubRunner`] for smoke tests, [`FnRunner`] to wrap any closure that
//! talks to a real model.

use std::path::Path;

use crate::error::Result;

/// Fixed output of [`StubRunner`].
pub const STUB_OUTPUT: &str = "Symptoms, Duration, Tacroz 0.1% oint bd, Xyzal tab";

/// Generates text from an image and a prompt.
pub trait ModelRunner: Send + Sync {
    fn generate(&self, image: &Path, prompt: &str) -> Result<String>;
}

/// Runner that ignores its input and returns [`STUB_OUTPUT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StubRunner;

impl ModelRunner for StubRunner {
    fn generate(&self, image: &Path, _prompt: &str) -> Result<String> {
        tracing::debug!(event = "runner.stub", image = %image.display());
        Ok(STUB_OUTPUT.to_string())
    }
}

/// Adapts a closure into a [`ModelRunner`].
pub struct FnRunner<F> {
    f: F,
}

impl<F> FnRunner<F>
where
    F: Fn(&Path, &str) -> Result<String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ModelRunner for FnRunner<F>
where
    F: Fn(&Path, &str) -> Result<String> + Send + Sync,
{
    fn generate(&self, image: &Path, prompt: &str) -> Result<String> {
        (self.f)(image, prompt)
    }
}

impl<R: ModelRunner + ?Sized> ModelRunner for Box<R> {
    fn generate(&self, image: &Path, prompt: &str) -> Result<String> {
        (**self).generate(image, prompt)
    }
}
