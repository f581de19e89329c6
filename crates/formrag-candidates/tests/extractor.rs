use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use formrag_candidates::{CandidateError, CandidateExtractor, FnRunner, ModelRunner, StubRunner};

#[test]
fn stub_extraction_yields_normalized_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("page1.png");
    std::fs::write(&image, b"not really a png").unwrap();

    let tokens = CandidateExtractor::stub().extract_candidates(&image).unwrap();
    assert_eq!(
        tokens,
        vec!["symptoms", "duration", "tacroz 0.1% oint bd", "xyzal tab"]
    );
}

#[test]
fn stub_does_not_touch_the_image() {
    let tokens = CandidateExtractor::new(StubRunner)
        .extract_candidates(Path::new("/nonexistent/page.png"))
        .unwrap();
    assert_eq!(tokens.len(), 4);
}

#[test]
fn runner_is_called_once_per_page() {
    let calls = AtomicUsize::new(0);
    let runner = FnRunner::new(|_: &Path, _: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok("- Hb\n- ESR\n- hb".to_string())
    });
    let extractor = CandidateExtractor::new(runner);

    let first = extractor.extract_candidates(Path::new("a.png")).unwrap();
    let second = extractor.extract_candidates(Path::new("b.png")).unwrap();
    assert_eq!(first, vec!["hb", "esr"]);
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn file_extraction_rejects_missing_image_before_running_model() {
    let calls = AtomicUsize::new(0);
    let runner = FnRunner::new(|_: &Path, _: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok("Hb".to_string())
    });
    let extractor = CandidateExtractor::new(runner);
    let dir = tempfile::tempdir().unwrap();

    let err = extractor
        .extract_from_file(&dir.path().join("missing.png"))
        .unwrap_err();
    assert!(matches!(err, CandidateError::ImageNotFound(_)));
    // A directory is not an image either.
    assert!(extractor.extract_from_file(dir.path()).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let image = dir.path().join("page.png");
    std::fs::write(&image, b"png").unwrap();
    assert_eq!(extractor.extract_from_file(&image).unwrap(), vec!["hb"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn runner_failure_propagates() {
    let runner = FnRunner::new(|image: &Path, _: &str| {
        Err(CandidateError::ImageNotFound(image.display().to_string()))
    });
    let err = CandidateExtractor::new(runner)
        .extract_candidates(Path::new("missing.png"))
        .unwrap_err();
    assert!(matches!(err, CandidateError::ImageNotFound(ref p) if p == "missing.png"));
}

#[test]
fn boxed_runner_can_back_an_extractor() {
    let runner: Box<dyn ModelRunner> = Box::new(StubRunner);
    let tokens = CandidateExtractor::new(runner)
        .extract_candidates(Path::new("x.png"))
        .unwrap();
    assert_eq!(tokens[0], "symptoms");
}
