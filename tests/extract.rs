//! Integration tests for the whole extraction pipeline, driven through the
//! public API with scripted backends.

mod common;

use common::{write_pdf, FailAt, FlakyOnce, ReverseEcho, StructuredEcho};
use edgequake_pdf2txt::{
    ChunkMarker, ExtractionConfig, Extractor, ResponseFormat, Transcriber,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

fn markdown_config() -> ExtractionConfig {
    ExtractionConfig::builder()
        .chunk_size(2)
        .concurrency(4)
        .response_format(ResponseFormat::Markdown)
        .chunk_marker(ChunkMarker::None)
        .max_retries(0)
        .build()
        .unwrap()
}

fn extractor(t: impl Transcriber + 'static) -> Extractor {
    Extractor::with_transcriber(markdown_config(), Arc::new(t))
}

#[tokio::test]
async fn output_is_in_page_order_and_identical_across_runs() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "book.pdf", 7);

    let first = extractor(ReverseEcho)
        .extract_to_file(&input, dir.path().join("run1"))
        .await
        .unwrap();
    extractor(ReverseEcho)
        .extract_to_file(&input, dir.path().join("run2"))
        .await
        .unwrap();

    let a = std::fs::read(dir.path().join("run1/book.txt")).unwrap();
    let b = std::fs::read(dir.path().join("run2/book.txt")).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        String::from_utf8(a).unwrap(),
        "pages 1-2\n\npages 3-4\n\npages 5-6\n\npages 7\n"
    );
    assert_eq!(first.total_chunks, 4);
    assert_eq!(first.failed_chunks, 0);
}

#[tokio::test]
async fn failed_chunk_is_marked_in_place() {
    let out = extractor(FailAt::new([2]))
        .extract_bytes("five.pdf", common::sample_pdf(5))
        .await
        .unwrap();

    assert_eq!(
        out.transcript.text,
        "pages 1-2\n\n\
         [transcription failed for pages 3-4: authentication failed: bad key]\n\n\
         pages 5\n"
    );
    assert_eq!(out.stats.failed_chunks, 1);
    assert_eq!(out.stats.succeeded_chunks, 2);
    assert_eq!(out.transcript.failed_ranges.len(), 1);
    assert_eq!(out.transcript.failed_ranges[0].start, 2);
}

#[tokio::test]
async fn every_range_has_exactly_one_result_under_any_failure_pattern() {
    let bytes = common::sample_pdf(8);
    let starts = [0usize, 2, 4, 6];

    for mask in 0u32..16 {
        let failing: Vec<usize> = starts
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, s)| *s)
            .collect();
        let out = extractor(FailAt::new(failing.clone()))
            .extract_bytes("eight.pdf", bytes.clone())
            .await
            .unwrap();

        let got: Vec<usize> = out.chunks.iter().map(|c| c.range.start).collect();
        assert_eq!(got, starts, "mask {mask:04b}");
        assert_eq!(out.stats.failed_chunks, failing.len(), "mask {mask:04b}");
        assert_eq!(
            out.stats.succeeded_chunks + out.stats.failed_chunks,
            4,
            "mask {mask:04b}"
        );
        assert_eq!(out.transcript.ranges.len(), 4, "mask {mask:04b}");
    }
}

#[tokio::test]
async fn zero_page_document_writes_empty_file() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "blank.pdf", 0);

    let stats = extractor(ReverseEcho)
        .extract_to_file(&input, dir.path().join("out"))
        .await
        .unwrap();

    assert_eq!(stats.total_chunks, 0);
    let text = std::fs::read_to_string(dir.path().join("out/blank.txt")).unwrap();
    assert!(text.is_empty());
}

#[tokio::test]
async fn directory_run_reports_bad_file_and_finishes_the_rest() {
    let dir = TempDir::new().unwrap();
    let inputs = dir.path().join("in");
    std::fs::create_dir(&inputs).unwrap();
    write_pdf(&inputs, "a.pdf", 3);
    std::fs::write(inputs.join("b.pdf"), b"this is not a pdf").unwrap();
    write_pdf(&inputs, "c.pdf", 1);
    std::fs::write(inputs.join("notes.txt"), b"ignored").unwrap();
    let out_dir = dir.path().join("out");

    let report = extractor(ReverseEcho).run(&inputs, &out_dir).await.unwrap();

    let names: Vec<String> = report
        .documents
        .iter()
        .map(|d| d.input.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
    assert_eq!(report.failed_documents(), 1);
    assert!(report.documents[1]
        .error
        .as_deref()
        .unwrap()
        .contains("not a valid PDF"));

    assert_eq!(
        std::fs::read_to_string(out_dir.join("a.txt")).unwrap(),
        "pages 1-2\n\npages 3\n"
    );
    assert_eq!(std::fs::read_to_string(out_dir.join("c.txt")).unwrap(), "pages 1\n");
    assert!(!out_dir.join("b.txt").exists());
}

#[tokio::test]
async fn structured_answers_are_rendered_with_document_page_indices() {
    let config = ExtractionConfig::builder()
        .chunk_size(2)
        .chunk_marker(ChunkMarker::Comment)
        .build()
        .unwrap();
    let ex = Extractor::with_transcriber(config, Arc::new(StructuredEcho));

    let out = ex
        .extract_bytes("three.pdf", common::sample_pdf(3))
        .await
        .unwrap();

    assert_eq!(
        out.transcript.text,
        "<!-- pages 1-2 -->\n\n\
         [page_index: 0]\n\nText of page 1\n\n\
         [page_index: 1]\n\nText of page 2\n\n\
         <!-- pages 3 -->\n\n\
         [page_index: 2]\n\nText of page 3\n"
    );
}

#[tokio::test]
async fn retryable_failures_are_retried() {
    let config = ExtractionConfig::builder()
        .chunk_size(2)
        .response_format(ResponseFormat::Markdown)
        .chunk_marker(ChunkMarker::None)
        .max_retries(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    let flaky = Arc::new(FlakyOnce::default());
    let ex = Extractor::with_transcriber(config, flaky.clone());

    let out = ex
        .extract_bytes("four.pdf", common::sample_pdf(4))
        .await
        .unwrap();

    assert_eq!(out.transcript.text, "pages 1-2\n\npages 3-4\n");
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
    assert!(out.chunks.iter().all(|c| c.retries == 1));
}

#[tokio::test]
async fn missing_input_is_a_document_error() {
    let err = extractor(ReverseEcho)
        .extract("/definitely/not/here.pdf")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"), "got: {err}");
}
