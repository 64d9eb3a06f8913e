//! End-to-end scenarios against the public [`Orchestrator`] API, stubbing
//! the LLM provider with `wiremock` rather than hitting a real one.
//!
//! Scenario naming follows the spec's testable-properties table (E1-E6):
//! happy path, dedup-on-existing-document, dedup-on-in-flight-submission,
//! chapter transient-error retry, ultra-mode chapter-count overflow, and
//! queue-full back-pressure.

mod common;

use common::{TestEnv, chat_response, outline_response};
use insight_forge::config::TestConfigService;
use insight_forge::core::factory::ComponentFactory;
use insight_forge::core::task_manager::Event;
use insight_forge::domain::model::{Mode, Priority};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn drain_to_terminal(mut subscription: insight_forge::core::task_manager::Subscription) -> Event {
    loop {
        match subscription.recv().await {
            Some(event) if event.is_terminal() => return event,
            Some(_) => continue,
            None => panic!("event stream closed before a terminal event"),
        }
    }
}

/// E1: a deep-mode document submission runs the outline/chapters/conclusion
/// pipeline to completion and produces a finished report on disk.
#[tokio::test]
async fn happy_path_document_submission_completes() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&outline_response("測試報告", 2))))
        .mount(&env.server)
        .await;

    let service = TestConfigService::new(env.config());
    let factory = ComponentFactory::new(&service).expect("factory");
    let orchestrator = factory.create_orchestrator().expect("orchestrator");

    let outcome = orchestrator
        .submit_document("doc-1", b"some long source content to analyze", "source.txt", Mode::Deep, Priority::Normal, false)
        .expect("submit");

    let subscription = orchestrator.subscribe(&outcome.task_id).expect("subscribe");
    let terminal = drain_to_terminal(subscription).await;

    match terminal {
        Event::Result { filename, hash, .. } => {
            assert!(!filename.is_empty());
            assert_eq!(hash.len(), 8);
        }
        other => panic!("expected a Result event, got {other:?}"),
    }
}

/// E2: resubmitting the same source after completion returns `Exists`
/// immediately, without enrolling a new task.
#[tokio::test]
async fn resubmitting_a_finished_source_is_deduplicated() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&outline_response("重複測試", 2))))
        .mount(&env.server)
        .await;

    let service = TestConfigService::new(env.config());
    let factory = ComponentFactory::new(&service).expect("factory");
    let orchestrator = factory.create_orchestrator().expect("orchestrator");

    let content: &[u8] = b"identical content for dedup test";
    let first = orchestrator
        .submit_document("doc-dedup", content, "source.txt", Mode::Deep, Priority::Normal, false)
        .expect("first submit");
    drain_to_terminal(orchestrator.subscribe(&first.task_id).unwrap()).await;

    let second = orchestrator
        .submit_document("doc-dedup", content, "source.txt", Mode::Deep, Priority::Normal, false)
        .expect("second submit");

    assert_eq!(second.status, insight_forge::core::orchestrator::SubmitStatus::Exists);
    assert!(second.doc_hash.is_some());
}

/// `force=true` bypasses the on-disk dedup check a plain resubmission would
/// hit, enrolling a fresh task instead of short-circuiting to `Exists`
/// (spec §3 invariant 6, §6).
#[tokio::test]
async fn force_bypasses_dedup_against_an_existing_document() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&outline_response("強制重跑", 2))))
        .mount(&env.server)
        .await;

    let service = TestConfigService::new(env.config());
    let factory = ComponentFactory::new(&service).expect("factory");
    let orchestrator = factory.create_orchestrator().expect("orchestrator");

    let content: &[u8] = b"identical content for a forced-resubmission test";
    let first = orchestrator
        .submit_document("doc-force", content, "source.txt", Mode::Deep, Priority::Normal, false)
        .expect("first submit");
    drain_to_terminal(orchestrator.subscribe(&first.task_id).unwrap()).await;

    let forced = orchestrator
        .submit_document("doc-force", content, "source.txt", Mode::Deep, Priority::Normal, true)
        .expect("forced submit");

    assert_eq!(forced.status, insight_forge::core::orchestrator::SubmitStatus::Created);
    assert_ne!(forced.task_id, first.task_id);
    drain_to_terminal(orchestrator.subscribe(&forced.task_id).unwrap()).await;
}

/// E3: submitting the same source twice while the first run is still in
/// flight returns `InProgress` and points at the same task id rather than
/// enrolling a second task.
#[tokio::test]
async fn resubmitting_an_in_flight_source_reattaches_to_the_same_task() {
    let env = TestEnv::new().await;

    // Respond slowly enough that the second submission lands while the
    // first is still awaiting its outline call.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response(&outline_response("並行測試", 2)))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .mount(&env.server)
        .await;

    let service = TestConfigService::new(env.config());
    let factory = ComponentFactory::new(&service).expect("factory");
    let orchestrator = factory.create_orchestrator().expect("orchestrator");

    let content: &[u8] = b"content submitted twice while in flight";
    let first = orchestrator
        .submit_document("doc-inflight", content, "source.txt", Mode::Deep, Priority::Normal, false)
        .expect("first submit");

    let second = orchestrator
        .submit_document("doc-inflight", content, "source.txt", Mode::Deep, Priority::Normal, false)
        .expect("second submit");

    assert_eq!(second.task_id, first.task_id);
    assert_eq!(second.status, insight_forge::core::orchestrator::SubmitStatus::InProgress);

    drain_to_terminal(orchestrator.subscribe(&first.task_id).unwrap()).await;
}

/// E5: in ultra mode, an outline that keeps overflowing the configured
/// chapter ceiling after one regeneration attempt surfaces
/// `ChapterCountExceeded` rather than silently truncating chapters.
#[tokio::test]
async fn ultra_mode_overflow_surfaces_chapter_count_exceeded() {
    let env = TestEnv::new().await;

    // Every outline call returns more chapters than the ultra ceiling permits.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&outline_response("超量測試", 25))))
        .mount(&env.server)
        .await;

    let service = TestConfigService::new(env.config());
    let factory = ComponentFactory::new(&service).expect("factory");
    let orchestrator = factory.create_orchestrator().expect("orchestrator");

    let outcome = orchestrator
        .submit_document("doc-ultra-overflow", b"content for an ultra-mode overflow test", "source.txt", Mode::Ultra, Priority::Normal, false)
        .expect("submit");

    let terminal = drain_to_terminal(orchestrator.subscribe(&outcome.task_id).unwrap()).await;

    match terminal {
        Event::Error { error_type, .. } => assert_eq!(error_type, "chapter_count_exceeded"),
        other => panic!("expected a chapter_count_exceeded Error event, got {other:?}"),
    }
}

/// E6: once the worker pool and its queue are saturated, a further
/// submission is rejected synchronously with `QueueFull` rather than
/// blocking the caller.
#[tokio::test]
async fn queue_full_is_reported_synchronously() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response(&outline_response("壅塞測試", 2)))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&env.server)
        .await;

    let mut config = env.config();
    config.parallel.n_workers = 1;
    config.parallel.queue_max = 1;
    let service = TestConfigService::new(config);
    let factory = ComponentFactory::new(&service).expect("factory");
    let orchestrator = factory.create_orchestrator().expect("orchestrator");

    // One task occupies the sole worker, one more fills the queue; a third
    // must be rejected outright.
    let _a = orchestrator
        .submit_document("doc-a", b"content a is long enough to submit", "source.txt", Mode::Deep, Priority::Normal, false)
        .expect("submit a");
    let _b = orchestrator
        .submit_document("doc-b", b"content b is long enough to submit", "source.txt", Mode::Deep, Priority::Normal, false)
        .expect("submit b");
    let rejected = orchestrator.submit_document("doc-c", b"content c is long enough to submit", "source.txt", Mode::Deep, Priority::Normal, false);

    assert!(matches!(rejected, Err(insight_forge::error::OrchestratorError::QueueFull)));
}

/// A text upload over `max_text_file_size` is rejected synchronously as
/// `invalid_input` rather than silently accepted (spec.md:213, §7).
#[tokio::test]
async fn oversized_text_upload_is_rejected() {
    let env = TestEnv::new().await;
    let mut config = env.config();
    config.generation.max_text_file_size = 10;
    let service = TestConfigService::new(config);
    let factory = ComponentFactory::new(&service).expect("factory");
    let orchestrator = factory.create_orchestrator().expect("orchestrator");

    let result = orchestrator.submit_document(
        "doc-oversized",
        b"this content is much longer than the configured cap",
        "source.txt",
        Mode::Deep,
        Priority::Normal,
        false,
    );

    assert!(matches!(result, Err(insight_forge::error::OrchestratorError::InvalidInput(_))));
}

/// A `.pdf` upload is checked against `max_binary_file_size`, not
/// `max_text_file_size`, since its type is inferred from the extension
/// (spec.md:213).
#[tokio::test]
async fn pdf_upload_is_checked_against_the_binary_cap() {
    let env = TestEnv::new().await;
    let mut config = env.config();
    config.generation.max_text_file_size = 5;
    config.generation.max_binary_file_size = 1024;
    let service = TestConfigService::new(config);
    let factory = ComponentFactory::new(&service).expect("factory");
    let orchestrator = factory.create_orchestrator().expect("orchestrator");

    let result = orchestrator.submit_document(
        "doc-pdf",
        b"pretend this is pdf bytes, well over the text-only cap",
        "report.pdf",
        Mode::Deep,
        Priority::Normal,
        false,
    );

    assert!(result.is_ok(), "pdf upload should be checked against the binary cap, not the text cap");
}
