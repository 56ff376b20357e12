use crate::e2e::helpers;

use helpers::{numbered_sentences, TestContext};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use speechbatch_backend::domain::synthesis::{RunSummary, SynthesisErrorKind};
use speechbatch_backend::infrastructure::repositories::SessionRepository;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_synthesize_every_chunk(ctx: &TestContext) {
    ctx.load_keys(2);

    let response = ctx
        .client
        .post(
            "/api/synthesis",
            &json!({ "text": numbered_sentences(5), "voice": "Puck" }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let summary: RunSummary = response.json().unwrap();
    assert!(summary.completed);
    assert!(!summary.cancelled);
    assert_eq!(summary.total_chunks, 5);
    assert_eq!(summary.completed_chunks, 5);
    assert_eq!(summary.effective_concurrency, 2);
    assert_eq!(summary.chunk_size, 100);
    assert!(summary.failures.is_empty());
    assert_eq!(ctx.synth.total_calls(), 5);

    let session = ctx
        .session_repo
        .get(summary.session_id)
        .await
        .unwrap()
        .expect("session persisted");
    assert_eq!(session.voice, "Puck");
    assert_eq!(session.status.as_str(), "completed");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_spread_a_batch_across_credentials(ctx: &TestContext) {
    let keys = ctx.load_keys(2);

    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": numbered_sentences(4) }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(ctx.synth.calls_for_credential(&keys[0]), 2);
    assert_eq!(ctx.synth.calls_for_credential(&keys[1]), 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_chunk_failures_without_failing_the_run(ctx: &TestContext) {
    ctx.load_keys(3);
    ctx.synth
        .fail_text_containing("marker003", SynthesisErrorKind::InvalidRequest);

    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": numbered_sentences(5) }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let summary: RunSummary = response.json().unwrap();
    assert!(!summary.completed);
    assert_eq!(summary.completed_chunks, 4);
    assert_eq!(summary.failures.len(), 1);

    let failure = &summary.failures[0];
    assert_eq!(failure.chunk_index, 3);
    assert_eq!(failure.error_kind, SynthesisErrorKind::InvalidRequest);
    assert!(failure.chunk_text.contains("marker003"));
    // One first attempt plus one retry
    assert_eq!(ctx.synth.calls_for_text_containing("marker003"), 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text(ctx: &TestContext) {
    ctx.load_keys(1);

    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": "   " }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("Text cannot be empty");
    assert_eq!(ctx.synth.total_calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_a_run_without_credentials(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": "Hello there." }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("no credentials configured");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_abort_when_the_pool_runs_dry(ctx: &TestContext) {
    let keys = ctx.load_keys(1);
    ctx.synth
        .fail_credential(&keys[0], SynthesisErrorKind::Unauthorized);

    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": numbered_sentences(3) }))
        .await
        .unwrap();

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    // Progress is kept as an `error` session that can be resumed later
    let response = ctx.client.get("/api/sessions").await.unwrap();
    response.assert_status(StatusCode::OK);
    let sessions = response.body.as_ref().unwrap().as_array().unwrap().clone();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["status"], "error");
    assert_eq!(sessions[0]["total_chunks"], 3);
    assert_eq!(sessions[0]["completed_chunks"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_refuse_to_start_while_every_credential_cools_down(ctx: &TestContext) {
    let keys = ctx.load_keys(1);
    ctx.synth
        .fail_credential(&keys[0], SynthesisErrorKind::RateLimited);

    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": "First run." }))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": "Second run." }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::SERVICE_UNAVAILABLE)
        .assert_error_message("cooling down");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_estimate_chunks_and_batches(ctx: &TestContext) {
    ctx.load_keys(2);

    let response = ctx
        .client
        .post(
            "/api/synthesis/estimate",
            &json!({ "text": numbered_sentences(5), "max_concurrency": 4 }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    // Concurrency is capped by the two healthy credentials
    assert_eq!(body["chunks"], 5);
    assert_eq!(body["batches"], 3);
    assert_eq!(ctx.synth.total_calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_estimate_nothing_for_blank_text(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/synthesis/estimate", &json!({ "text": "" }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["chunks"], 0);
    assert_eq!(body["batches"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_not_restart_an_existing_session(ctx: &TestContext) {
    ctx.load_keys(2);
    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": numbered_sentences(3) }))
        .await
        .unwrap();
    let summary: RunSummary = response.json().unwrap();
    assert!(summary.completed);

    let response = ctx
        .client
        .post(
            "/api/synthesis",
            &json!({ "text": "Totally different text.", "session_id": summary.session_id }),
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::CONFLICT)
        .assert_error_message("already exists");

    let session = ctx
        .session_repo
        .get(summary.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status.as_str(), "completed");
    assert_eq!(session.total_chunks, 3);
    assert_eq!(
        ctx.session_repo
            .cached_artifacts(summary.session_id)
            .await
            .unwrap()
            .len(),
        3
    );
}
