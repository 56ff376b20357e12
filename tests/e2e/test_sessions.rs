use crate::e2e::helpers;

use helpers::{numbered_sentences, TestContext};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use speechbatch_backend::domain::synthesis::{RunSummary, SynthesisErrorKind};
use speechbatch_backend::infrastructure::repositories::SessionRepository;
use test_context::test_context;
use uuid::Uuid;

/// Five chunks with chunk 3 failing on every credential
async fn partial_run(ctx: &TestContext) -> RunSummary {
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
    assert_eq!(summary.completed_chunks, 4);
    summary
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_list_partial_sessions_as_resumable(ctx: &TestContext) {
    let summary = partial_run(ctx).await;

    let response = ctx.client.get("/api/sessions").await.unwrap();

    response.assert_status(StatusCode::OK);
    let sessions = response.body.as_ref().unwrap().as_array().unwrap().clone();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], summary.session_id.to_string());
    assert_eq!(sessions[0]["status"], "partial");
    assert_eq!(sessions[0]["completed_chunks"], 4);
    assert_eq!(sessions[0]["failed_chunks"], 1);
    assert!(sessions[0]["preview"]
        .as_str()
        .unwrap()
        .starts_with("Sentence marker000"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_full_session_state(ctx: &TestContext) {
    let summary = partial_run(ctx).await;

    let response = ctx
        .client
        .get(&format!("/api/sessions/{}", summary.session_id))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["status"], "partial");
    assert_eq!(body["total_chunks"], 5);
    assert_eq!(body["completed_indices"], json!([0, 1, 2, 4]));
    assert_eq!(body["failures"][0]["chunk_index"], 3);
    assert_eq!(body["failures"][0]["error_kind"], "invalid-request");
    assert!(body["ended_at"].is_string());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_not_found_for_unknown_session(ctx: &TestContext) {
    let response = ctx
        .client
        .get(&format!("/api/sessions/{}", Uuid::new_v4()))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_error_message("Session");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_complete_a_session_by_retrying_the_failed_chunk(ctx: &TestContext) {
    let summary = partial_run(ctx).await;
    ctx.synth.heal();

    let response = ctx
        .client
        .post_empty(&format!("/api/sessions/{}/chunks/3/retry", summary.session_id))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["completed_indices"], json!([0, 1, 2, 3, 4]));
    assert_eq!(body["failures"], json!([]));

    let response = ctx.client.get("/api/sessions").await.unwrap();
    assert_eq!(response.body.as_ref().unwrap(), &json!([]));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_retry_with_an_explicit_credential(ctx: &TestContext) {
    let summary = partial_run(ctx).await;
    ctx.synth.heal();
    let extra = "AIzaSyManualRetryCredential0001";

    let response = ctx
        .client
        .post(
            &format!("/api/sessions/{}/chunks/3/retry", summary.session_id),
            &json!({ "credential": extra }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["status"], "completed");
    assert_eq!(ctx.synth.calls_for_credential(extra), 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_keep_the_failure_when_a_retry_fails_again(ctx: &TestContext) {
    let summary = partial_run(ctx).await;

    let response = ctx
        .client
        .post_empty(&format!("/api/sessions/{}/chunks/3/retry", summary.session_id))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_GATEWAY)
        .assert_error_message("chunk 3 failed");

    let session = ctx
        .session_repo
        .get(summary.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.failures.len(), 1);
    assert_eq!(session.failures[0].chunk_index, 3);
    assert_eq!(session.status.as_str(), "partial");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_invalid_retry_requests(ctx: &TestContext) {
    let summary = partial_run(ctx).await;

    let response = ctx
        .client
        .post_empty(&format!("/api/sessions/{}/chunks/9/retry", summary.session_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("out of range");

    let response = ctx
        .client
        .post(
            &format!("/api/sessions/{}/chunks/3/retry", summary.session_id),
            &json!({ "credential": "nope" }),
        )
        .await
        .unwrap();
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("not well-formed");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_resume_without_repeating_finished_chunks(ctx: &TestContext) {
    let summary = partial_run(ctx).await;
    let calls_before = ctx.synth.total_calls();
    ctx.synth.heal();

    let response = ctx
        .client
        .post_empty(&format!("/api/sessions/{}/resume", summary.session_id))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let resumed: RunSummary = response.json().unwrap();
    assert_eq!(resumed.session_id, summary.session_id);
    assert!(resumed.completed);
    assert_eq!(resumed.completed_chunks, 5);
    assert_eq!(ctx.synth.total_calls(), calls_before + 1);
    assert_eq!(ctx.synth.calls_for_text_containing("marker000"), 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_refuse_to_resume_a_completed_session(ctx: &TestContext) {
    ctx.load_keys(1);
    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": "All done in one go." }))
        .await
        .unwrap();
    let summary: RunSummary = response.json().unwrap();
    assert!(summary.completed);

    let response = ctx
        .client
        .post_empty(&format!("/api/sessions/{}/resume", summary.session_id))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::CONFLICT)
        .assert_error_message("already completed");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_merge_available_audio_and_flag_missing_chunks(ctx: &TestContext) {
    let summary = partial_run(ctx).await;

    let response = ctx
        .client
        .get(&format!("/api/sessions/{}/audio", summary.session_id))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav")
        .assert_header("x-missing-chunks", "3");
    assert_eq!(&response.body_bytes[0..4], b"RIFF");
    assert_eq!(&response.body_bytes[8..12], b"WAVE");
    assert!(response
        .header("content-disposition")
        .unwrap()
        .contains(&summary.session_id.to_string()));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_serve_a_single_chunk_as_wav(ctx: &TestContext) {
    let summary = partial_run(ctx).await;

    let response = ctx
        .client
        .get(&format!("/api/sessions/{}/chunks/0/audio", summary.session_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav");
    assert_eq!(&response.body_bytes[0..4], b"RIFF");

    let response = ctx
        .client
        .get(&format!("/api/sessions/{}/chunks/3/audio", summary.session_id))
        .await
        .unwrap();
    response.assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_delete_a_session(ctx: &TestContext) {
    let summary = partial_run(ctx).await;
    let path = format!("/api/sessions/{}", summary.session_id);

    let response = ctx.client.delete(&path).await.unwrap();
    response.assert_status(StatusCode::NO_CONTENT);

    let response = ctx.client.get(&path).await.unwrap();
    response.assert_status(StatusCode::NOT_FOUND);

    let response = ctx.client.delete(&path).await.unwrap();
    response.assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_nothing_to_cancel_for_idle_sessions(ctx: &TestContext) {
    let response = ctx
        .client
        .post_empty(&format!("/api/sessions/{}/cancel", Uuid::new_v4()))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["cancelled"], false);
}
