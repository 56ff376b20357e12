use crate::e2e::helpers;

use helpers::{test_keys, TestContext};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use speechbatch_backend::domain::synthesis::SynthesisErrorKind;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_accept_a_list_of_keys(ctx: &TestContext) {
    let keys = test_keys(3);

    let response = ctx
        .client
        .put("/api/credentials", &json!({ "keys": keys }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["accepted"], 3);
    // Ceiling is 2 in the test harness
    assert_eq!(body["effective_concurrency"], 2);
    assert_eq!(ctx.tracker.credential_count(), 3);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_parse_a_pasted_block_and_drop_malformed_entries(ctx: &TestContext) {
    let keys = test_keys(2);
    let text = format!("{}\n  not-a-key  \n{}, {}", keys[0], keys[1], keys[0]);

    let response = ctx
        .client
        .put("/api/credentials", &json!({ "text": text }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["accepted"], 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_a_pool_without_valid_keys(ctx: &TestContext) {
    let response = ctx
        .client
        .put("/api/credentials", &json!({ "keys": ["short", ""] }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("no valid credentials");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_a_body_without_keys_or_text(ctx: &TestContext) {
    let response = ctx
        .client
        .put("/api/credentials", &json!({}))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("Provide either keys or text");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_list_masked_credentials(ctx: &TestContext) {
    let keys = ctx.load_keys(2);

    let response = ctx.client.get("/api/credentials").await.unwrap();

    response.assert_status(StatusCode::OK);
    let raw = String::from_utf8(response.body_bytes.clone()).unwrap();
    for key in &keys {
        assert!(!raw.contains(key.as_str()), "full key leaked in listing");
    }

    let body = response.body.as_ref().unwrap();
    let credentials = body["credentials"].as_array().unwrap();
    assert_eq!(credentials.len(), 2);
    assert_eq!(credentials[0]["health"], "healthy");
    assert_eq!(credentials[0]["usage"], 0);
    assert_eq!(body["healthy"], 2);
    assert_eq!(body["max_concurrency"], 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_clamp_the_concurrency_ceiling(ctx: &TestContext) {
    ctx.load_keys(3);

    let response = ctx
        .client
        .put("/api/credentials/concurrency", &json!({ "max_concurrency": 50 }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["max_concurrency"], 10);
    assert_eq!(body["effective_concurrency"], 3);

    let response = ctx
        .client
        .put("/api/credentials/concurrency", &json!({ "max_concurrency": 0 }))
        .await
        .unwrap();

    let body = response.body.as_ref().unwrap();
    assert_eq!(body["max_concurrency"], 1);
    assert_eq!(body["effective_concurrency"], 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_show_throttled_credentials_as_warning(ctx: &TestContext) {
    let keys = ctx.load_keys(1);
    ctx.synth
        .fail_credential(&keys[0], SynthesisErrorKind::RateLimited);

    let response = ctx
        .client
        .post("/api/synthesis", &json!({ "text": "Just one short sentence." }))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    let response = ctx.client.get("/api/credentials").await.unwrap();
    let body = response.body.as_ref().unwrap();
    let credential = &body["credentials"][0];
    assert_eq!(credential["health"], "warning");
    assert_eq!(credential["is_rate_limited"], true);
    assert_eq!(body["healthy"], 0);
}
