use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_ok_for_health_check(ctx: &TestContext) {
    let response = ctx.client.get("/health").await.unwrap();

    response.assert_status(StatusCode::OK);

    // Health endpoint returns plain text
    let body = String::from_utf8(response.body_bytes.clone()).unwrap();
    assert_eq!(body, "OK");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_ready_with_connected_store(ctx: &TestContext) {
    let response = ctx.client.get("/health/ready").await.unwrap();

    response.assert_status(StatusCode::OK);

    let body = response.body.as_ref().unwrap();
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ready"));
    assert_eq!(
        body.get("session_store").and_then(|v| v.as_str()),
        Some("connected")
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_credential_availability_in_ready(ctx: &TestContext) {
    let response = ctx.client.get("/health/ready").await.unwrap();
    let body = response.body.as_ref().unwrap();
    assert_eq!(
        body.get("credentials").and_then(|v| v.as_str()),
        Some("exhausted")
    );
    assert_eq!(
        body.get("healthy_credentials").and_then(|v| v.as_u64()),
        Some(0)
    );

    ctx.load_keys(3);

    let response = ctx.client.get("/health/ready").await.unwrap();
    let body = response.body.as_ref().unwrap();
    assert_eq!(
        body.get("credentials").and_then(|v| v.as_str()),
        Some("available")
    );
    assert_eq!(
        body.get("healthy_credentials").and_then(|v| v.as_u64()),
        Some(3)
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_include_request_id_in_responses(ctx: &TestContext) {
    let response = ctx.client.get("/health").await.unwrap();
    response.assert_header_exists("x-request-id");

    let response = ctx.client.get("/api/credentials").await.unwrap();
    response.assert_header_exists("x-request-id");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_echo_a_caller_supplied_request_id(ctx: &TestContext) {
    let response = ctx
        .client
        .get_with_headers("/health", &[("x-request-id", "trace-abc-123")])
        .await
        .unwrap();

    response.assert_header("x-request-id", "trace-abc-123");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_handle_concurrent_health_checks(ctx: &TestContext) {
    let mut futures = Vec::new();
    for _ in 0..10 {
        let client = ctx.client.clone();
        futures.push(async move { client.get("/health").await });
    }

    let results = futures::future::join_all(futures).await;

    for result in results {
        let response = result.unwrap();
        response.assert_status(StatusCode::OK);
    }
}
