//! Wire-contract tests against the router.

mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::{annotation_list, engine};
use http_body_util::BodyExt;
use koral_mapper::server::{router, AppState, MAX_PARAM_LEN};
use koral_mapper::Config;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> axum::Router {
    let engine = engine(vec![annotation_list(
        "stts-upos",
        ("opennlp", "p", "upos", "p"),
        &["[PIDAT] <> [DET]"],
    )]);
    router(AppState {
        engine: Arc::new(engine),
        config: Arc::new(Config::default()),
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn query_payload() -> Value {
    json!({
        "query": {
            "@type": "koral:token",
            "wrap": {"@type": "koral:term", "foundry": "opennlp", "layer": "p", "key": "PIDAT"}
        }
    })
}

#[tokio::test]
async fn health_answers_ok() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn query_transform_rewrites_the_payload() {
    let response = app()
        .oneshot(post("/stts-upos/query?dir=atob", query_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let out = body_json(response).await;
    assert_eq!(out["query"]["wrap"]["key"], "DET");
    assert_eq!(out["query"]["wrap"]["foundry"], "upos");
}

#[tokio::test]
async fn direction_defaults_to_atob() {
    let response = app()
        .oneshot(post("/stts-upos/query", query_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let out = body_json(response).await;
    assert_eq!(out["query"]["wrap"]["key"], "DET");
}

#[tokio::test]
async fn invalid_direction_is_rejected() {
    let response = app()
        .oneshot(post("/stts-upos/query?dir=sideways", query_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let out = body_json(response).await;
    assert_eq!(out["error"], "invalid direction 'sideways'");
}

#[tokio::test]
async fn unknown_list_is_a_server_error() {
    let response = app()
        .oneshot(post("/nolist/query", query_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let out = body_json(response).await;
    assert_eq!(out["error"], "mapping list with ID nolist not found");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/stts-upos/query")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let out = body_json(response).await;
    assert!(out["error"].as_str().unwrap().starts_with("invalid JSON"));
}

#[tokio::test]
async fn oversized_parameter_is_rejected() {
    let long = "x".repeat(MAX_PARAM_LEN + 1);
    let response = app()
        .oneshot(post(
            &format!("/stts-upos/query?foundryA={long}"),
            query_payload(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cascade_endpoint_applies_cfg() {
    let response = app()
        .oneshot(post("/query?cfg=stts-upos:atob", query_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let out = body_json(response).await;
    assert_eq!(out["query"]["wrap"]["key"], "DET");
}

#[tokio::test]
async fn cascade_with_bad_entry_is_rejected() {
    let response = app()
        .oneshot(post("/query?cfg=stts-upos:atob:odd", query_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn response_endpoint_passes_untouched_payloads() {
    let payload = json!({"matches": [], "meta": {}});
    let response = app()
        .oneshot(post("/stts-upos/response", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, payload);
}

#[tokio::test]
async fn plugin_pages_render() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app()
        .oneshot(
            Request::builder()
                .uri("/stts-upos")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
