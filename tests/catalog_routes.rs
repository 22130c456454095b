use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use party_quiz_back::{
    config::AppConfig,
    dao::session_store::memory::MemorySessionStore,
    routes,
    state::{AppState, SharedState},
};

async fn presenter_state() -> (SharedState, String) {
    let state = AppState::new(AppConfig::default().with_room_code("0420"));
    state
        .set_session_store(Arc::new(MemorySessionStore::new()))
        .await;
    let ttl = state.config().presenter_lease_ttl();
    let token = state
        .presenter_lease()
        .lock()
        .await
        .claim(Instant::now(), ttl)
        .unwrap();
    (state, token)
}

/// Send a request through the full router and return (status, JSON body).
async fn send(
    state: &SharedState,
    method: &str,
    token: Option<&str>,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri("/presenter/catalog")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("x-presenter-token", token);
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_owned())).unwrap_or_else(Body::empty))
        .unwrap();
    let resp = routes::router(state.clone()).oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn spreadsheet_export_imports_and_lists() {
    let (state, token) = presenter_state().await;

    let (status, body) = send(
        &state,
        "PUT",
        Some(token.as_str()),
        Some(
            r#"{ "questions": [
                { "id": 0.5372, "term": "鄭成功", "book": "台灣史", "category": "明鄭" },
                { "id": 3.0, "term": "牡丹社事件", "book": "台灣史" }
            ] }"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"], 2);

    let (status, body) = send(&state, "GET", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["id"], "0.5372");
    assert_eq!(questions[0]["chapterCategory"], "明鄭");
    assert_eq!(questions[1]["id"], "3");
}

#[tokio::test]
async fn empty_import_is_a_bad_request() {
    let (state, token) = presenter_state().await;
    let (status, _) = send(
        &state,
        "PUT",
        Some(token.as_str()),
        Some(r#"{ "questions": [] }"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn import_without_presenter_token_is_unauthorized() {
    let (state, _token) = presenter_state().await;
    let (status, body) = send(
        &state,
        "PUT",
        None,
        Some(r#"{ "questions": [ { "id": 1, "term": "鄭成功" } ] }"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("code").is_some());
}
