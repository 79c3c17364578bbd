use super::*;
use axum::{
    body::{self, Body},
    http::Request,
    response::Response,
};
use storage::MemoryStore;
use tower::ServiceExt;

fn test_app() -> (Router, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn SessionStore> = memory.clone();
    let app = build_router(Arc::new(AppState {
        sessions: SessionController::new(store),
        share_hashtags: Arc::new(vec!["#RocketLeague".to_string()]),
    }));
    (app, memory)
}

fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn member_json(id: i64) -> serde_json::Value {
    serde_json::json!({
        "user_id": id,
        "name": format!("user{id}"),
        "display_name": format!("User {id}"),
        "mention": format!("<@{id}>"),
    })
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _store) = test_app();
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn healthz_reports_unavailable_store() {
    let (app, store) = test_app();
    store.set_unavailable(true);
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn join_break_and_leave_routes_update_the_view() {
    let (app, _store) = test_app();

    for id in [1, 2, 3] {
        let response = app
            .clone()
            .oneshot(post_json("/sessions/55/join", member_json(id)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post_json("/sessions/55/breaks", serde_json::json!({ "size": 2 })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let view: SessionView = json_body(response).await;
    assert_eq!(view.break_ids(), vec![UserId(1), UserId(2)]);

    let response = app
        .clone()
        .oneshot(post_json("/sessions/55/leave", serde_json::json!({ "user_id": 1 })))
        .await
        .expect("response");
    let view: SessionView = json_body(response).await;
    assert_eq!(view.participant_ids(), vec![UserId(2), UserId(3)]);
    assert_eq!(view.break_ids(), vec![UserId(2)]);

    let request = Request::get("/sessions/55")
        .body(Body::empty())
        .expect("request");
    let view: SessionView = json_body(app.oneshot(request).await.expect("response")).await;
    assert_eq!(view.participants[0].display_name, "User 2");
}

#[tokio::test]
async fn unsupported_break_size_is_bad_request() {
    let (app, _store) = test_app();
    let response = app
        .oneshot(post_json("/sessions/55/breaks", serde_json::json!({ "size": 9 })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn interaction_returns_break_mentions_as_content() {
    let (app, _store) = test_app();
    for id in [1, 2] {
        let payload = serde_json::json!({ "label": "参加", "member": member_json(id) });
        app.clone()
            .oneshot(post_json("/sessions/8/interactions", payload))
            .await
            .expect("response");
    }

    let payload = serde_json::json!({ "label": "休憩1", "member": member_json(2) });
    let response = app
        .clone()
        .oneshot(post_json("/sessions/8/interactions", payload))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: InteractionResponse = json_body(response).await;
    assert_eq!(body.content, "<@1>");
    assert_eq!(body.view.participants.len(), 2);

    let payload = serde_json::json!({ "label": "unknown", "member": member_json(2) });
    let response = app
        .oneshot(post_json("/sessions/8/interactions", payload))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn share_url_requires_recorded_session() {
    let (app, _store) = test_app();
    let request = Request::get("/sessions/77/share?invite_url=https%3A%2F%2Fdiscord.gg%2Fabc")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let session = serde_json::json!({
        "session_id": 77,
        "guild_id": 1,
        "guild_name": "rl-jp",
        "channel_id": 2,
        "channel_name": "private-match",
        "author_id": 3,
        "author_name": "host",
        "author_display_name": "Host",
    });
    let response = app
        .clone()
        .oneshot(post_json("/sessions", session))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let created: Session = json_body(response).await;
    assert_eq!(created.kind, shared::domain::SessionKind::Qk);

    let request = Request::get("/sessions/77/share?invite_url=https%3A%2F%2Fdiscord.gg%2Fabc")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let share: ShareResponse = json_body(response).await;
    assert!(share.url.starts_with("https://twitter.com/intent/tweet?text="));
}

#[tokio::test]
async fn store_outage_maps_to_service_unavailable() {
    let (app, store) = test_app();
    store.set_unavailable(true);
    let response = app
        .oneshot(post_json("/sessions/1/join", member_json(1)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Unavailable);
}
