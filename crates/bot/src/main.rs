use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use session_api::{ControllerOptions, SessionController};
use shared::{
    domain::{Member, NewSession, Session, SessionId, UserId},
    error::{ApiError, ErrorCode, SessionError},
    protocol::{SessionAction, SessionView},
};
use storage::{SessionStore, Storage};
use tracing::{error, info};

mod config;
mod share;

use config::{load_settings, prepare_database_url};

type HttpResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Clone)]
struct AppState {
    sessions: SessionController<dyn SessionStore>,
    share_hashtags: Arc<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct LeaveRequest {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct BreakRequest {
    size: u8,
}

#[derive(Debug, Deserialize)]
struct InteractionRequest {
    label: String,
    member: Member,
}

#[derive(Debug, Serialize, Deserialize)]
struct InteractionResponse {
    /// Message content: mentions of everyone on break.
    content: String,
    view: SessionView,
}

#[derive(Debug, Deserialize)]
struct ShareQuery {
    invite_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ShareResponse {
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            error = %format!("{error:#}"),
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let store: Arc<dyn SessionStore> = Arc::new(storage);
    let sessions = SessionController::with_options(
        store,
        ControllerOptions {
            store_timeout: settings.store_timeout(),
        },
    );

    let state = AppState {
        sessions,
        share_hashtags: Arc::new(settings.share_hashtags),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "bot listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id", get(current_view))
        .route("/sessions/:session_id/join", post(join_session))
        .route("/sessions/:session_id/leave", post(leave_session))
        .route("/sessions/:session_id/breaks", post(request_break))
        .route("/sessions/:session_id/interactions", post(interaction))
        .route("/sessions/:session_id/share", get(share_url))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.sessions.store().health_check().await.map_err(|error| {
        error!(error = %format!("{error:#}"), "session store health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSession>,
) -> HttpResult<Session> {
    let session = state.sessions.create_session(req).await.map_err(reject)?;
    Ok(Json(session))
}

async fn current_view(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> HttpResult<SessionView> {
    let view = state
        .sessions
        .current_view(SessionId(session_id))
        .await
        .map_err(reject)?;
    Ok(Json(view))
}

async fn join_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Json(member): Json<Member>,
) -> HttpResult<SessionView> {
    let view = state
        .sessions
        .join(SessionId(session_id), &member)
        .await
        .map_err(reject)?;
    Ok(Json(view))
}

async fn leave_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Json(req): Json<LeaveRequest>,
) -> HttpResult<SessionView> {
    let view = state
        .sessions
        .leave(SessionId(session_id), UserId(req.user_id))
        .await
        .map_err(reject)?;
    Ok(Json(view))
}

async fn request_break(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Json(req): Json<BreakRequest>,
) -> HttpResult<SessionView> {
    let view = state
        .sessions
        .request_break(SessionId(session_id), req.size)
        .await
        .map_err(reject)?;
    Ok(Json(view))
}

async fn interaction(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Json(req): Json<InteractionRequest>,
) -> HttpResult<InteractionResponse> {
    let action = SessionAction::from_button_label(&req.label, req.member).map_err(reject)?;
    let view = state
        .sessions
        .dispatch(SessionId(session_id), action)
        .await
        .map_err(reject)?;
    Ok(Json(InteractionResponse {
        content: view.break_mentions(),
        view,
    }))
}

async fn share_url(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Query(q): Query<ShareQuery>,
) -> HttpResult<ShareResponse> {
    let session = state
        .sessions
        .session(SessionId(session_id))
        .await
        .map_err(reject)?;
    let url = share::tweet_intent_url(&session.guild_name, &q.invite_url, &state.share_hashtags)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(ErrorCode::Internal, e.to_string())),
            )
        })?;
    Ok(Json(ShareResponse {
        url: url.to_string(),
    }))
}

fn reject(err: SessionError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code() {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiError::from(err)))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
