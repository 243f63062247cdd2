use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use truthwars_engine::{models::player::PlayerEntry, ErrorKind, GameError, Notification};

use crate::models::api::{
    AbortRequest, AccuseRequest, ActionResponse, CreateSessionRequest, CreateSessionResponse,
    ErrorResponse, JoinRequest, MessageRequest, PlayerRequest, VoteRequest,
};
use crate::state::AppState;
use crate::utils::websocket;

pub fn routes(state: AppState) -> Router {
    Router::new()
        // セッション作成
        // curl -X POST http://localhost:8080/api/sessions -H 'Content-Type: application/json' -d '{"players":[]}'
        .route("/", post(create_session).get(list_sessions))
        .nest(
            "/:session_id",
            Router::new()
                .route("/", get(get_session))
                .route("/join", post(join_session))
                .route("/leave", post(leave_session))
                .route("/start", post(start_session))
                // プレイヤーの操作
                .nest(
                    "/actions",
                    Router::new()
                        .route("/vote", post(vote_handler))
                        .route("/accuse", post(accuse_handler))
                        .route("/message", post(message_handler))
                        .route("/swap-headline", post(swap_headline_handler))
                        .route("/ready", post(ready_handler)),
                )
                // 進行の管理
                .route("/phase/advance", post(advance_phase_handler))
                .route("/abort", post(abort_handler))
                // websocat ws://localhost:8080/api/sessions/{id}/ws?player_id=p1
                .route("/ws", get(websocket::handler)),
        )
        .with_state(state)
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::State => StatusCode::CONFLICT,
        ErrorKind::Eligibility => StatusCode::FORBIDDEN,
        ErrorKind::Resource => StatusCode::NOT_FOUND,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: GameError) -> Response {
    (status_for(e.kind()), Json(ErrorResponse::from(&e))).into_response()
}

fn action_result(result: Result<Vec<Notification>, GameError>, player_id: Option<&str>) -> Response {
    match result {
        Ok(notifications) => (
            StatusCode::OK,
            Json(ActionResponse::for_player(notifications, player_id)),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Response {
    match state.manager.create_session(req.players).await {
        Ok((session_id, _)) => (
            StatusCode::CREATED,
            Json(CreateSessionResponse {
                success: true,
                session_id,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_sessions(State(state): State<AppState>) -> Response {
    let sessions: Vec<_> = state
        .manager
        .list_sessions()
        .await
        .into_iter()
        .map(|s| s.redacted())
        .collect();
    (StatusCode::OK, Json(sessions)).into_response()
}

async fn get_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.manager.snapshot(&session_id).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot.redacted())).into_response(),
        Err(e) => error_response(e),
    }
}

async fn join_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Response {
    let result = state
        .manager
        .join_session(&session_id, PlayerEntry::new(req.player_id.clone(), req.name))
        .await;
    action_result(result, Some(&req.player_id))
}

async fn leave_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<PlayerRequest>,
) -> Response {
    let result = state.manager.leave_session(&session_id, &req.player_id).await;
    action_result(result, Some(&req.player_id))
}

async fn start_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    action_result(state.manager.start_session(&session_id).await, None)
}

async fn vote_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Response {
    let result = state
        .manager
        .submit_vote(&session_id, &req.player_id, req.round, req.choice)
        .await;
    action_result(result, Some(&req.player_id))
}

async fn accuse_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<AccuseRequest>,
) -> Response {
    let result = state
        .manager
        .submit_accusation(&session_id, &req.accuser_id, &req.target_id)
        .await;
    action_result(result, Some(&req.accuser_id))
}

async fn message_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Response {
    let result = state
        .manager
        .submit_message(&session_id, &req.player_id, &req.text)
        .await;
    action_result(result, Some(&req.player_id))
}

async fn swap_headline_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<PlayerRequest>,
) -> Response {
    let result = state.manager.swap_headline(&session_id, &req.player_id).await;
    action_result(result, Some(&req.player_id))
}

async fn ready_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<PlayerRequest>,
) -> Response {
    let result = state.manager.mark_ready(&session_id, &req.player_id).await;
    action_result(result, Some(&req.player_id))
}

async fn advance_phase_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    action_result(state.manager.advance_phase_if_due(&session_id).await, None)
}

async fn abort_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<AbortRequest>,
) -> Response {
    action_result(
        state.manager.abort_session(&session_id, &req.reason).await,
        None,
    )
}
