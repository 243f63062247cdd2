use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tracing::{info, warn};
use truthwars_engine::{Audience, GameError, Notification, SessionManager};

use crate::models::api::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub player_id: Option<String>,
}

/// クライアントから送られる操作
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ClientMessage {
    Message { text: String },
    Ready,
    Vote { round: u32, choice: truthwars_engine::models::vote::VoteChoice },
}

pub async fn handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    // 存在しないセッションはアップグレード前に 404 を返す
    let rx = match state.manager.subscribe(&session_id).await {
        Ok(rx) => rx,
        Err(e) => {
            return (StatusCode::NOT_FOUND, Json(ErrorResponse::from(&e))).into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id, params.player_id, rx))
}

fn visible(notification: &Notification, player_id: Option<&str>) -> bool {
    match player_id {
        Some(id) => notification.is_visible_to(id),
        None => notification.audience == Audience::All,
    }
}

fn error_text(e: &GameError) -> Option<String> {
    serde_json::to_string(&ErrorResponse::from(e)).ok()
}

async fn apply(
    manager: &SessionManager,
    session_id: &str,
    player_id: &str,
    message: ClientMessage,
) -> Result<(), GameError> {
    match message {
        ClientMessage::Message { text } => {
            manager.submit_message(session_id, player_id, &text).await?;
        }
        ClientMessage::Ready => {
            manager.mark_ready(session_id, player_id).await?;
        }
        ClientMessage::Vote { round, choice } => {
            manager
                .submit_vote(session_id, player_id, round, choice)
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_socket(
    ws: WebSocket,
    state: AppState,
    session_id: String,
    player_id: Option<String>,
    mut rx: broadcast::Receiver<Notification>,
) {
    info!(
        "New WebSocket connection for session {} (player {:?})",
        session_id, player_id
    );
    let (mut sender, mut receiver) = ws.split();
    // 受信側のエラーは本人にだけ返す
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();

    let manager = state.manager.clone();
    let session_for_receive = session_id.clone();
    let player_for_receive = player_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let Some(player_id) = player_for_receive.as_deref() else {
                let e = GameError::Validation("spectators cannot act".to_string());
                if let Some(reply) = error_text(&e) {
                    let _ = reply_tx.send(reply);
                }
                continue;
            };
            let result = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => apply(&manager, &session_for_receive, player_id, message).await,
                Err(e) => Err(GameError::Validation(format!("malformed message: {}", e))),
            };
            if let Err(e) = result {
                if let Some(reply) = error_text(&e) {
                    let _ = reply_tx.send(reply);
                }
            }
        }
    });

    let session_for_send = session_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                received = rx.recv() => match received {
                    Ok(notification) => {
                        if !visible(&notification, player_id.as_deref()) {
                            continue;
                        }
                        match serde_json::to_string(&notification) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("Failed to serialize notification: {}", e);
                                continue;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("WebSocket for session {} lagged by {} notifications", session_for_send, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(text) => text,
                    None => break,
                },
            };
            if let Err(e) = sender.send(Message::Text(text)).await {
                warn!("Error sending message: {}", e);
                break;
            }
        }
    });

    // 片方が終わればもう片方も止める
    tokio::select! {
        _ = &mut receive_task => send_task.abort(),
        _ = &mut send_task => receive_task.abort(),
    }
    info!("WebSocket for session {} closed", session_id);
}
