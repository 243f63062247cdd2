use serde::{Deserialize, Serialize};
use truthwars_engine::{
    models::{player::PlayerEntry, vote::VoteChoice},
    Audience, ErrorKind, GameError, Notification, SessionId,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub players: Vec<PlayerEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session_id: SessionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub player_id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlayerRequest {
    pub player_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub player_id: String,
    pub round: u32,
    pub choice: VoteChoice,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccuseRequest {
    pub accuser_id: String,
    pub target_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageRequest {
    pub player_id: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AbortRequest {
    #[serde(default = "default_abort_reason")]
    pub reason: String,
}

fn default_abort_reason() -> String {
    "aborted by host".to_string()
}

/// 操作結果。本人宛て以外の非公開通知は含めない
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub notifications: Vec<Notification>,
}

impl ActionResponse {
    pub fn for_player(notifications: Vec<Notification>, player_id: Option<&str>) -> Self {
        let notifications = notifications
            .into_iter()
            .filter(|n| match player_id {
                Some(id) => n.is_visible_to(id),
                None => n.audience == Audience::All,
            })
            .collect();
        Self {
            success: true,
            notifications,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: Option<ErrorKind>,
}

impl From<&GameError> for ErrorResponse {
    fn from(e: &GameError) -> Self {
        Self {
            success: false,
            error: e.to_string(),
            kind: Some(e.kind()),
        }
    }
}
