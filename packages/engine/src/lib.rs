pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{ErrorKind, GameError};
pub use models::config::{ConfigError, GameConfig, PhaseDurations};
pub use models::notification::{Audience, GameEvent, Notification};
pub use models::session::{GamePhase, GameResult, SessionId, SessionSnapshot};
pub use services::headline_service::{HeadlineDeck, HeadlineSource, HeadlineSourceFactory};
pub use services::session_service::{ArchiveRecord, SessionManager};
pub use utils::clock::{Clock, ManualClock, SystemClock};
