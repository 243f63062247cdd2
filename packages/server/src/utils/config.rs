use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error("invalid BIND_ADDR {0}: {1}")]
    BindAddr(String, std::net::AddrParseError),
    #[error("invalid CLEANUP_INTERVAL_SECS {0}")]
    CleanupInterval(String),
}

/// HTTP レイヤーの設定。ゲームのルールは GameConfig 側で読む
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub allowed_origin: String,
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            allowed_origin: "http://localhost:3000".to_string(),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerConfigError> {
        let defaults = Self::default();

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| ServerConfigError::BindAddr(raw.clone(), e))?,
            Err(_) => defaults.bind_addr,
        };
        let cleanup_interval = match env::var("CLEANUP_INTERVAL_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ServerConfigError::CleanupInterval(raw)),
            },
            Err(_) => defaults.cleanup_interval,
        };

        Ok(Self {
            bind_addr,
            allowed_origin: env::var("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
            cleanup_interval,
        })
    }
}
