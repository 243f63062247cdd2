use log::{info, warn};
use std::time::Duration;
use tokio::task::JoinHandle;
use truthwars_engine::{ArchiveRecord, SessionManager};

#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
}

impl AppState {
    pub fn new(manager: SessionManager) -> Self {
        AppState { manager }
    }

    /// タイマーループ、アーカイブの書き出し、終了済みセッションの掃除を起動する
    pub async fn start_background_tasks(&self, cleanup_interval: Duration) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some(scheduler) = self.manager.spawn_scheduler().await {
            handles.push(scheduler);
        }

        if let Some(mut archive) = self.manager.take_archive_receiver().await {
            handles.push(tokio::spawn(async move {
                while let Some(record) = archive.recv().await {
                    match serde_json::to_string(&record) {
                        Ok(json) => match &record {
                            ArchiveRecord::Round { session_id, .. } => {
                                info!("Archived round of session {}: {}", session_id, json)
                            }
                            ArchiveRecord::Session(snapshot) => {
                                info!("Archived session {}: {}", snapshot.id, json)
                            }
                        },
                        Err(e) => warn!("Failed to serialize archive record: {}", e),
                    }
                }
            }));
        }

        let manager = self.manager.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.cleanup_finished().await;
            }
        }));

        handles
    }
}
