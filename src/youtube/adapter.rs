// Remote engine adapter
// Wraps the fallible async engine surface into the shapes the player needs:
// commands report success as a bool and queries fall back to neutral values.
// Every failure is logged here so the player never has to.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;

use super::engine::{RemoteMediaEngine, RemoteState};

#[derive(Clone)]
pub struct RemoteEngineAdapter {
    engine: Arc<dyn RemoteMediaEngine>,
}

impl RemoteEngineAdapter {
    pub fn new(engine: Arc<dyn RemoteMediaEngine>) -> Self {
        RemoteEngineAdapter { engine }
    }

    pub async fn load(&self, video_id: &str) -> bool {
        report("load", self.engine.load(video_id).await)
    }

    pub async fn play(&self) -> bool {
        report("play", self.engine.play().await)
    }

    pub async fn pause(&self) -> bool {
        report("pause", self.engine.pause().await)
    }

    pub async fn seek(&self, seconds: f64) -> bool {
        report("seek", self.engine.seek(seconds).await)
    }

    pub async fn mute(&self) -> bool {
        report("mute", self.engine.mute().await)
    }

    pub async fn unmute(&self) -> bool {
        report("unmute", self.engine.unmute().await)
    }

    pub async fn set_volume(&self, volume: u8) -> bool {
        report("set_volume", self.engine.set_volume(volume).await)
    }

    pub async fn hide(&self) -> bool {
        report("set_size", self.engine.set_size(0, 0).await)
    }

    pub async fn state(&self) -> Option<RemoteState> {
        match self.engine.state().await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Remote player state query failed: {}", e);
                None
            }
        }
    }

    pub async fn is_playing(&self) -> bool {
        self.state().await == Some(RemoteState::Playing)
    }

    pub async fn current_time(&self) -> f64 {
        self.engine.current_time().await.unwrap_or_else(|e| {
            warn!("Remote player time query failed: {}", e);
            0.0
        })
    }

    pub async fn duration(&self) -> f64 {
        self.engine.duration().await.unwrap_or_else(|e| {
            warn!("Remote player duration query failed: {}", e);
            0.0
        })
    }

    pub fn state_changes(&self) -> broadcast::Receiver<RemoteState> {
        self.engine.state_changes()
    }
}

fn report(operation: &str, result: Result<(), crate::media::BackendError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Remote player {} failed: {}", operation, e);
            false
        }
    }
}
