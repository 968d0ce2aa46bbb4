// Control surface of the embedded video player
// Mirrors the iframe player API: every call is asynchronous and may fail,
// state changes arrive on a separate notification stream.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::media::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl RemoteState {
    // Numeric codes used by the embed API
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(RemoteState::Unstarted),
            0 => Some(RemoteState::Ended),
            1 => Some(RemoteState::Playing),
            2 => Some(RemoteState::Paused),
            3 => Some(RemoteState::Buffering),
            5 => Some(RemoteState::Cued),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            RemoteState::Unstarted => -1,
            RemoteState::Ended => 0,
            RemoteState::Playing => 1,
            RemoteState::Paused => 2,
            RemoteState::Buffering => 3,
            RemoteState::Cued => 5,
        }
    }

    // Playing, or about to continue playing once buffered
    pub fn is_active(self) -> bool {
        matches!(self, RemoteState::Playing | RemoteState::Buffering)
    }
}

#[async_trait]
pub trait RemoteMediaEngine: Send + Sync {
    async fn load(&self, video_id: &str) -> Result<(), BackendError>;

    async fn play(&self) -> Result<(), BackendError>;

    async fn pause(&self) -> Result<(), BackendError>;

    // Seconds from the start of the video, seeking ahead of the buffer allowed
    async fn seek(&self, seconds: f64) -> Result<(), BackendError>;

    async fn mute(&self) -> Result<(), BackendError>;

    async fn unmute(&self) -> Result<(), BackendError>;

    // 0 ..= 100
    async fn set_volume(&self, volume: u8) -> Result<(), BackendError>;

    async fn set_size(&self, width: u32, height: u32) -> Result<(), BackendError>;

    async fn state(&self) -> Result<RemoteState, BackendError>;

    async fn current_time(&self) -> Result<f64, BackendError>;

    async fn duration(&self) -> Result<f64, BackendError>;

    fn state_changes(&self) -> broadcast::Receiver<RemoteState>;
}
