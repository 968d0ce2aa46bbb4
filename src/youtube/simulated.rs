// In-memory stand-in for the embedded video player
// Records every command so tests can assert on call order. Like the
// simulated audio element, the playhead only moves through advance().

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::engine::{RemoteMediaEngine, RemoteState};
use crate::media::BackendError;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    Mute,
    Unmute,
    SetVolume(u8),
    SetSize(u32, u32),
}

#[derive(Debug)]
struct EngineState {
    video_id: Option<String>,
    state: RemoteState,
    current_time: f64,
    duration: f64,
    muted: bool,
    volume: u8,
    size: (u32, u32),
    reject_play: bool,
    reject_unmute: usize,
    calls: Vec<EngineCall>,
}

pub struct SimulatedRemoteEngine {
    inner: Mutex<EngineState>,
    events: broadcast::Sender<RemoteState>,
}

impl SimulatedRemoteEngine {
    pub fn new(duration: f64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        SimulatedRemoteEngine {
            inner: Mutex::new(EngineState {
                video_id: None,
                state: RemoteState::Unstarted,
                current_time: 0.0,
                duration,
                muted: false,
                volume: 100,
                size: (640, 360),
                reject_play: false,
                reject_unmute: 0,
                calls: Vec::new(),
            }),
            events,
        }
    }

    pub fn reject_play(&self, reject: bool) {
        self.inner.lock().reject_play = reject;
    }

    // The next `count` unmute calls fail
    pub fn reject_unmute(&self, count: usize) {
        self.inner.lock().reject_unmute = count;
    }

    // Force a state and notify subscribers, e.g. a pause from the embed itself
    pub fn set_state(&self, state: RemoteState) {
        self.inner.lock().state = state;
        self.emit(state);
    }

    pub fn advance(&self, seconds: f64) {
        let ended = {
            let mut inner = self.inner.lock();
            if inner.state != RemoteState::Playing {
                return;
            }
            inner.current_time = (inner.current_time + seconds).min(inner.duration);
            if inner.current_time >= inner.duration {
                inner.state = RemoteState::Ended;
                true
            } else {
                false
            }
        };
        if ended {
            self.emit(RemoteState::Ended);
        }
    }

    pub fn loaded_video(&self) -> Option<String> {
        self.inner.lock().video_id.clone()
    }

    pub fn current_state(&self) -> RemoteState {
        self.inner.lock().state
    }

    pub fn position(&self) -> f64 {
        self.inner.lock().current_time
    }

    pub fn is_muted(&self) -> bool {
        self.inner.lock().muted
    }

    pub fn volume_level(&self) -> u8 {
        self.inner.lock().volume
    }

    pub fn size(&self) -> (u32, u32) {
        self.inner.lock().size
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    fn emit(&self, state: RemoteState) {
        let _ = self.events.send(state);
    }
}

#[async_trait]
impl RemoteMediaEngine for SimulatedRemoteEngine {
    async fn load(&self, video_id: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Load(video_id.to_string()));
        inner.video_id = Some(video_id.to_string());
        inner.state = RemoteState::Cued;
        Ok(())
    }

    async fn play(&self) -> Result<(), BackendError> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(EngineCall::Play);
            if inner.reject_play {
                return Err(BackendError::Rejected("playback blocked by embed".to_string()));
            }
            if inner.state == RemoteState::Playing {
                return Ok(());
            }
            inner.state = RemoteState::Playing;
        }
        self.emit(RemoteState::Playing);
        Ok(())
    }

    async fn pause(&self) -> Result<(), BackendError> {
        let changed = {
            let mut inner = self.inner.lock();
            inner.calls.push(EngineCall::Pause);
            let changed = inner.state.is_active();
            if changed {
                inner.state = RemoteState::Paused;
            }
            changed
        };
        if changed {
            self.emit(RemoteState::Paused);
        }
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Seek(seconds));
        inner.current_time = seconds.clamp(0.0, inner.duration);
        Ok(())
    }

    async fn mute(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Mute);
        inner.muted = true;
        Ok(())
    }

    async fn unmute(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Unmute);
        if inner.reject_unmute > 0 {
            inner.reject_unmute -= 1;
            return Err(BackendError::Unavailable("player not ready".to_string()));
        }
        inner.muted = false;
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::SetVolume(volume));
        inner.volume = volume;
        Ok(())
    }

    async fn set_size(&self, width: u32, height: u32) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::SetSize(width, height));
        inner.size = (width, height);
        Ok(())
    }

    async fn state(&self) -> Result<RemoteState, BackendError> {
        Ok(self.inner.lock().state)
    }

    async fn current_time(&self) -> Result<f64, BackendError> {
        Ok(self.inner.lock().current_time)
    }

    async fn duration(&self) -> Result<f64, BackendError> {
        Ok(self.inner.lock().duration)
    }

    fn state_changes(&self) -> broadcast::Receiver<RemoteState> {
        self.events.subscribe()
    }
}
