// In-memory media backends
// Time does not flow on its own here: callers move the playhead with
// advance() and trigger the natural end with finish(). Events follow the
// same order a browser audio element uses (pause before ended).

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::{
    ActionHandler, AudioElement, BackendError, ElementEvent, MediaAction, MediaMetadata,
    MediaSession,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
struct ElementState {
    paused: bool,
    current_time: f64,
    duration: Option<f64>,
    volume: f32,
    looping: bool,
    autoplay_blocked: bool,
    play_requests: usize,
}

pub struct SimulatedAudioElement {
    state: Mutex<ElementState>,
    events: broadcast::Sender<ElementEvent>,
}

impl SimulatedAudioElement {
    // Element whose metadata has not loaded yet
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        SimulatedAudioElement {
            state: Mutex::new(ElementState {
                paused: true,
                current_time: 0.0,
                duration: None,
                volume: 1.0,
                looping: false,
                autoplay_blocked: false,
                play_requests: 0,
            }),
            events,
        }
    }

    pub fn with_duration(seconds: f64) -> Self {
        let element = Self::new();
        element.state.lock().duration = Some(seconds);
        element
    }

    pub fn block_autoplay(&self, blocked: bool) {
        self.state.lock().autoplay_blocked = blocked;
    }

    pub fn load_metadata(&self, seconds: f64) {
        self.state.lock().duration = Some(seconds);
        self.emit(ElementEvent::LoadedMetadata);
    }

    // Move the playhead forward; reaching the end of a non-looping clip ends it
    pub fn advance(&self, seconds: f64) {
        let reached_end = {
            let mut state = self.state.lock();
            if state.paused {
                return;
            }
            state.current_time += seconds;
            match state.duration {
                Some(duration) if state.current_time >= duration => {
                    if state.looping {
                        state.current_time %= duration.max(f64::EPSILON);
                        false
                    } else {
                        state.current_time = duration;
                        true
                    }
                }
                _ => false,
            }
        };
        if reached_end {
            self.end_playback();
        }
    }

    // Natural end of the clip
    pub fn finish(&self) {
        {
            let mut state = self.state.lock();
            if let Some(duration) = state.duration {
                state.current_time = duration;
            }
        }
        self.end_playback();
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    // Number of play() calls, rejected ones included
    pub fn play_requests(&self) -> usize {
        self.state.lock().play_requests
    }

    fn end_playback(&self) {
        let was_playing = {
            let mut state = self.state.lock();
            let was_playing = !state.paused;
            state.paused = true;
            was_playing
        };
        if was_playing {
            self.emit(ElementEvent::Pause);
        }
        self.emit(ElementEvent::Ended);
    }

    fn emit(&self, event: ElementEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

impl Default for SimulatedAudioElement {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioElement for SimulatedAudioElement {
    fn play(&self) -> Result<(), BackendError> {
        let started = {
            let mut state = self.state.lock();
            state.play_requests += 1;
            if state.autoplay_blocked {
                return Err(BackendError::Rejected(
                    "play() can only be initiated by a user gesture".to_string(),
                ));
            }
            let started = state.paused;
            state.paused = false;
            started
        };
        if started {
            self.emit(ElementEvent::Play);
        }
        Ok(())
    }

    fn pause(&self) {
        let paused = {
            let mut state = self.state.lock();
            let was_playing = !state.paused;
            state.paused = true;
            was_playing
        };
        if paused {
            self.emit(ElementEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        let mut state = self.state.lock();
        let upper = state.duration.unwrap_or(f64::MAX);
        state.current_time = seconds.clamp(0.0, upper);
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn set_looping(&self, looping: bool) {
        self.state.lock().looping = looping;
    }

    fn subscribe(&self) -> broadcast::Receiver<ElementEvent> {
        self.events.subscribe()
    }
}

// ==========================================
// RECORDING MEDIA SESSION
// ==========================================

#[derive(Default)]
pub struct RecordingMediaSession {
    metadata: Mutex<Option<MediaMetadata>>,
    handlers: Mutex<HashMap<MediaAction, ActionHandler>>,
    metadata_updates: Mutex<usize>,
}

impl RecordingMediaSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> Option<MediaMetadata> {
        self.metadata.lock().clone()
    }

    pub fn metadata_updates(&self) -> usize {
        *self.metadata_updates.lock()
    }

    pub fn has_handler(&self, action: MediaAction) -> bool {
        self.handlers.lock().contains_key(&action)
    }

    // Simulate the user pressing a transport control. Returns false when no
    // handler is registered for the action.
    pub fn trigger(&self, action: MediaAction) -> bool {
        // Clone out so the handler may re-register itself
        let handler = self.handlers.lock().get(&action).cloned();
        match handler {
            Some(handler) => {
                handler.invoke();
                true
            }
            None => false,
        }
    }
}

impl MediaSession for RecordingMediaSession {
    fn set_metadata(&self, metadata: MediaMetadata) {
        *self.metadata.lock() = Some(metadata);
        *self.metadata_updates.lock() += 1;
    }

    fn set_action_handler(&self, action: MediaAction, handler: Option<ActionHandler>) {
        let mut handlers = self.handlers.lock();
        match handler {
            Some(handler) => {
                handlers.insert(action, handler);
            }
            None => {
                handlers.remove(&action);
            }
        }
    }
}
