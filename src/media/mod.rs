// ==========================================
// MEDIA BACKEND SEAMS
// ==========================================
// The playback engines never talk to a concrete audio device or OS media
// session directly. They go through the two traits in this module:
//
// AudioElement
//   - A single loaded audio clip with play/pause/seek/volume controls
//   - Emits Play / Pause / Ended / LoadedMetadata events on a broadcast channel
//   - Used by the local-file player and by the silent session anchor
//
// MediaSession
//   - The OS / browser registry behind lock-screen and hardware media keys
//   - Holds one metadata block plus one optional handler per action
//
// Implementations:
// - simulated: deterministic in-memory versions (tests, demos)
// - native (feature "native"): rodio-backed element for real playback

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

#[cfg(feature = "native")]
pub mod native;
pub mod simulated;

// Errors reported by a backend. Engines log these and carry on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    // e.g. autoplay blocked until the user interacts with the page
    #[error("playback rejected: {0}")]
    Rejected(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to fetch media: {0}")]
    Fetch(String),

    #[error("failed to decode media: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementEvent {
    Play,
    Pause,
    // Natural end of the clip. A Pause event always comes first.
    Ended,
    // Duration became known
    LoadedMetadata,
}

pub trait AudioElement: Send + Sync {
    // Start or resume. Emits Play when transitioning from paused.
    fn play(&self) -> Result<(), BackendError>;

    // Emits Pause when transitioning from playing. No-op when already paused.
    fn pause(&self);

    fn is_paused(&self) -> bool;

    // Position in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    // None until metadata is loaded
    fn duration(&self) -> Option<f64>;

    // 0.0 ..= 1.0
    fn set_volume(&self, volume: f32);

    fn set_looping(&self, looping: bool);

    fn subscribe(&self) -> broadcast::Receiver<ElementEvent>;
}

// ==========================================
// MEDIA SESSION
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artwork {
    pub src: String,
    pub sizes: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Vec<Artwork>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaAction {
    Play,
    Pause,
    SeekForward,
    SeekBackward,
    PreviousTrack,
    NextTrack,
}

impl MediaAction {
    // Transport actions the game never supports
    pub const UNSUPPORTED: [MediaAction; 4] = [
        MediaAction::SeekBackward,
        MediaAction::SeekForward,
        MediaAction::PreviousTrack,
        MediaAction::NextTrack,
    ];
}

#[derive(Clone)]
pub struct ActionHandler(Arc<dyn Fn() + Send + Sync>);

impl ActionHandler {
    pub fn new(handler: impl Fn() + Send + Sync + 'static) -> Self {
        ActionHandler(Arc::new(handler))
    }

    // Handler that deliberately does nothing, but keeps the action registered
    pub fn noop() -> Self {
        ActionHandler::new(|| {})
    }

    pub fn invoke(&self) {
        (self.0)()
    }
}

impl fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActionHandler")
    }
}

pub trait MediaSession: Send + Sync {
    fn set_metadata(&self, metadata: MediaMetadata);

    // None clears the handler for that action
    fn set_action_handler(&self, action: MediaAction, handler: Option<ActionHandler>);
}

// Publish metadata plus play/pause handlers, clearing every other action
pub fn claim_session(
    session: &dyn MediaSession,
    metadata: &MediaMetadata,
    on_play: ActionHandler,
    on_pause: ActionHandler,
) {
    session.set_metadata(metadata.clone());
    session.set_action_handler(MediaAction::Play, Some(on_play));
    session.set_action_handler(MediaAction::Pause, Some(on_pause));
    for action in MediaAction::UNSUPPORTED {
        session.set_action_handler(action, None);
    }
}
