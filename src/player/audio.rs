// ==========================================
// LOCAL AUDIO PLAYER
// ==========================================
// Plays a clip served by our own audio endpoint through an AudioElement.
// It handles:
// - Seeking to the start offset before every play call
// - Timed snippets (cut off N seconds after playback really starts)
// - Play-to-end snippets
// - Tracking "now playing" from element events (never polled)
// - Publishing the media session on every play event
//
// Key Concept: one watcher task per play call
// The element's events are broadcast. Each play call subscribes, spawns a
// watcher that owns a SnippetTracker plus the optional cutoff deadline, and
// cancels the previous call's watcher. All tasks hang off the player's
// lifetime token and stop when the player is dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use super::{
    deadline_reached, millis_after, PlaybackSession, Player, SnippetCallbacks, SnippetTracker,
    DEFAULT_VOLUME, MAX_VOLUME,
};
use crate::media::{
    claim_session, ActionHandler, AudioElement, ElementEvent, MediaMetadata, MediaSession,
};

struct Shared {
    element: Arc<dyn AudioElement>,
    session: Option<Arc<dyn MediaSession>>,
    metadata: MediaMetadata,
    state: Mutex<PlaybackSession>,
}

impl Shared {
    // Pause and rewind to the start offset
    fn halt(&self) {
        self.element.pause();
        let offset = self.state.lock().start_offset;
        if offset > Duration::ZERO {
            self.element.set_current_time(offset.as_secs_f64());
        }
    }

    // Lock-screen play resumes the clip, pause pauses it
    fn publish_session(&self) {
        let Some(session) = &self.session else {
            return;
        };

        let play_element = Arc::clone(&self.element);
        let pause_element = Arc::clone(&self.element);
        claim_session(
            session.as_ref(),
            &self.metadata,
            ActionHandler::new(move || {
                if let Err(e) = play_element.play() {
                    debug!("Media session play ignored: {}", e);
                }
            }),
            ActionHandler::new(move || pause_element.pause()),
        );
    }
}

pub struct LocalAudioPlayer {
    shared: Arc<Shared>,
    lifetime: CancellationToken,
    _lifetime_guard: DropGuard,
}

impl LocalAudioPlayer {
    // Must be called inside a Tokio runtime: the event listener is spawned here
    pub fn new(element: Arc<dyn AudioElement>) -> Self {
        Self::build(element, None, MediaMetadata::default())
    }

    pub fn with_media_session(
        element: Arc<dyn AudioElement>,
        session: Arc<dyn MediaSession>,
        metadata: MediaMetadata,
    ) -> Self {
        Self::build(element, Some(session), metadata)
    }

    fn build(
        element: Arc<dyn AudioElement>,
        session: Option<Arc<dyn MediaSession>>,
        metadata: MediaMetadata,
    ) -> Self {
        element.set_volume(f32::from(DEFAULT_VOLUME) / 100.0);

        let shared = Arc::new(Shared {
            element,
            session,
            metadata,
            state: Mutex::new(PlaybackSession::new(DEFAULT_VOLUME, Duration::ZERO)),
        });
        shared.publish_session();

        let lifetime = CancellationToken::new();
        tokio::spawn(track_playing_state(
            Arc::clone(&shared),
            shared.element.subscribe(),
            lifetime.clone(),
        ));

        LocalAudioPlayer {
            shared,
            lifetime: lifetime.clone(),
            _lifetime_guard: lifetime.drop_guard(),
        }
    }

    pub fn with_start_offset(self, offset: Duration) -> Self {
        self.set_start_offset(offset);
        self
    }

    // Where every play call starts from
    pub fn set_start_offset(&self, offset: Duration) {
        self.shared.state.lock().start_offset = offset;
    }

    pub fn is_playing(&self) -> bool {
        self.shared.state.lock().is_playing
    }

    fn start_snippet(&self, cutoff: Option<Duration>, callbacks: SnippetCallbacks) {
        let (token, offset) = {
            let mut state = self.shared.state.lock();
            (state.begin_snippet(&self.lifetime), state.start_offset)
        };

        let element = &self.shared.element;
        let events = element.subscribe();

        // A clip that is still playing would not report a new play transition
        if !element.is_paused() {
            element.pause();
        }
        element.set_current_time(offset.as_secs_f64());

        let mut tracker = SnippetTracker::new(callbacks);
        tracker.begin();
        tokio::spawn(watch_snippet(
            Arc::clone(&self.shared),
            tracker,
            events,
            cutoff,
            token,
        ));

        if let Err(e) = element.play() {
            warn!("Audio play failed: {}", e);
        }
    }
}

#[async_trait]
impl Player for LocalAudioPlayer {
    async fn play_until_end(&self, callbacks: SnippetCallbacks) {
        self.start_snippet(None, callbacks);
    }

    async fn play_timed(&self, duration: Duration, callbacks: SnippetCallbacks) {
        self.start_snippet(Some(duration), callbacks);
    }

    async fn stop(&self) {
        self.shared.halt();
    }

    async fn current_position_ms(&self) -> u64 {
        let (playing, offset) = {
            let state = self.shared.state.lock();
            (state.is_playing, state.start_offset)
        };
        if !playing {
            return 0;
        }
        millis_after(self.shared.element.current_time(), offset)
    }

    // Waits for LoadedMetadata when the duration is not known yet
    async fn duration_ms(&self) -> u64 {
        let mut events = self.shared.element.subscribe();
        loop {
            if let Some(duration) = self.shared.element.duration().filter(|d| d.is_finite()) {
                return millis_after(duration, self.start_offset());
            }
            match events.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => {
                    debug!("Audio element went away before metadata loaded");
                    return 0;
                }
            }
        }
    }

    fn volume(&self) -> u8 {
        self.shared.state.lock().volume
    }

    async fn set_volume(&self, volume: u8) {
        let volume = volume.min(MAX_VOLUME);
        self.shared.state.lock().volume = volume;
        self.shared.element.set_volume(f32::from(volume) / 100.0);
    }

    fn start_offset(&self) -> Duration {
        self.shared.state.lock().start_offset
    }
}

// ==========================================
// BACKGROUND TASKS
// ==========================================

// Keeps is_playing in sync with the element for the player's lifetime
async fn track_playing_state(
    shared: Arc<Shared>,
    mut events: broadcast::Receiver<ElementEvent>,
    lifetime: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = lifetime.cancelled() => break,
            event = events.recv() => match event {
                Ok(ElementEvent::Play) => {
                    shared.state.lock().is_playing = true;
                    shared.publish_session();
                }
                Ok(ElementEvent::Pause) | Ok(ElementEvent::Ended) => {
                    shared.state.lock().is_playing = false;
                }
                Ok(ElementEvent::LoadedMetadata) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} audio element events, resyncing", skipped);
                    shared.state.lock().is_playing = !shared.element.is_paused();
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

async fn watch_snippet(
    shared: Arc<Shared>,
    mut tracker: SnippetTracker,
    mut events: broadcast::Receiver<ElementEvent>,
    cutoff: Option<Duration>,
    token: CancellationToken,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = deadline_reached(deadline) => {
                shared.halt();
                tracker.cut_off();
                break;
            }
            event = events.recv() => match event {
                Ok(ElementEvent::Play) => {
                    if tracker.mark_playing() {
                        deadline = cutoff.map(|cutoff| Instant::now() + cutoff);
                    }
                }
                Ok(ElementEvent::Pause) => {
                    // Paused from outside: the cutoff no longer applies
                    if deadline.take().is_some() {
                        debug!("Snippet cutoff cancelled by pause");
                    }
                }
                Ok(ElementEvent::Ended) => {
                    tracker.ended();
                    break;
                }
                Ok(ElementEvent::LoadedMetadata) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Snippet watcher missed {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
