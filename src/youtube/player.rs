// ==========================================
// YOUTUBE PLAYER
// ==========================================
// Plays snippets through the embedded video player while a silent anchor
// keeps hold of the system media session.
//
// Lifetime tasks (cancelled when the player is dropped):
// - state poll: refreshes is_playing from the backend on a short interval,
//   the notification stream is too coarse for progress queries
// - anchor re-assertion: see anchor.rs
//
// Per play call:
// - pause a video that is still playing, then seek to the start offset,
//   mute, play
// - after the grace period unmute and reapply the volume, so the video's
//   own audio cannot grab the media session before the anchor re-asserts
// - a watcher fires on_start at the first Playing notification and, for
//   timed snippets, re-queries the backend at the deadline

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use super::adapter::RemoteEngineAdapter;
use super::anchor::SessionAnchor;
use super::engine::{RemoteMediaEngine, RemoteState};
use crate::config::RemotePlayerConfig;
use crate::player::{
    deadline_reached, millis_after, PlaybackSession, Player, SnippetCallbacks, SnippetTracker,
    MAX_VOLUME,
};
use crate::source::{ResolvedSource, SourceKind};

struct Shared {
    engine: RemoteEngineAdapter,
    anchor: Arc<SessionAnchor>,
    config: RemotePlayerConfig,
    state: Mutex<PlaybackSession>,
}

impl Shared {
    fn start_offset(&self) -> Duration {
        self.state.lock().start_offset
    }

    // The anchor keeps playing: stopping it would give up the media session
    async fn halt(&self) {
        self.engine.pause().await;
        self.engine.seek(self.start_offset().as_secs_f64()).await;
    }
}

pub struct YoutubePlayer {
    shared: Arc<Shared>,
    video_id: String,
    lifetime: CancellationToken,
    _lifetime_guard: DropGuard,
}

impl YoutubePlayer {
    pub async fn new(
        engine: Arc<dyn RemoteMediaEngine>,
        anchor: SessionAnchor,
        source: &ResolvedSource,
        config: RemotePlayerConfig,
    ) -> Self {
        if source.kind != SourceKind::Remote {
            warn!("Remote player created for a local source: {}", source.locator);
        }
        let video_id = source.locator.clone();
        info!("Youtube ID is: {}", video_id);

        let engine = RemoteEngineAdapter::new(engine);
        engine.load(&video_id).await;
        engine.hide().await;

        let volume = config.initial_volume.min(MAX_VOLUME);
        engine.set_volume(volume).await;

        let anchor = Arc::new(anchor);
        anchor.start();

        let lifetime = CancellationToken::new();
        anchor.spawn_reassertion(config.reassert_interval(), lifetime.child_token());

        let poll_interval = config.state_poll_interval();
        let shared = Arc::new(Shared {
            engine,
            anchor,
            config,
            state: Mutex::new(PlaybackSession::new(volume, source.start_offset)),
        });
        tokio::spawn(poll_playing_state(
            Arc::clone(&shared),
            poll_interval,
            lifetime.child_token(),
        ));

        YoutubePlayer {
            shared,
            video_id,
            lifetime: lifetime.clone(),
            _lifetime_guard: lifetime.drop_guard(),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    // As of the last state poll
    pub fn is_playing(&self) -> bool {
        self.shared.state.lock().is_playing
    }

    async fn start_snippet(&self, cutoff: Option<Duration>, callbacks: SnippetCallbacks) {
        let (token, offset) = {
            let mut state = self.shared.state.lock();
            (state.begin_snippet(&self.lifetime), state.start_offset)
        };

        self.shared.anchor.resume();

        let engine = &self.shared.engine;
        let events = engine.state_changes();
        // A video that is still playing would not report a new Playing state
        if engine.state().await.is_some_and(RemoteState::is_active) {
            engine.pause().await;
        }
        engine.seek(offset.as_secs_f64()).await;
        engine.mute().await;

        let mut tracker = SnippetTracker::new(callbacks);
        tracker.begin();
        tokio::spawn(watch_snippet(
            Arc::clone(&self.shared),
            tracker,
            events,
            cutoff,
            token.clone(),
        ));

        if !engine.play().await {
            warn!("Remote play failed for {}", self.video_id);
        }

        tokio::spawn(restore_audio(Arc::clone(&self.shared), token));
    }
}

#[async_trait]
impl Player for YoutubePlayer {
    async fn play_until_end(&self, callbacks: SnippetCallbacks) {
        self.start_snippet(None, callbacks).await;
    }

    async fn play_timed(&self, duration: Duration, callbacks: SnippetCallbacks) {
        self.start_snippet(Some(duration), callbacks).await;
    }

    async fn stop(&self) {
        self.shared.halt().await;
    }

    async fn current_position_ms(&self) -> u64 {
        if !self.is_playing() {
            return 0;
        }
        let position = self.shared.engine.current_time().await;
        millis_after(position, self.shared.start_offset())
    }

    // Always read from the backend, there is nothing to wait for
    async fn duration_ms(&self) -> u64 {
        let duration = self.shared.engine.duration().await;
        let millis = millis_after(duration, self.shared.start_offset());
        debug!("Length is: {} ms", millis);
        millis
    }

    fn volume(&self) -> u8 {
        self.shared.state.lock().volume
    }

    async fn set_volume(&self, volume: u8) {
        let volume = volume.min(MAX_VOLUME);
        self.shared.state.lock().volume = volume;
        self.shared.engine.set_volume(volume).await;
    }

    fn start_offset(&self) -> Duration {
        self.shared.start_offset()
    }
}

// ==========================================
// BACKGROUND TASKS
// ==========================================

async fn poll_playing_state(shared: Arc<Shared>, interval: Duration, lifetime: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = lifetime.cancelled() => break,
            _ = ticker.tick() => {
                let playing = shared.engine.is_playing().await;
                shared.state.lock().is_playing = playing;
            }
        }
    }
}

// Unmute once the grace period is over, retrying up to the configured count.
// A newer play call takes over by cancelling `token`.
async fn restore_audio(shared: Arc<Shared>, token: CancellationToken) {
    let attempts = shared.config.unmute_attempts.max(1);
    for attempt in 1..=attempts {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(shared.config.unmute_grace()) => {}
        }

        let volume = shared.state.lock().volume;
        if shared.engine.unmute().await && shared.engine.set_volume(volume).await {
            return;
        }
        warn!("Unmute attempt {}/{} failed", attempt, attempts);
    }
}

async fn watch_snippet(
    shared: Arc<Shared>,
    mut tracker: SnippetTracker,
    mut events: broadcast::Receiver<RemoteState>,
    cutoff: Option<Duration>,
    token: CancellationToken,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = deadline_reached(deadline) => {
                // Deadline poll: only cut off what is still playing
                match shared.engine.state().await {
                    Some(state) if state.is_active() => {
                        shared.halt().await;
                        tracker.cut_off();
                    }
                    state => debug!("Snippet deadline reached in state {:?}, nothing to cut off", state),
                }
                break;
            }
            event = events.recv() => match event {
                Ok(RemoteState::Playing) => {
                    if tracker.mark_playing() {
                        deadline = cutoff.map(|cutoff| Instant::now() + cutoff);
                    }
                }
                Ok(RemoteState::Ended) => {
                    tracker.ended();
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Snippet watcher missed {} state changes", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
