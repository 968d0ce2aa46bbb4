// ==========================================
// PLAYBACK ENGINE CONTRACT
// ==========================================
// Both backends (local audio clip, embedded remote video) implement Player,
// so game code can hold an Arc<dyn Player> and never care which one it got.
//
// Error policy: nothing here returns a Result. A backend that refuses to
// play (autoplay blocked, player not ready, ...) is logged and the caller
// simply never sees on_start.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub mod audio;
pub mod snippet;

pub use audio::LocalAudioPlayer;
pub use snippet::{SnippetPhase, SnippetTracker};

pub type Callback = Box<dyn FnOnce() + Send + 'static>;

// Notifications for one play call. Both are optional.
#[derive(Default)]
pub struct SnippetCallbacks {
    pub(crate) on_start: Option<Callback>,
    pub(crate) on_finish: Option<Callback>,
}

impl SnippetCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(callback));
        self
    }

    pub fn on_finish(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for SnippetCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnippetCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}

#[async_trait]
pub trait Player: Send + Sync {
    // Play from the start offset until the source ends on its own
    async fn play_until_end(&self, callbacks: SnippetCallbacks);

    // Play from the start offset and cut off `duration` after playback
    // actually starts
    async fn play_timed(&self, duration: Duration, callbacks: SnippetCallbacks);

    // Pause and rewind to the start offset. Idempotent.
    async fn stop(&self);

    // Milliseconds played since the start offset, 0 when not playing
    async fn current_position_ms(&self) -> u64;

    // Playable milliseconds after the start offset
    async fn duration_ms(&self) -> u64;

    fn volume(&self) -> u8;

    async fn set_volume(&self, volume: u8);

    fn start_offset(&self) -> Duration;
}

// ==========================================
// SHARED SESSION STATE
// ==========================================

pub const DEFAULT_VOLUME: u8 = 50;
pub const MAX_VOLUME: u8 = 100;

#[derive(Debug)]
pub(crate) struct PlaybackSession {
    pub is_playing: bool,
    pub volume: u8,
    pub start_offset: Duration,
    // Watcher of the most recent play call
    snippet: Option<CancellationToken>,
}

impl PlaybackSession {
    pub fn new(volume: u8, start_offset: Duration) -> Self {
        PlaybackSession {
            is_playing: false,
            volume: volume.min(MAX_VOLUME),
            start_offset,
            snippet: None,
        }
    }

    // Retire the previous play call's watcher and hand out a token for the next
    pub fn begin_snippet(&mut self, lifetime: &CancellationToken) -> CancellationToken {
        if let Some(previous) = self.snippet.take() {
            previous.cancel();
        }
        let token = lifetime.child_token();
        self.snippet = Some(token.clone());
        token
    }
}

// Milliseconds between `from` and `position`, floored at zero
pub(crate) fn millis_after(position: f64, from: Duration) -> u64 {
    let millis = (position - from.as_secs_f64()) * 1000.0;
    if millis.is_finite() && millis > 0.0 {
        millis.round() as u64
    } else {
        0
    }
}

// Sleeps until the deadline, or forever when no deadline is armed
pub(crate) async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
