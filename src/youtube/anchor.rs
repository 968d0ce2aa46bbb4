// ==========================================
// SILENT SESSION ANCHOR
// ==========================================
// A looping, silent audio element that owns the system media session while
// the audible sound comes from the embedded video player.
//
// The platform hands the session to whichever source produced sound most
// recently, so the anchor re-asserts itself on a fixed cadence: resume the
// element if something paused it, then republish metadata and handlers.
// The pause handler is a no-op on purpose: the OS pause key must not be able
// to silence the anchor and release the session.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::media::{claim_session, ActionHandler, AudioElement, MediaMetadata, MediaSession};

pub struct SessionAnchor {
    element: Arc<dyn AudioElement>,
    session: Arc<dyn MediaSession>,
    metadata: MediaMetadata,
}

impl SessionAnchor {
    pub fn new(
        element: Arc<dyn AudioElement>,
        session: Arc<dyn MediaSession>,
        metadata: MediaMetadata,
    ) -> Self {
        element.set_looping(true);
        element.set_volume(0.0);
        SessionAnchor {
            element,
            session,
            metadata,
        }
    }

    // First attempt usually fails before any user interaction; the next
    // play call resumes the anchor
    pub fn start(&self) {
        if let Err(e) = self.element.play() {
            info!("Session anchor autoplay blocked, will play on first interaction: {}", e);
        }
        self.claim();
    }

    pub fn resume(&self) {
        if let Err(e) = self.element.play() {
            debug!("Session anchor play failed: {}", e);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.element.is_paused()
    }

    pub fn claim(&self) {
        let element = Arc::clone(&self.element);
        claim_session(
            self.session.as_ref(),
            &self.metadata,
            ActionHandler::new(move || {
                if let Err(e) = element.play() {
                    debug!("Session anchor play failed: {}", e);
                }
            }),
            ActionHandler::noop(),
        );
    }

    pub fn reassert(&self) {
        if self.element.is_paused() {
            debug!("Session anchor was paused, resuming");
            self.resume();
        }
        self.claim();
    }

    // Runs until `lifetime` is cancelled
    pub fn spawn_reassertion(
        self: &Arc<Self>,
        interval: Duration,
        lifetime: CancellationToken,
    ) {
        let anchor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = lifetime.cancelled() => break,
                    _ = ticker.tick() => anchor.reassert(),
                }
            }
            debug!("Session anchor re-assertion stopped");
        });
    }
}
