// ==========================================
// NATIVE AUDIO ELEMENT (rodio)
// ==========================================
// Plays a clip fetched from the audio endpoint through the default output
// device.
//
// Rodio's Sink has no seek and no position query (0.17), so:
// - seeking re-queues a fresh decoder that skips ahead to the target
// - the position is tracked with Instants: base position + time played
//   since the last resume
// - the natural end is detected by polling sink.empty() from a small task
//
// The OutputStream must outlive the Sink but cannot cross threads, so it is
// leaked once per element.

use std::io::Cursor;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, Sink, Source};
use tokio::sync::broadcast;
use tracing::debug;

use super::{AudioElement, BackendError, ElementEvent, MediaMetadata, MediaSession};
use super::{ActionHandler, MediaAction};

const EVENT_CAPACITY: usize = 64;
const END_POLL_INTERVAL: Duration = Duration::from_millis(50);

type ClipBytes = Arc<[u8]>;

struct Playhead {
    paused: bool,
    looping: bool,
    // Position when playback last resumed or seeked
    base: f64,
    resumed_at: Option<Instant>,
}

impl Playhead {
    fn position(&self) -> f64 {
        match self.resumed_at {
            Some(resumed_at) => self.base + resumed_at.elapsed().as_secs_f64(),
            None => self.base,
        }
    }
}

pub struct NativeAudioElement {
    sink: Sink,
    bytes: ClipBytes,
    duration: Option<f64>,
    playhead: Mutex<Playhead>,
    events: broadcast::Sender<ElementEvent>,
}

impl NativeAudioElement {
    // Download a clip, e.g. "http://localhost:3000/api/audio?id=song-1"
    pub async fn fetch(url: &str) -> Result<Arc<Self>, BackendError> {
        let response = reqwest::get(url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| BackendError::Fetch(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Fetch(e.to_string()))?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Self::from_bytes(bytes.to_vec().into()).await
    }

    pub async fn from_bytes(bytes: ClipBytes) -> Result<Arc<Self>, BackendError> {
        let probe = Arc::clone(&bytes);
        let duration = tokio::task::spawn_blocking(move || measure_duration(probe))
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))??;

        let sink = open_sink()?;
        sink.pause();

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let element = Arc::new(NativeAudioElement {
            sink,
            bytes,
            duration,
            playhead: Mutex::new(Playhead {
                paused: true,
                looping: false,
                base: 0.0,
                resumed_at: None,
            }),
            events,
        });
        element.queue_from(0.0)?;

        tokio::spawn(watch_for_end(Arc::downgrade(&element)));
        Ok(element)
    }

    // Replace whatever is queued with the clip starting at `seconds`
    fn queue_from(&self, seconds: f64) -> Result<(), BackendError> {
        let decoder = Decoder::new(Cursor::new(Arc::clone(&self.bytes)))
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        self.sink.stop();
        self.sink
            .append(decoder.skip_duration(Duration::from_secs_f64(seconds.max(0.0))));
        Ok(())
    }

    fn check_ended(&self) {
        let ended = {
            let mut playhead = self.playhead.lock();
            if playhead.paused || !self.sink.empty() {
                return;
            }
            if playhead.looping {
                if let Err(e) = self.queue_from(0.0) {
                    debug!("Failed to loop clip: {}", e);
                }
                playhead.base = 0.0;
                playhead.resumed_at = Some(Instant::now());
                false
            } else {
                playhead.paused = true;
                playhead.base = self.duration.unwrap_or_else(|| playhead.position());
                playhead.resumed_at = None;
                true
            }
        };
        if ended {
            self.emit(ElementEvent::Pause);
            self.emit(ElementEvent::Ended);
        }
    }

    fn emit(&self, event: ElementEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for NativeAudioElement {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

impl AudioElement for NativeAudioElement {
    fn play(&self) -> Result<(), BackendError> {
        {
            let mut playhead = self.playhead.lock();
            if !playhead.paused {
                return Ok(());
            }
            // Finished clips restart from the top
            if self.sink.empty() {
                self.queue_from(0.0)?;
                playhead.base = 0.0;
            }
            self.sink.play();
            playhead.paused = false;
            playhead.resumed_at = Some(Instant::now());
        }
        self.emit(ElementEvent::Play);
        Ok(())
    }

    fn pause(&self) {
        {
            let mut playhead = self.playhead.lock();
            if playhead.paused {
                return;
            }
            self.sink.pause();
            playhead.base = playhead.position();
            playhead.resumed_at = None;
            playhead.paused = true;
        }
        self.emit(ElementEvent::Pause);
    }

    fn is_paused(&self) -> bool {
        self.playhead.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.playhead.lock().position()
    }

    fn set_current_time(&self, seconds: f64) {
        let seconds = match self.duration {
            Some(duration) => seconds.clamp(0.0, duration),
            None => seconds.max(0.0),
        };
        let mut playhead = self.playhead.lock();
        if let Err(e) = self.queue_from(seconds) {
            debug!("Seek failed: {}", e);
            return;
        }
        playhead.base = seconds;
        if !playhead.paused {
            playhead.resumed_at = Some(Instant::now());
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    fn set_looping(&self, looping: bool) {
        self.playhead.lock().looping = looping;
    }

    fn subscribe(&self) -> broadcast::Receiver<ElementEvent> {
        self.events.subscribe()
    }
}

fn open_sink() -> Result<Sink, BackendError> {
    let (stream, handle) =
        OutputStream::try_default().map_err(|e| BackendError::Unavailable(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| BackendError::Unavailable(e.to_string()))?;
    std::mem::forget(stream);
    Ok(sink)
}

// Decoders rarely know their length up front; count samples when they don't
fn measure_duration(bytes: ClipBytes) -> Result<Option<f64>, BackendError> {
    let decoder =
        Decoder::new(Cursor::new(bytes)).map_err(|e| BackendError::Decode(e.to_string()))?;
    if let Some(duration) = decoder.total_duration() {
        return Ok(Some(duration.as_secs_f64()));
    }

    let channels = f64::from(decoder.channels());
    let sample_rate = f64::from(decoder.sample_rate());
    if channels == 0.0 || sample_rate == 0.0 {
        return Ok(None);
    }
    let samples = decoder.count() as f64;
    Ok(Some(samples / channels / sample_rate))
}

async fn watch_for_end(element: Weak<NativeAudioElement>) {
    let mut ticker = tokio::time::interval(END_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        match element.upgrade() {
            Some(element) => element.check_ended(),
            None => break,
        }
    }
}

// ==========================================
// TRACING MEDIA SESSION
// ==========================================
// Terminal stand-in for the OS media session: logs what would be shown.

#[derive(Default)]
pub struct TracingMediaSession;

impl MediaSession for TracingMediaSession {
    fn set_metadata(&self, metadata: MediaMetadata) {
        debug!(
            "Now playing: {} - {} ({})",
            metadata.title, metadata.artist, metadata.album
        );
    }

    fn set_action_handler(&self, action: MediaAction, handler: Option<ActionHandler>) {
        debug!("Media session {:?} handler set: {}", action, handler.is_some());
    }
}
