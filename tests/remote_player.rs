// YoutubePlayer against the simulated remote engine and a simulated anchor

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use heardle_player::config::{RemotePlayerConfig, SessionConfig};
use heardle_player::media::simulated::{RecordingMediaSession, SimulatedAudioElement};
use heardle_player::media::{AudioElement, MediaAction};
use heardle_player::source;
use heardle_player::youtube::simulated::{EngineCall, SimulatedRemoteEngine};
use heardle_player::youtube::{RemoteState, SessionAnchor, YoutubePlayer};
use heardle_player::{Player, SnippetCallbacks};

const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=30s";

type Log = Arc<Mutex<Vec<&'static str>>>;

struct Harness {
    engine: Arc<SimulatedRemoteEngine>,
    anchor: Arc<SimulatedAudioElement>,
    session: Arc<RecordingMediaSession>,
    player: YoutubePlayer,
    log: Log,
}

impl Harness {
    async fn new(config: RemotePlayerConfig) -> Self {
        let engine = Arc::new(SimulatedRemoteEngine::new(200.0));
        let anchor = Arc::new(SimulatedAudioElement::with_duration(5.0));
        let session = Arc::new(RecordingMediaSession::new());

        let session_anchor = SessionAnchor::new(
            anchor.clone(),
            session.clone(),
            SessionConfig::default().metadata(),
        );
        let player = YoutubePlayer::new(
            engine.clone(),
            session_anchor,
            &source::resolve(VIDEO_URL),
            config,
        )
        .await;

        Harness {
            engine,
            anchor,
            session,
            player,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn callbacks(&self) -> SnippetCallbacks {
        self.labelled("start", "finish")
    }

    fn labelled(&self, start: &'static str, finish: &'static str) -> SnippetCallbacks {
        let on_start = Arc::clone(&self.log);
        let on_finish = Arc::clone(&self.log);
        SnippetCallbacks::new()
            .on_start(move || on_start.lock().push(start))
            .on_finish(move || on_finish.lock().push(finish))
    }

    fn log(&self) -> Vec<&'static str> {
        self.log.lock().clone()
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn construction_loads_hides_and_anchors() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    assert_eq!(h.player.video_id(), "dQw4w9WgXcQ");
    assert_eq!(h.player.start_offset(), Duration::from_secs(30));
    assert_eq!(h.engine.loaded_video().as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(h.engine.size(), (0, 0));
    assert_eq!(h.engine.volume_level(), 50);
    assert_eq!(h.player.volume(), 50);

    assert!(!h.anchor.is_paused());
    assert!(h.anchor.is_looping());
    assert_eq!(h.anchor.volume(), 0.0);
    assert_eq!(h.session.metadata().unwrap().artist, "Guess the song!");
}

#[tokio::test(start_paused = true)]
async fn play_seeks_mutes_then_restores_audio_after_grace() {
    let h = Harness::new(RemotePlayerConfig::default()).await;
    h.engine.clear_calls();

    h.player.play_timed(Duration::from_secs(5), h.callbacks()).await;
    assert_eq!(
        h.engine.calls(),
        vec![EngineCall::Seek(30.0), EngineCall::Mute, EngineCall::Play]
    );
    assert!(h.engine.is_muted());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        h.engine.calls(),
        vec![
            EngineCall::Seek(30.0),
            EngineCall::Mute,
            EngineCall::Play,
            EngineCall::Unmute,
            EngineCall::SetVolume(50),
        ]
    );
    assert!(!h.engine.is_muted());
}

#[tokio::test(start_paused = true)]
async fn failed_unmute_is_retried() {
    let config = RemotePlayerConfig {
        unmute_attempts: 3,
        ..RemotePlayerConfig::default()
    };
    let h = Harness::new(config).await;
    h.engine.reject_unmute(1);
    h.engine.clear_calls();

    h.player.play_until_end(h.callbacks()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(h.engine.is_muted());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!h.engine.is_muted());
    let unmutes = h
        .engine
        .calls()
        .iter()
        .filter(|call| **call == EngineCall::Unmute)
        .count();
    assert_eq!(unmutes, 2);
}

#[tokio::test(start_paused = true)]
async fn timed_snippet_cuts_off_a_playing_video() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    h.player.play_timed(Duration::from_secs(5), h.callbacks()).await;
    settle().await;
    assert_eq!(h.log(), vec!["start"]);

    h.engine.advance(4.0);
    tokio::time::sleep(Duration::from_millis(5100)).await;
    assert_eq!(h.log(), vec!["start", "finish"]);
    assert_eq!(h.engine.current_state(), RemoteState::Paused);
    assert_eq!(h.engine.position(), 30.0);
    // Stopping the video never stops the anchor
    assert!(!h.anchor.is_paused());
}

#[tokio::test(start_paused = true)]
async fn deadline_leaves_a_paused_video_alone() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    h.player.play_timed(Duration::from_secs(5), h.callbacks()).await;
    settle().await;
    h.engine.set_state(RemoteState::Paused);
    h.engine.clear_calls();

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.log(), vec!["start"]);
    assert!(!h.engine.calls().contains(&EngineCall::Pause));
}

#[tokio::test(start_paused = true)]
async fn stop_during_pending_cutoff_never_finishes() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    h.player.play_timed(Duration::from_secs(5), h.callbacks()).await;
    settle().await;
    h.player.stop().await;
    h.engine.clear_calls();

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.log(), vec!["start"]);
    assert_eq!(h.engine.current_state(), RemoteState::Paused);
    let calls = h.engine.calls();
    assert!(!calls.contains(&EngineCall::Pause));
    assert!(!calls.iter().any(|call| matches!(call, EngineCall::Seek(_))));
}

#[tokio::test(start_paused = true)]
async fn new_play_call_replaces_the_previous_snippet() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    h.player
        .play_timed(Duration::from_secs(5), h.labelled("first start", "first finish"))
        .await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    h.engine.clear_calls();
    h.player
        .play_timed(Duration::from_secs(5), h.labelled("second start", "second finish"))
        .await;
    settle().await;
    // The still playing video is paused first so it reports Playing again
    assert_eq!(
        h.engine.calls(),
        vec![
            EngineCall::Pause,
            EngineCall::Seek(30.0),
            EngineCall::Mute,
            EngineCall::Play,
        ]
    );
    assert_eq!(h.log(), vec!["first start", "second start"]);

    // Past the first snippet's deadline
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(h.log(), vec!["first start", "second start"]);
    assert_eq!(h.engine.current_state(), RemoteState::Playing);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        h.log(),
        vec!["first start", "second start", "second finish"]
    );
    assert_eq!(h.engine.current_state(), RemoteState::Paused);
}

#[tokio::test(start_paused = true)]
async fn natural_end_finishes_once() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    h.player.play_timed(Duration::from_secs(5), h.callbacks()).await;
    settle().await;
    h.engine.advance(200.0);
    settle().await;
    assert_eq!(h.log(), vec!["start", "finish"]);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.log(), vec!["start", "finish"]);
}

#[tokio::test(start_paused = true)]
async fn rejected_play_never_starts() {
    let h = Harness::new(RemotePlayerConfig::default()).await;
    h.engine.reject_play(true);

    h.player.play_timed(Duration::from_secs(5), h.callbacks()).await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(h.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_rewinds_the_video_and_keeps_the_anchor() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    h.player.play_until_end(h.callbacks()).await;
    settle().await;
    h.engine.advance(12.0);

    h.player.stop().await;
    assert_eq!(h.engine.current_state(), RemoteState::Paused);
    assert_eq!(h.engine.position(), 30.0);
    assert!(!h.anchor.is_paused());

    h.player.stop().await;
    assert_eq!(h.engine.position(), 30.0);
}

#[tokio::test(start_paused = true)]
async fn anchor_resumes_after_being_paused() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    h.anchor.pause();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!h.anchor.is_paused());
}

#[tokio::test(start_paused = true)]
async fn os_pause_key_cannot_silence_the_anchor() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    assert!(h.session.trigger(MediaAction::Pause));
    assert!(!h.anchor.is_paused());

    h.anchor.pause();
    assert!(h.session.trigger(MediaAction::Play));
    assert!(!h.anchor.is_paused());

    for action in MediaAction::UNSUPPORTED {
        assert!(!h.session.has_handler(action));
    }
}

#[tokio::test(start_paused = true)]
async fn play_call_resumes_a_paused_anchor() {
    let h = Harness::new(RemotePlayerConfig::default()).await;
    h.anchor.pause();

    h.player.play_until_end(h.callbacks()).await;
    assert!(!h.anchor.is_paused());
}

#[tokio::test(start_paused = true)]
async fn position_and_duration_are_relative_to_the_offset() {
    let h = Harness::new(RemotePlayerConfig::default()).await;
    assert_eq!(h.player.current_position_ms().await, 0);
    assert_eq!(h.player.duration_ms().await, 170_000);

    h.player.play_until_end(h.callbacks()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(h.player.is_playing());

    h.engine.advance(2.0);
    assert_eq!(h.player.current_position_ms().await, 2000);
}

#[tokio::test(start_paused = true)]
async fn volume_is_forwarded_and_clamped() {
    let h = Harness::new(RemotePlayerConfig::default()).await;

    h.player.set_volume(70).await;
    assert_eq!(h.player.volume(), 70);
    assert_eq!(h.engine.volume_level(), 70);

    h.player.set_volume(180).await;
    assert_eq!(h.player.volume(), 100);
    assert_eq!(h.engine.volume_level(), 100);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_player_stops_reassertion() {
    let h = Harness::new(RemotePlayerConfig::default()).await;
    let anchor = Arc::clone(&h.anchor);
    drop(h);
    settle().await;

    anchor.pause();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(anchor.is_paused());
}
