// Entry point for the Heardle player tools
//
// Subcommands:
// - serve:   run the audio endpoint
// - resolve: print how a track reference resolves, as JSON
// - play:    play a snippet of a served clip (feature "native")

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use heardle_player::config::Config;
use heardle_player::source;

#[derive(Parser, Debug)]
#[command(name = "heardle-player", version, about = "Snippet playback engine for a music guessing game")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "HEARDLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve audio clips over HTTP
    Serve {
        /// Address to bind, e.g. 127.0.0.1:3000
        #[arg(long)]
        bind: Option<String>,

        /// Directory holding <id>.mp3 clips
        #[arg(long)]
        audio_dir: Option<PathBuf>,
    },

    /// Resolve a clip id or video URL into a playable source
    Resolve {
        reference: String,
    },

    /// Play a snippet of a served clip through the default audio device
    #[cfg(feature = "native")]
    Play {
        /// Clip id on the audio endpoint
        id: String,

        /// Start offset in seconds
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Snippet length in seconds; plays to the end when omitted
        #[arg(long)]
        seconds: Option<u64>,

        /// Base URL of the audio endpoint
        #[arg(long, default_value = "http://localhost:3000/api/audio")]
        base_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heardle_player=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Serve { bind, audio_dir } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            if let Some(audio_dir) = audio_dir {
                config.server.audio_dir = audio_dir;
            }
            heardle_player::server::run(config)
                .await
                .context("Audio server failed")?;
        }
        Command::Resolve { reference } => {
            let resolved = source::resolve(&reference);
            let json = serde_json::to_string_pretty(&resolved)
                .context("Failed to serialize resolved source")?;
            println!("{json}");
        }
        #[cfg(feature = "native")]
        Command::Play {
            id,
            offset,
            seconds,
            base_url,
        } => play::run(&config, &id, offset, seconds, &base_url).await?,
    }

    Ok(())
}

#[cfg(feature = "native")]
mod play {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{bail, Context, Result};
    use tokio::sync::oneshot;
    use tracing::info;

    use heardle_player::config::Config;
    use heardle_player::media::native::{NativeAudioElement, TracingMediaSession};
    use heardle_player::player::LocalAudioPlayer;
    use heardle_player::source::{self, SourceKind};
    use heardle_player::{Player, SnippetCallbacks};

    pub async fn run(
        config: &Config,
        id: &str,
        offset: u64,
        seconds: Option<u64>,
        base_url: &str,
    ) -> Result<()> {
        let resolved = source::resolve(id);
        if resolved.kind != SourceKind::Local {
            bail!("{id:?} is not a clip id");
        }
        let url = resolved
            .stream_url(base_url)
            .context("Local source without a stream URL")?;

        let element = NativeAudioElement::fetch(&url)
            .await
            .with_context(|| format!("Failed to load {url}"))?;
        let player = LocalAudioPlayer::with_media_session(
            element,
            Arc::new(TracingMediaSession),
            config.session.metadata(),
        )
        .with_start_offset(Duration::from_secs(offset));

        let (finished_tx, finished_rx) = oneshot::channel();
        let callbacks = SnippetCallbacks::new()
            .on_start(|| info!("Snippet started"))
            .on_finish(move || {
                let _ = finished_tx.send(());
            });

        match seconds {
            Some(seconds) => {
                player
                    .play_timed(Duration::from_secs(seconds), callbacks)
                    .await
            }
            None => player.play_until_end(callbacks).await,
        }

        tokio::select! {
            _ = finished_rx => info!("Snippet finished"),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                player.stop().await;
            }
        }
        Ok(())
    }
}
