// ==========================================
// CONFIGURATION
// ==========================================
// Settings are read from a TOML file. Lookup order:
//   1. explicit path (--config on the command line)
//   2. HEARDLE_CONFIG environment variable
//   3. <config dir>/heardle-player/config.toml
//   4. built-in defaults
// Every field has a default, so a partial file is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::media::{Artwork, MediaMetadata};

pub const CONFIG_ENV_VAR: &str = "HEARDLE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub remote: RemotePlayerConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    // Directory holding <id>.mp3 clips
    pub audio_dir: PathBuf,
    pub audio_route: String,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0:3000".to_string(),
            audio_dir: PathBuf::from("public/audio"),
            audio_route: "/api/audio".to_string(),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
    // Upper bound on tracked client addresses
    pub max_clients: usize,
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_requests: 20,
            window_secs: 60,
            max_clients: 10_000,
            sweep_interval_secs: 30,
        }
    }
}

// Timings of the remote (embedded video) player
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemotePlayerConfig {
    pub state_poll_ms: u64,
    pub reassert_ms: u64,
    // Backend stays muted this long after play is issued
    pub unmute_grace_ms: u64,
    pub unmute_attempts: u32,
    pub initial_volume: u8,
}

impl RemotePlayerConfig {
    pub fn state_poll_interval(&self) -> Duration {
        Duration::from_millis(self.state_poll_ms.max(1))
    }

    pub fn reassert_interval(&self) -> Duration {
        Duration::from_millis(self.reassert_ms.max(1))
    }

    pub fn unmute_grace(&self) -> Duration {
        Duration::from_millis(self.unmute_grace_ms)
    }
}

impl Default for RemotePlayerConfig {
    fn default() -> Self {
        RemotePlayerConfig {
            state_poll_ms: 100,
            reassert_ms: 200,
            unmute_grace_ms: 100,
            unmute_attempts: 1,
            initial_volume: 50,
        }
    }
}

// What the OS / browser transport controls display
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork_src: String,
    pub artwork_type: String,
    pub artwork_sizes: Vec<u32>,
}

impl SessionConfig {
    pub fn metadata(&self) -> MediaMetadata {
        MediaMetadata {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            artwork: self
                .artwork_sizes
                .iter()
                .map(|size| Artwork {
                    src: self.artwork_src.clone(),
                    sizes: format!("{size}x{size}"),
                    mime_type: self.artwork_type.clone(),
                })
                .collect(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            title: "Heardle".to_string(),
            artist: "Guess the song!".to_string(),
            album: "Music Quiz Game".to_string(),
            artwork_src: "/favicon.ico".to_string(),
            artwork_type: "image/x-icon".to_string(),
            artwork_sizes: vec![48, 96, 128, 256],
        }
    }
}

impl Config {
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Config, toml::de::Error> {
        toml::from_str(content)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("heardle-player").join("config.toml"))
}
