// Crate-level error types
// Playback engines never return these to their callers: backend failures are
// logged and absorbed. These cover startup, config and the HTTP server.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Config file unreadable or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    // HTTP server bind / serve failures
    #[error("HTTP server error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, Error>;
