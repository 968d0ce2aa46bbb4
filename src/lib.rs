// Snippet playback engine for a music guessing game
//
// - player: the Player contract and the local audio clip player
// - youtube: the embedded video player backend and its session anchor
// - source: turning track references into playable sources
// - server: the HTTP endpoint serving audio clips
// - media: backend seams (audio element, media session)

pub mod config;
pub mod error;
pub mod media;
pub mod player;
pub mod server;
pub mod source;
pub mod youtube;

pub use error::{Error, Result};
pub use player::{Player, SnippetCallbacks};
