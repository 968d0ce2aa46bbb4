// Remote playback through the embedded YouTube player

pub mod adapter;
pub mod anchor;
pub mod engine;
pub mod extractor;
pub mod player;
pub mod simulated;

pub use adapter::RemoteEngineAdapter;
pub use anchor::SessionAnchor;
pub use engine::{RemoteMediaEngine, RemoteState};
pub use player::YoutubePlayer;
