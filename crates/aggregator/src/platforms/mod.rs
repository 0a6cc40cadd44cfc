//! Platform-specific chat sources.

pub mod facebook;
pub(crate) mod graph;
pub mod kick;
pub mod youtube;

pub use facebook::FacebookSource;
pub use kick::{KickConfig, KickSource, KickTransport};
pub use youtube::{YouTubeConfig, YouTubeSource};
