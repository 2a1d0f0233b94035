//! Playback backends for the studyroom radio.
//!
//! This crate defines the [`MediaPlayer`] trait the client event loop drives
//! when radio state changes. Real audio output is not part of this crate:
//! the [`LogPlayer`] backend records what it would play, and a mock backend
//! with injectable stream failures is available behind the `mock` feature.

use async_trait::async_trait;
use studyroom_types::{Station, Volume};

pub mod error;
pub mod log;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::MediaError;
pub use log::LogPlayer;

/// Plays one radio stream at a time.
#[async_trait]
pub trait MediaPlayer: Send + 'static {
    /// Start streaming `station`, replacing whatever is playing.
    ///
    /// Fails with [`MediaError::StreamUnreachable`] when the stream cannot
    /// be opened.
    async fn play(&mut self, station: &'static Station, volume: Volume) -> Result<(), MediaError>;

    /// Stop playback. Stopping an idle player is not an error.
    async fn stop(&mut self) -> Result<(), MediaError>;

    /// Change the output volume of the current stream.
    async fn set_volume(&mut self, volume: Volume) -> Result<(), MediaError>;

    /// Stop playback and release the output device.
    async fn shutdown(&mut self) -> Result<(), MediaError>;
}
