//! A player that only logs.

use async_trait::async_trait;
use studyroom_types::{Station, Volume};
use tracing::info;

use crate::error::MediaError;
use crate::MediaPlayer;

/// Logs every playback change instead of producing audio.
#[derive(Debug, Default)]
pub struct LogPlayer {
    current: Option<&'static Station>,
    volume: Volume,
    shut_down: bool,
}

impl LogPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The station currently "playing".
    pub fn current(&self) -> Option<&'static Station> {
        self.current
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    fn ensure_running(&self) -> Result<(), MediaError> {
        if self.shut_down {
            return Err(MediaError::ShutDown);
        }
        Ok(())
    }
}

#[async_trait]
impl MediaPlayer for LogPlayer {
    async fn play(&mut self, station: &'static Station, volume: Volume) -> Result<(), MediaError> {
        self.ensure_running()?;
        info!(station = station.name, url = station.url, %volume, "playing");
        self.current = Some(station);
        self.volume = volume;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), MediaError> {
        self.ensure_running()?;
        if let Some(station) = self.current.take() {
            info!(station = station.name, "stopped");
        }
        Ok(())
    }

    async fn set_volume(&mut self, volume: Volume) -> Result<(), MediaError> {
        self.ensure_running()?;
        info!(%volume, "volume");
        self.volume = volume;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), MediaError> {
        self.current = None;
        self.shut_down = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyroom_types::StationId;

    #[tokio::test]
    async fn tracks_current_station() {
        let mut player = LogPlayer::new();
        let volume = Volume::new(30).unwrap();

        player.play(StationId::Pop.station(), volume).await.unwrap();
        assert_eq!(player.current().map(|s| s.id), Some(StationId::Pop));
        assert_eq!(player.volume(), volume);

        player.stop().await.unwrap();
        assert!(player.current().is_none());
        // Stopping twice is fine.
        player.stop().await.unwrap();
    }

    #[tokio::test]
    async fn refuses_work_after_shutdown() {
        let mut player = LogPlayer::new();
        player.shutdown().await.unwrap();
        assert!(matches!(
            player
                .play(StationId::Classical.station(), Volume::default())
                .await,
            Err(MediaError::ShutDown)
        ));
    }
}
