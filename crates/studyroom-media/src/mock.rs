//! Mock player for testing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use studyroom_types::{Station, StationId, Volume};

use crate::error::MediaError;
use crate::MediaPlayer;

/// A call recorded by [`MockPlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCall {
    Play { station: StationId, volume: Volume },
    Stop,
    SetVolume(Volume),
}

#[derive(Debug, Default)]
struct MockPlayerState {
    calls: Vec<PlayerCall>,
    /// Stations whose streams fail to open.
    unreachable: HashSet<StationId>,
    playing: Option<StationId>,
    shutdown: bool,
}

/// Mock playback backend. Records every call; streams can be made to fail
/// through the handle.
pub struct MockPlayer {
    state: Arc<Mutex<MockPlayerState>>,
}

impl Default for MockPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlayer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockPlayerState::default())),
        }
    }

    /// Get a clonable handle for steering and observing the player from
    /// tests.
    pub fn handle(&self) -> MockPlayerHandle {
        MockPlayerHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockPlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clonable handle for [`MockPlayer`].
#[derive(Clone)]
pub struct MockPlayerHandle {
    state: Arc<Mutex<MockPlayerState>>,
}

impl MockPlayerHandle {
    /// Make `station` fail to open from now on.
    pub fn fail_station(&self, station: StationId) {
        self.lock().unreachable.insert(station);
    }

    /// Let `station` open again.
    pub fn restore_station(&self, station: StationId) {
        self.lock().unreachable.remove(&station);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<PlayerCall> {
        self.lock().calls.clone()
    }

    /// Station currently playing, if any.
    pub fn playing(&self) -> Option<StationId> {
        self.lock().playing
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    fn lock(&self) -> MutexGuard<'_, MockPlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MediaPlayer for MockPlayer {
    async fn play(&mut self, station: &'static Station, volume: Volume) -> Result<(), MediaError> {
        let mut state = self.lock();
        state.calls.push(PlayerCall::Play {
            station: station.id,
            volume,
        });
        if state.unreachable.contains(&station.id) {
            state.playing = None;
            return Err(MediaError::StreamUnreachable {
                station: station.id,
                reason: "connection refused".to_string(),
            });
        }
        state.playing = Some(station.id);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), MediaError> {
        let mut state = self.lock();
        state.calls.push(PlayerCall::Stop);
        state.playing = None;
        Ok(())
    }

    async fn set_volume(&mut self, volume: Volume) -> Result<(), MediaError> {
        self.lock().calls.push(PlayerCall::SetVolume(volume));
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), MediaError> {
        let mut state = self.lock();
        state.playing = None;
        state.shutdown = true;
        Ok(())
    }
}
