//! Shared radio state and the fixed station catalog.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A streamable station in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Station {
    pub id: StationId,
    pub name: &'static str,
    pub url: &'static str,
}

/// Identifier of a station in [`STATIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StationId {
    #[default]
    LofiGirl,
    Classical,
    Pop,
    ClassicRock,
    ElectronicDance,
    HipHop,
    AmbientChill,
    SmoothJazz,
}

/// The station catalog, in display order.
pub const STATIONS: [Station; 8] = [
    Station {
        id: StationId::LofiGirl,
        name: "Lofi Girl Radio",
        url: "http://stream.zeno.fm/f3wvbbqmdg8uv",
    },
    Station {
        id: StationId::Classical,
        name: "Classical",
        url: "http://listen.181fm.com/181-classical_128k.mp3",
    },
    Station {
        id: StationId::Pop,
        name: "Pop (Top 40)",
        url: "http://listen.181fm.com/181-top40_128k.mp3",
    },
    Station {
        id: StationId::ClassicRock,
        name: "Classic Rock",
        url: "http://listen.181fm.com/181-classicrock_128k.mp3",
    },
    Station {
        id: StationId::ElectronicDance,
        name: "Electronic Dance",
        url: "http://listen.181fm.com/181-energy_128k.mp3",
    },
    Station {
        id: StationId::HipHop,
        name: "Hip Hop Beats",
        url: "http://listen.181fm.com/181-hiphop_128k.mp3",
    },
    Station {
        id: StationId::AmbientChill,
        name: "Ambient Chill",
        url: "http://listen.181fm.com/181-chill_128k.mp3",
    },
    Station {
        id: StationId::SmoothJazz,
        name: "Smooth Jazz 24/7",
        url: "http://smoothjazz.com.pl:8000/stream",
    },
];

impl StationId {
    /// Catalog entry for this ID.
    pub fn station(self) -> &'static Station {
        // STATIONS is declared in variant order.
        &STATIONS[self as usize]
    }

    /// Wire and CLI spelling of the ID.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LofiGirl => "lofi-girl",
            Self::Classical => "classical",
            Self::Pop => "pop",
            Self::ClassicRock => "classic-rock",
            Self::ElectronicDance => "electronic-dance",
            Self::HipHop => "hip-hop",
            Self::AmbientChill => "ambient-chill",
            Self::SmoothJazz => "smooth-jazz",
        }
    }
}

impl std::str::FromStr for StationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STATIONS
            .iter()
            .map(|station| station.id)
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownStation(s.to_string()))
    }
}

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback volume in percent, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Volume(u8);

impl Volume {
    pub const MAX: u8 = 100;

    pub fn new(percent: u8) -> Result<Self, ValidationError> {
        if percent > Self::MAX {
            return Err(ValidationError::VolumeOutOfRange(percent));
        }
        Ok(Self(percent))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Linear gain in `0.0..=1.0` for audio backends.
    pub fn gain(self) -> f32 {
        f32::from(self.0) / f32::from(Self::MAX)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(50)
    }
}

impl TryFrom<u8> for Volume {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Volume> for u8 {
    fn from(volume: Volume) -> Self {
        volume.0
    }
}

impl std::fmt::Display for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Replicated radio control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioState {
    pub station_id: StationId,
    pub is_playing: bool,
    pub volume: Volume,
}

impl RadioState {
    pub fn station(&self) -> &'static Station {
        self.station_id.station()
    }
}

impl std::fmt::Display for RadioState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.is_playing { "playing" } else { "stopped" };
        write!(f, "{} ({status}, {})", self.station().name, self.volume)
    }
}
