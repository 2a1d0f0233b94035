//! Replication action records.
//!
//! Every message is a flat JSON object: the envelope fields `senderId` and
//! `seq`, the `domain` tag selecting the widget, the `action` tag selecting
//! the verb, and the verb's own fields.
//!
//! ```json
//! {"senderId":"alice","seq":7,"domain":"radio","action":"play","stationId":"classical","volume":40}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::peer::PeerId;
use crate::radio::{RadioState, StationId, Volume};
use crate::timer::TimerState;

/// Widget a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Timer,
    Radio,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Timer, Domain::Radio];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Radio => "radio",
        }
    }

    /// Action tags this domain understands.
    pub fn verbs(self) -> &'static [&'static str] {
        match self {
            Self::Timer => TimerAction::VERBS,
            Self::Radio => RadioAction::VERBS,
        }
    }

    /// Look up a domain by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == tag)
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A replication message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender_id: PeerId,
    /// Per-sender, per-widget sequence number. Absent on the wire means 0.
    #[serde(default)]
    pub seq: u64,
    #[serde(flatten)]
    pub body: Body,
}

impl Message {
    pub fn new(sender_id: PeerId, seq: u64, body: impl Into<Body>) -> Self {
        Self {
            sender_id,
            seq,
            body: body.into(),
        }
    }

    pub fn domain(&self) -> Domain {
        self.body.domain()
    }

    /// The `action` tag of the body.
    pub fn verb(&self) -> &'static str {
        match &self.body {
            Body::Timer(action) => action.verb(),
            Body::Radio(action) => action.verb(),
        }
    }

    /// Semantic checks that the type system does not already enforce.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.body {
            Body::Timer(action) => action.snapshot().validate(),
            Body::Radio(_) => Ok(()),
        }
    }
}

/// Domain-tagged action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "lowercase")]
pub enum Body {
    Timer(TimerAction),
    Radio(RadioAction),
}

impl Body {
    pub fn domain(&self) -> Domain {
        match self {
            Self::Timer(_) => Domain::Timer,
            Self::Radio(_) => Domain::Radio,
        }
    }
}

impl From<TimerAction> for Body {
    fn from(action: TimerAction) -> Self {
        Self::Timer(action)
    }
}

impl From<RadioAction> for Body {
    fn from(action: RadioAction) -> Self {
        Self::Radio(action)
    }
}

/// Timer actions. All but `Reset` carry the sender's full state after the
/// action was applied, so every timer message is also a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum TimerAction {
    Start(TimerState),
    Pause(TimerState),
    Sync(TimerState),
    StartBreak(TimerState),
    BreakComplete(TimerState),
    SkipBreak(TimerState),
    Reset,
}

impl TimerAction {
    pub const VERBS: &'static [&'static str] = &[
        "start",
        "pause",
        "sync",
        "startBreak",
        "breakComplete",
        "skipBreak",
        "reset",
    ];

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Pause(_) => "pause",
            Self::Sync(_) => "sync",
            Self::StartBreak(_) => "startBreak",
            Self::BreakComplete(_) => "breakComplete",
            Self::SkipBreak(_) => "skipBreak",
            Self::Reset => "reset",
        }
    }

    /// The state a receiver should hold after applying this action.
    pub fn snapshot(&self) -> TimerState {
        match self {
            Self::Start(state)
            | Self::Pause(state)
            | Self::Sync(state)
            | Self::StartBreak(state)
            | Self::BreakComplete(state)
            | Self::SkipBreak(state) => *state,
            Self::Reset => TimerState::default(),
        }
    }
}

/// Radio actions. Only the leader originates the control verbs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RadioAction {
    Play {
        station_id: StationId,
        volume: Volume,
    },
    Pause,
    ChangeStation {
        station_id: StationId,
        volume: Volume,
        is_playing: bool,
    },
    SetVolume {
        volume: Volume,
    },
    /// Sent by a joining non-leader; answered by the leader with `Sync`.
    RequestSync,
    Sync(RadioState),
}

impl RadioAction {
    pub const VERBS: &'static [&'static str] = &[
        "play",
        "pause",
        "changeStation",
        "setVolume",
        "requestSync",
        "sync",
    ];

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Play { .. } => "play",
            Self::Pause => "pause",
            Self::ChangeStation { .. } => "changeStation",
            Self::SetVolume { .. } => "setVolume",
            Self::RequestSync => "requestSync",
            Self::Sync(_) => "sync",
        }
    }
}
