//! Study/break cycle timer state.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Length of a study phase.
pub const POMODORO_SECONDS: u32 = 25 * 60;

/// Length of a regular break.
pub const SHORT_BREAK_SECONDS: u32 = 5 * 60;

/// Length of the break after every [`CYCLES_PER_LONG_BREAK`]th study phase.
pub const LONG_BREAK_SECONDS: u32 = 15 * 60;

pub const CYCLES_PER_LONG_BREAK: u32 = 4;

/// Seconds of continuous running between periodic snapshots.
pub const SYNC_INTERVAL_SECONDS: u32 = 5;

/// Which half of the cycle the timer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    Pomodoro,
    Break,
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pomodoro => write!(f, "pomodoro"),
            Self::Break => write!(f, "break"),
        }
    }
}

/// Countdown phase within the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    /// Countdown reached zero. Only visible on the wire from peers that do
    /// not auto-advance; a local replica passes through it within one tick.
    Completed,
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Full timer state. Doubles as the snapshot carried by every timer action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: TimerMode,
    pub phase: TimerPhase,
    pub remaining_seconds: u32,
    pub completed_cycles: u32,
}

impl Default for TimerState {
    fn default() -> Self {
        Self::fresh(0)
    }
}

impl TimerState {
    /// An idle study phase with the given cycle count.
    pub fn fresh(completed_cycles: u32) -> Self {
        Self {
            mode: TimerMode::Pomodoro,
            phase: TimerPhase::Idle,
            remaining_seconds: POMODORO_SECONDS,
            completed_cycles,
        }
    }

    /// Break length that follows the study phase which brought the count to
    /// `completed_cycles`.
    pub fn break_seconds(completed_cycles: u32) -> u32 {
        if completed_cycles > 0 && completed_cycles % CYCLES_PER_LONG_BREAK == 0 {
            LONG_BREAK_SECONDS
        } else {
            SHORT_BREAK_SECONDS
        }
    }

    /// Total length of the phase this state is in.
    pub fn total_for_phase(&self) -> u32 {
        match self.mode {
            TimerMode::Pomodoro => POMODORO_SECONDS,
            TimerMode::Break => Self::break_seconds(self.completed_cycles),
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    /// Check `0 <= remaining_seconds <= total_for_phase`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let total = self.total_for_phase();
        if self.remaining_seconds > total {
            return Err(ValidationError::RemainingOutOfRange {
                remaining: self.remaining_seconds,
                total,
                mode: self.mode,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {:02}:{:02} (cycles: {})",
            self.mode,
            self.phase,
            self.remaining_seconds / 60,
            self.remaining_seconds % 60,
            self.completed_cycles
        )
    }
}
