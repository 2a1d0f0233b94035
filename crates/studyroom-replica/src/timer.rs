//! Study/break cycle timer.
//!
//! Every peer counts down on its own tick. Peers converge only through the
//! snapshots carried by every timer message: one per discrete action and one
//! every [`SYNC_INTERVAL_SECONDS`] of running.

use studyroom_types::{
    Body, Domain, PeerId, TimerAction, TimerMode, TimerPhase, TimerState, SYNC_INTERVAL_SECONDS,
};
use tracing::{debug, info};

use crate::error::TimerError;
use crate::replica::{Replica, ReplicaCore, SnapshotOrdering};

/// A local user action on the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Pause,
    SkipBreak,
    Reset,
}

/// Something a tick produced that the host may want to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// A phase ran out. The timer has already moved on to the next one.
    PhaseCompleted {
        mode: TimerMode,
        completed_cycles: u32,
    },
}

#[derive(Debug, Clone)]
pub struct TimerReplica {
    core: ReplicaCore,
    state: TimerState,
    /// Ticks since the last snapshot was sent or accepted.
    since_sync: u32,
}

impl TimerReplica {
    pub fn new(self_id: PeerId, ordering: SnapshotOrdering) -> Self {
        Self {
            core: ReplicaCore::new(self_id, Domain::Timer, ordering),
            state: TimerState::default(),
            since_sync: 0,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Apply a local action and queue its snapshot. A rejected action leaves
    /// state untouched and queues nothing.
    pub fn apply_local(&mut self, command: TimerCommand) -> Result<(), TimerError> {
        match command {
            TimerCommand::Start => self.start(),
            TimerCommand::Pause => self.pause(),
            TimerCommand::SkipBreak => self.skip_break(),
            TimerCommand::Reset => {
                self.reset();
                Ok(())
            }
        }
    }

    /// Start a fresh phase from idle, or resume from paused.
    pub fn start(&mut self) -> Result<(), TimerError> {
        match self.state.phase {
            TimerPhase::Idle | TimerPhase::Completed => {
                self.state.remaining_seconds = self.state.total_for_phase();
            }
            TimerPhase::Paused => {}
            TimerPhase::Running => return Err(self.rejected("start")),
        }
        self.state.phase = TimerPhase::Running;
        self.publish(TimerAction::Start(self.state));
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        if self.state.phase != TimerPhase::Running {
            return Err(self.rejected("pause"));
        }
        self.state.phase = TimerPhase::Paused;
        self.publish(TimerAction::Pause(self.state));
        Ok(())
    }

    /// Abandon the current break and return to an idle study phase.
    pub fn skip_break(&mut self) -> Result<(), TimerError> {
        if self.state.mode != TimerMode::Break {
            return Err(self.rejected("skip the break of"));
        }
        self.state = TimerState::fresh(self.state.completed_cycles);
        self.publish(TimerAction::SkipBreak(self.state));
        Ok(())
    }

    /// Back to an idle study phase with the cycle count cleared. Always
    /// accepted.
    pub fn reset(&mut self) {
        self.state = TimerState::default();
        self.publish(TimerAction::Reset);
    }

    /// Advance one second.
    ///
    /// Phase completion and the switch to the next phase happen within the
    /// same call, so `completed` is never left behind for the next tick.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        if !self.state.is_running() {
            return Vec::new();
        }

        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        self.since_sync += 1;

        if self.state.remaining_seconds > 0 {
            if self.since_sync >= SYNC_INTERVAL_SECONDS {
                self.publish(TimerAction::Sync(self.state));
            }
            return Vec::new();
        }

        self.state.phase = TimerPhase::Completed;
        let finished = self.state.mode;
        match finished {
            TimerMode::Pomodoro => {
                let cycles = self.state.completed_cycles.saturating_add(1);
                self.state = TimerState {
                    mode: TimerMode::Break,
                    phase: TimerPhase::Running,
                    remaining_seconds: TimerState::break_seconds(cycles),
                    completed_cycles: cycles,
                };
                info!(cycles, break_seconds = self.state.remaining_seconds, "pomodoro complete");
                self.publish(TimerAction::StartBreak(self.state));
            }
            TimerMode::Break => {
                self.state = TimerState::fresh(self.state.completed_cycles);
                info!(cycles = self.state.completed_cycles, "break complete");
                self.publish(TimerAction::BreakComplete(self.state));
            }
        }

        vec![TimerEvent::PhaseCompleted {
            mode: finished,
            completed_cycles: self.state.completed_cycles,
        }]
    }

    fn publish(&mut self, action: TimerAction) {
        self.since_sync = 0;
        self.core.broadcast(action);
    }

    fn rejected(&self, action: &'static str) -> TimerError {
        TimerError::InvalidTransition {
            action,
            mode: self.state.mode,
            phase: self.state.phase,
        }
    }
}

impl Replica for TimerReplica {
    type Action = TimerAction;

    fn core(&self) -> &ReplicaCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ReplicaCore {
        &mut self.core
    }

    fn action_of(body: Body) -> Option<TimerAction> {
        match body {
            Body::Timer(action) => Some(action),
            Body::Radio(_) => None,
        }
    }

    fn reduce(&mut self, sender: &PeerId, action: TimerAction) {
        let snapshot = action.snapshot();
        debug!(%sender, action = action.verb(), state = %snapshot, "timer snapshot applied");
        self.state = snapshot;
        self.since_sync = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyroom_types::{
        Message, LONG_BREAK_SECONDS, POMODORO_SECONDS, SHORT_BREAK_SECONDS,
    };

    fn peer(id: &str) -> PeerId {
        PeerId::new(id).unwrap()
    }

    fn timer() -> TimerReplica {
        TimerReplica::new(peer("alice"), SnapshotOrdering::Unconditional)
    }

    fn verbs(timer: &mut TimerReplica) -> Vec<&'static str> {
        timer.take_outbox().iter().map(Message::verb).collect()
    }

    fn run(timer: &mut TimerReplica, ticks: u32) -> Vec<TimerEvent> {
        (0..ticks).flat_map(|_| timer.tick()).collect()
    }

    #[test]
    fn start_runs_a_fresh_pomodoro() {
        let mut timer = timer();
        timer.start().unwrap();

        let state = timer.state();
        assert_eq!(state.mode, TimerMode::Pomodoro);
        assert_eq!(state.phase, TimerPhase::Running);
        assert_eq!(state.remaining_seconds, POMODORO_SECONDS);

        let sent = timer.take_outbox();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, Body::Timer(TimerAction::Start(state)));
    }

    #[test]
    fn pause_and_resume_keep_remaining() {
        let mut timer = timer();
        timer.start().unwrap();
        run(&mut timer, 3);
        timer.pause().unwrap();
        assert_eq!(timer.state().phase, TimerPhase::Paused);
        assert_eq!(timer.state().remaining_seconds, POMODORO_SECONDS - 3);

        // Paused timers do not count down.
        assert!(run(&mut timer, 10).is_empty());
        assert_eq!(timer.state().remaining_seconds, POMODORO_SECONDS - 3);

        timer.start().unwrap();
        assert_eq!(timer.state().phase, TimerPhase::Running);
        assert_eq!(timer.state().remaining_seconds, POMODORO_SECONDS - 3);
        assert_eq!(verbs(&mut timer), vec!["start", "pause", "start"]);
    }

    #[test]
    fn invalid_transitions_are_rejected_without_a_message() {
        let mut timer = timer();
        assert_eq!(
            timer.pause(),
            Err(TimerError::InvalidTransition {
                action: "pause",
                mode: TimerMode::Pomodoro,
                phase: TimerPhase::Idle,
            })
        );
        assert!(timer.skip_break().is_err());

        timer.start().unwrap();
        timer.take_outbox();
        assert!(timer.start().is_err());
        assert!(timer.skip_break().is_err());
        assert!(timer.take_outbox().is_empty());
        assert_eq!(timer.state().phase, TimerPhase::Running);
    }

    #[test]
    fn full_pomodoro_rolls_into_a_short_break() {
        let mut timer = timer();
        timer.start().unwrap();

        let events = run(&mut timer, POMODORO_SECONDS);
        assert_eq!(
            events,
            vec![TimerEvent::PhaseCompleted {
                mode: TimerMode::Pomodoro,
                completed_cycles: 1,
            }]
        );
        assert_eq!(
            timer.state(),
            TimerState {
                mode: TimerMode::Break,
                phase: TimerPhase::Running,
                remaining_seconds: SHORT_BREAK_SECONDS,
                completed_cycles: 1,
            }
        );
        assert_eq!(timer.take_outbox().last().map(Message::verb), Some("startBreak"));
    }

    #[test]
    fn break_completion_returns_to_idle_pomodoro() {
        let mut timer = timer();
        timer.start().unwrap();
        run(&mut timer, POMODORO_SECONDS + SHORT_BREAK_SECONDS);

        assert_eq!(timer.state(), TimerState::fresh(1));
        assert_eq!(timer.take_outbox().last().map(Message::verb), Some("breakComplete"));
    }

    #[test]
    fn skip_break_works_from_a_paused_break() {
        let mut timer = timer();
        timer.start().unwrap();
        run(&mut timer, POMODORO_SECONDS + 10);
        timer.pause().unwrap();
        assert_eq!(timer.state().mode, TimerMode::Break);
        assert_eq!(timer.state().phase, TimerPhase::Paused);
        timer.take_outbox();

        timer.skip_break().unwrap();
        assert_eq!(timer.state(), TimerState::fresh(1));
        assert_eq!(verbs(&mut timer), vec!["skipBreak"]);

        // Paused again, but in a study phase: nothing to skip.
        timer.start().unwrap();
        timer.pause().unwrap();
        timer.take_outbox();
        assert!(timer.skip_break().is_err());
        assert!(timer.take_outbox().is_empty());
    }

    #[test]
    fn cycle_count_saturates_instead_of_overflowing() {
        let mut timer = timer();
        let remote = TimerState {
            mode: TimerMode::Pomodoro,
            phase: TimerPhase::Running,
            remaining_seconds: 1,
            completed_cycles: u32::MAX,
        };
        assert!(timer.on_message(Message::new(peer("bob"), 1, TimerAction::Sync(remote))));

        let events = timer.tick();
        assert_eq!(
            events,
            vec![TimerEvent::PhaseCompleted {
                mode: TimerMode::Pomodoro,
                completed_cycles: u32::MAX,
            }]
        );
        assert_eq!(timer.state().mode, TimerMode::Break);
        assert_eq!(timer.state().completed_cycles, u32::MAX);
    }

    #[test]
    fn every_fourth_cycle_earns_a_long_break() {
        let mut timer = timer();
        for cycle in 1..=4 {
            timer.start().unwrap();
            run(&mut timer, POMODORO_SECONDS);
            assert_eq!(timer.state().completed_cycles, cycle);

            let expected = if cycle == 4 {
                LONG_BREAK_SECONDS
            } else {
                SHORT_BREAK_SECONDS
            };
            assert_eq!(timer.state().remaining_seconds, expected);
            timer.skip_break().unwrap();
        }
    }

    #[test]
    fn remaining_stays_within_phase_bounds() {
        let mut timer = timer();
        let script = [
            TimerCommand::Start,
            TimerCommand::Pause,
            TimerCommand::Start,
            TimerCommand::Reset,
            TimerCommand::Start,
        ];
        for command in script.into_iter().cycle().take(40) {
            let _ = timer.apply_local(command);
            for _ in 0..97 {
                timer.tick();
                let state = timer.state();
                assert!(state.remaining_seconds <= state.total_for_phase());
                assert_ne!(state.phase, TimerPhase::Completed);
            }
        }
    }

    #[test]
    fn snapshot_every_five_running_seconds() {
        let mut timer = timer();
        timer.start().unwrap();
        timer.take_outbox();

        run(&mut timer, 4);
        assert!(timer.take_outbox().is_empty());
        run(&mut timer, 1);
        let sent = timer.take_outbox();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body,
            Body::Timer(TimerAction::Sync(timer.state()))
        );

        run(&mut timer, 10);
        assert_eq!(verbs(&mut timer), vec!["sync", "sync"]);
    }

    #[test]
    fn accepted_snapshot_postpones_the_next_sync() {
        let mut timer = timer();
        timer.start().unwrap();
        timer.take_outbox();
        run(&mut timer, 3);

        let mut remote = timer.state();
        remote.remaining_seconds = 1000;
        assert!(timer.on_message(Message::new(peer("bob"), 1, TimerAction::Sync(remote))));
        assert_eq!(timer.state().remaining_seconds, 1000);

        run(&mut timer, 4);
        assert!(timer.take_outbox().is_empty());
        run(&mut timer, 1);
        assert_eq!(verbs(&mut timer), vec!["sync"]);
    }

    #[test]
    fn reset_twice_equals_reset_once() {
        let mut timer = timer();
        timer.start().unwrap();
        run(&mut timer, POMODORO_SECONDS + 10);

        timer.reset();
        let once = timer.state();
        timer.reset();
        assert_eq!(timer.state(), once);
        assert_eq!(once, TimerState::fresh(0));
        assert_eq!(once.phase, TimerPhase::Idle);
    }

    #[test]
    fn own_echo_leaves_state_unchanged() {
        let mut timer = timer();
        timer.start().unwrap();
        run(&mut timer, 30);
        let before = timer.state();

        let echoes = timer.take_outbox();
        assert!(!echoes.is_empty());
        for msg in echoes {
            assert!(!timer.on_message(msg));
        }

        // A forged echo carrying a different state is filtered too.
        let forged = Message::new(peer("alice"), 99, TimerAction::Reset);
        assert!(!timer.on_message(forged));
        assert_eq!(timer.state(), before);
    }

    #[test]
    fn remote_snapshot_overwrites_local_state() {
        let mut timer = timer();
        timer.start().unwrap();

        let remote = TimerState {
            mode: TimerMode::Break,
            phase: TimerPhase::Paused,
            remaining_seconds: 42,
            completed_cycles: 3,
        };
        assert!(timer.on_message(Message::new(peer("bob"), 1, TimerAction::Pause(remote))));
        assert_eq!(timer.state(), remote);

        assert!(timer.on_message(Message::new(peer("bob"), 2, TimerAction::Reset)));
        assert_eq!(timer.state(), TimerState::default());
    }

    #[test]
    fn stale_snapshot_rolls_back_unless_ordered() {
        let newer = TimerState {
            remaining_seconds: 1000,
            phase: TimerPhase::Running,
            ..TimerState::default()
        };
        let older = TimerState {
            remaining_seconds: 1400,
            ..newer
        };

        let mut plain = timer();
        plain.on_message(Message::new(peer("bob"), 8, TimerAction::Sync(newer)));
        plain.on_message(Message::new(peer("bob"), 7, TimerAction::Sync(older)));
        assert_eq!(plain.state().remaining_seconds, 1400);

        let mut ordered = TimerReplica::new(peer("alice"), SnapshotOrdering::PerSenderSequence);
        ordered.on_message(Message::new(peer("bob"), 8, TimerAction::Sync(newer)));
        assert!(!ordered.on_message(Message::new(peer("bob"), 7, TimerAction::Sync(older))));
        assert_eq!(ordered.state().remaining_seconds, 1000);
    }
}
