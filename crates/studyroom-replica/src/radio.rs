//! Leader-gated radio.
//!
//! Only the elected leader originates control actions. Every peer applies
//! the actions it receives and translates state changes into
//! [`MediaEffect`]s for the host's player.

use studyroom_types::{
    Body, Domain, Membership, PeerId, RadioAction, RadioState, StationId, Volume,
};
use tracing::{debug, info, warn};

use crate::error::RadioError;
use crate::leader::LeaderView;
use crate::replica::{Replica, ReplicaCore, SnapshotOrdering};

/// What the local player should do after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEffect {
    Start { station: StationId, volume: Volume },
    Stop,
    SetVolume(Volume),
}

/// A local user action on the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCommand {
    Play,
    Pause,
    /// Play when stopped, pause when playing.
    Toggle,
    ChangeStation(StationId),
    SetVolume(Volume),
}

#[derive(Debug, Clone)]
pub struct RadioReplica {
    core: ReplicaCore,
    state: RadioState,
    leadership: LeaderView,
    /// Set once the first membership update has been handled.
    sync_requested: bool,
    /// Last local playback failure, until dismissed.
    error: Option<String>,
    effects: Vec<MediaEffect>,
}

impl RadioReplica {
    pub fn new(self_id: PeerId, ordering: SnapshotOrdering) -> Self {
        Self {
            leadership: LeaderView::new(self_id.clone()),
            core: ReplicaCore::new(self_id, Domain::Radio, ordering),
            state: RadioState::default(),
            sync_requested: false,
            error: None,
            effects: Vec::new(),
        }
    }

    pub fn state(&self) -> RadioState {
        self.state
    }

    pub fn leader(&self) -> Option<&PeerId> {
        self.leadership.leader()
    }

    pub fn is_leader(&self) -> bool {
        self.leadership.is_leader()
    }

    pub fn members(&self) -> &Membership {
        self.leadership.members()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Media effects produced since the last drain, in order.
    pub fn take_effects(&mut self) -> Vec<MediaEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Recompute leadership for a new membership.
    ///
    /// On the first update a non-leader asks the room for the current radio
    /// state.
    pub fn on_membership(&mut self, members: impl IntoIterator<Item = PeerId>) {
        self.leadership.update(members);
        self.core.forget_departed(self.leadership.members());

        if !self.sync_requested {
            self.sync_requested = true;
            if !self.leadership.is_leader() {
                debug!(leader = ?self.leader().map(PeerId::as_str), "requesting radio state");
                self.core.broadcast(RadioAction::RequestSync);
            }
        }
    }

    /// Apply a local control action. Rejected without any state change or
    /// message unless the local peer is the leader.
    pub fn apply_local(&mut self, command: RadioCommand) -> Result<(), RadioError> {
        match command {
            RadioCommand::Play => self.play(),
            RadioCommand::Pause => self.pause(),
            RadioCommand::Toggle => self.toggle(),
            RadioCommand::ChangeStation(station) => self.change_station(station),
            RadioCommand::SetVolume(volume) => self.set_volume(volume),
        }
    }

    /// Start playing the current station. Playing is optimistic: the state
    /// flips immediately and is rolled back by [`Self::playback_failed`].
    pub fn play(&mut self) -> Result<(), RadioError> {
        self.ensure_leader()?;
        self.error = None;
        self.transition(RadioState {
            is_playing: true,
            ..self.state
        });
        self.core.broadcast(RadioAction::Play {
            station_id: self.state.station_id,
            volume: self.state.volume,
        });
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), RadioError> {
        self.ensure_leader()?;
        self.transition(RadioState {
            is_playing: false,
            ..self.state
        });
        self.core.broadcast(RadioAction::Pause);
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<(), RadioError> {
        if self.state.is_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Switch station, keeping the current play/pause status.
    pub fn change_station(&mut self, station_id: StationId) -> Result<(), RadioError> {
        self.ensure_leader()?;
        self.transition(RadioState {
            station_id,
            ..self.state
        });
        self.core.broadcast(RadioAction::ChangeStation {
            station_id,
            volume: self.state.volume,
            is_playing: self.state.is_playing,
        });
        Ok(())
    }

    pub fn set_volume(&mut self, volume: Volume) -> Result<(), RadioError> {
        self.ensure_leader()?;
        self.transition(RadioState {
            volume,
            ..self.state
        });
        self.core.broadcast(RadioAction::SetVolume { volume });
        Ok(())
    }

    /// The player could not start the stream. Roll back locally and keep the
    /// error until dismissed. Nothing is broadcast.
    pub fn playback_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(station = %self.state.station_id, %reason, "playback failed");
        self.state.is_playing = false;
        self.error = Some(reason);
    }

    fn ensure_leader(&self) -> Result<(), RadioError> {
        if self.leadership.is_leader() {
            return Ok(());
        }
        debug!(leader = ?self.leader().map(PeerId::as_str), "radio control rejected");
        Err(RadioError::NotLeader {
            peer: self.leadership.self_id().clone(),
            leader: self.leadership.leader().cloned(),
        })
    }

    /// Move to `next`, queueing whatever the player needs to follow.
    fn transition(&mut self, next: RadioState) {
        let prev = self.state;
        self.state = next;

        let effect = if next.is_playing && (!prev.is_playing || prev.station_id != next.station_id)
        {
            Some(MediaEffect::Start {
                station: next.station_id,
                volume: next.volume,
            })
        } else if prev.is_playing && !next.is_playing {
            Some(MediaEffect::Stop)
        } else if next.is_playing && prev.volume != next.volume {
            Some(MediaEffect::SetVolume(next.volume))
        } else {
            None
        };
        self.effects.extend(effect);
    }
}

impl Replica for RadioReplica {
    type Action = RadioAction;

    fn core(&self) -> &ReplicaCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ReplicaCore {
        &mut self.core
    }

    fn action_of(body: Body) -> Option<RadioAction> {
        match body {
            Body::Radio(action) => Some(action),
            Body::Timer(_) => None,
        }
    }

    fn reduce(&mut self, sender: &PeerId, action: RadioAction) {
        if action != RadioAction::RequestSync && self.leadership.leader() != Some(sender) {
            debug!(
                %sender,
                leader = ?self.leader().map(PeerId::as_str),
                action = action.verb(),
                "radio action from a peer this view does not consider leader"
            );
        }

        let next = match action {
            RadioAction::Play { station_id, volume } => RadioState {
                station_id,
                is_playing: true,
                volume,
            },
            RadioAction::Pause => RadioState {
                is_playing: false,
                ..self.state
            },
            RadioAction::ChangeStation {
                station_id,
                volume,
                is_playing,
            } => RadioState {
                station_id,
                is_playing,
                volume,
            },
            RadioAction::SetVolume { volume } => RadioState {
                volume,
                ..self.state
            },
            RadioAction::Sync(state) => state,
            RadioAction::RequestSync => {
                if self.leadership.is_leader() {
                    info!(%sender, state = %self.state, "answering radio sync request");
                    self.core.broadcast(RadioAction::Sync(self.state));
                }
                return;
            }
        };
        if next.is_playing {
            self.error = None;
        }
        self.transition(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyroom_types::Message;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id).unwrap()
    }

    fn volume(percent: u8) -> Volume {
        Volume::new(percent).unwrap()
    }

    fn radio(id: &str, members: &[&str]) -> RadioReplica {
        let mut radio = RadioReplica::new(peer(id), SnapshotOrdering::Unconditional);
        radio.on_membership(members.iter().copied().map(peer));
        radio
    }

    #[test]
    fn nothing_is_allowed_before_membership_is_known() {
        let mut radio = RadioReplica::new(peer("alice"), SnapshotOrdering::Unconditional);
        assert_eq!(
            radio.play(),
            Err(RadioError::NotLeader {
                peer: peer("alice"),
                leader: None,
            })
        );
    }

    #[test]
    fn leader_does_not_request_sync() {
        let mut alice = radio("alice", &["alice", "bob"]);
        assert!(alice.is_leader());
        assert!(alice.take_outbox().is_empty());
    }

    #[test]
    fn joiner_requests_sync_once() {
        let mut bob = radio("bob", &["alice", "bob"]);
        let sent = bob.take_outbox();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, Body::Radio(RadioAction::RequestSync));

        bob.on_membership(vec![peer("alice"), peer("bob"), peer("carol")]);
        assert!(bob.take_outbox().is_empty());
    }

    #[test]
    fn non_leader_controls_change_nothing() {
        let mut bob = radio("bob", &["alice", "bob"]);
        bob.take_outbox();
        let before = bob.state();

        let commands = [
            RadioCommand::Play,
            RadioCommand::Pause,
            RadioCommand::Toggle,
            RadioCommand::ChangeStation(StationId::Pop),
            RadioCommand::SetVolume(volume(10)),
        ];
        for command in commands {
            let err = bob.apply_local(command).unwrap_err();
            assert_eq!(
                err,
                RadioError::NotLeader {
                    peer: peer("bob"),
                    leader: Some(peer("alice")),
                }
            );
        }
        assert_eq!(bob.state(), before);
        assert!(bob.take_outbox().is_empty());
        assert!(bob.take_effects().is_empty());
    }

    #[test]
    fn leader_play_is_broadcast_and_started() {
        let mut alice = radio("alice", &["alice", "bob"]);
        alice.change_station(StationId::Classical).unwrap();
        alice.set_volume(volume(40)).unwrap();
        alice.play().unwrap();

        assert_eq!(
            alice.state(),
            RadioState {
                station_id: StationId::Classical,
                is_playing: true,
                volume: volume(40),
            }
        );
        // Station and volume changes while stopped need no player action.
        assert_eq!(
            alice.take_effects(),
            vec![MediaEffect::Start {
                station: StationId::Classical,
                volume: volume(40),
            }]
        );
        let verbs: Vec<_> = alice.take_outbox().iter().map(Message::verb).collect();
        assert_eq!(verbs, vec!["changeStation", "setVolume", "play"]);
    }

    #[test]
    fn toggle_flips_playback() {
        let mut alice = radio("alice", &["alice"]);
        alice.toggle().unwrap();
        assert!(alice.state().is_playing);
        alice.toggle().unwrap();
        assert!(!alice.state().is_playing);
        assert_eq!(alice.take_effects().last(), Some(&MediaEffect::Stop));
    }

    #[test]
    fn playback_failure_rolls_back_locally() {
        let mut alice = radio("alice", &["alice", "bob"]);
        alice.play().unwrap();
        alice.take_outbox();

        alice.playback_failed("stream unreachable");
        assert!(!alice.state().is_playing);
        assert_eq!(alice.error(), Some("stream unreachable"));
        assert!(alice.take_outbox().is_empty());

        alice.dismiss_error();
        assert_eq!(alice.error(), None);

        // Retrying plays and broadcasts again.
        alice.playback_failed("still down");
        alice.play().unwrap();
        assert_eq!(alice.error(), None);
        assert_eq!(alice.take_outbox().len(), 1);
    }

    #[test]
    fn only_the_leader_answers_sync_requests() {
        let mut alice = radio("alice", &["alice", "bob", "carol"]);
        let mut carol = radio("carol", &["alice", "bob", "carol"]);
        alice.take_outbox();
        carol.take_outbox();

        let request = Message::new(peer("bob"), 1, RadioAction::RequestSync);
        assert!(alice.on_message(request.clone()));
        assert!(carol.on_message(request));

        let reply = alice.take_outbox();
        assert_eq!(reply.len(), 1);
        assert_eq!(reply[0].body, Body::Radio(RadioAction::Sync(alice.state())));
        assert!(carol.take_outbox().is_empty());
    }

    #[test]
    fn leader_ignores_its_own_sync_request_echo() {
        let mut alice = radio("alice", &["alice"]);
        let echo = Message::new(peer("alice"), 1, RadioAction::RequestSync);
        assert!(!alice.on_message(echo));
        assert!(alice.take_outbox().is_empty());
    }

    #[test]
    fn remote_actions_drive_the_player() {
        let mut bob = radio("bob", &["alice", "bob"]);
        let alice = peer("alice");

        bob.on_message(Message::new(
            alice.clone(),
            1,
            RadioAction::Play {
                station_id: StationId::HipHop,
                volume: volume(70),
            },
        ));
        bob.on_message(Message::new(
            alice.clone(),
            2,
            RadioAction::SetVolume { volume: volume(20) },
        ));
        bob.on_message(Message::new(
            alice.clone(),
            3,
            RadioAction::ChangeStation {
                station_id: StationId::SmoothJazz,
                volume: volume(20),
                is_playing: true,
            },
        ));
        bob.on_message(Message::new(alice, 4, RadioAction::Pause));

        assert_eq!(
            bob.take_effects(),
            vec![
                MediaEffect::Start {
                    station: StationId::HipHop,
                    volume: volume(70),
                },
                MediaEffect::SetVolume(volume(20)),
                MediaEffect::Start {
                    station: StationId::SmoothJazz,
                    volume: volume(20),
                },
                MediaEffect::Stop,
            ]
        );
        assert_eq!(bob.state().station_id, StationId::SmoothJazz);
        assert!(!bob.state().is_playing);
    }

    #[test]
    fn leader_departure_hands_over_control() {
        let mut bob = radio("bob", &["alice", "bob", "carol"]);
        assert!(bob.set_volume(volume(5)).is_err());

        bob.on_membership(vec![peer("bob"), peer("carol")]);
        assert!(bob.is_leader());
        bob.set_volume(volume(5)).unwrap();
        assert_eq!(bob.state().volume, volume(5));
    }
}
