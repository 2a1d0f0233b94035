//! Integration tests running full client event loops over an in-memory room.

use std::time::Duration;

use studyroom_daemon::{Client, ClientEvent, ClientStatus};
use studyroom_media::mock::{MockPlayer, MockPlayerHandle, PlayerCall};
use studyroom_protocol::loopback::LoopbackHub;
use studyroom_replica::{RadioCommand, SnapshotOrdering, TimerCommand};
use studyroom_types::{PeerId, RadioState, StationId, TimerMode, TimerPhase, Volume};
use tokio::sync::{mpsc, watch};

const WAIT: Duration = Duration::from_secs(10);

/// A client running on its own task.
struct TestPeer {
    events: mpsc::Sender<ClientEvent>,
    status: watch::Receiver<ClientStatus>,
    player: MockPlayerHandle,
    handle: tokio::task::JoinHandle<()>,
}

impl TestPeer {
    async fn send(&self, event: ClientEvent) {
        self.events.send(event).await.unwrap();
    }

    async fn shutdown(self) {
        let _ = self.events.send(ClientEvent::Shutdown).await;
        let _ = tokio::time::timeout(WAIT, self.handle).await;
    }
}

fn peer(id: &str) -> PeerId {
    PeerId::new(id).unwrap()
}

fn volume(percent: u8) -> Volume {
    Volume::new(percent).unwrap()
}

fn spawn_peer(hub: &LoopbackHub, id: &str, tick: Duration) -> TestPeer {
    let player = MockPlayer::new();
    let player_handle = player.handle();
    let mut client = Client::new(
        Box::new(hub.room(peer(id))),
        Box::new(player),
        SnapshotOrdering::Unconditional,
    )
    .with_tick_period(tick);

    let events = client.event_sender();
    let status = client.status_receiver();
    let handle = tokio::spawn(async move {
        if let Err(e) = client.run().await {
            eprintln!("client error: {e}");
        }
    });

    TestPeer {
        events,
        status,
        player: player_handle,
        handle,
    }
}

/// Wait for a condition on a status receiver with timeout.
async fn wait_for_status(
    rx: &mut watch::Receiver<ClientStatus>,
    pred: impl Fn(&ClientStatus) -> bool,
) -> Result<ClientStatus, &'static str> {
    tokio::time::timeout(WAIT, async {
        loop {
            {
                let status = rx.borrow_and_update().clone();
                if pred(&status) {
                    return Ok(status);
                }
            }
            if rx.changed().await.is_err() {
                return Err("status channel closed");
            }
        }
    })
    .await
    .map_err(|_| "timed out waiting for status")?
}

/// Alice joins first and leads; Bob joins once Alice is settled.
async fn setup_pair(hub: &LoopbackHub, tick: Duration) -> (TestPeer, TestPeer) {
    let mut alice = spawn_peer(hub, "alice", tick);
    wait_for_status(&mut alice.status, |s| s.leader == Some(peer("alice")))
        .await
        .unwrap();

    let mut bob = spawn_peer(hub, "bob", tick);
    wait_for_status(&mut bob.status, |s| s.members.len() == 2)
        .await
        .unwrap();
    wait_for_status(&mut alice.status, |s| s.members.len() == 2)
        .await
        .unwrap();
    (alice, bob)
}

#[tokio::test]
async fn leader_play_reaches_every_peer() {
    let hub = LoopbackHub::new();
    let (alice, mut bob) = setup_pair(&hub, Duration::from_secs(1)).await;

    alice
        .send(ClientEvent::Radio(RadioCommand::ChangeStation(StationId::Classical)))
        .await;
    alice
        .send(ClientEvent::Radio(RadioCommand::SetVolume(volume(40))))
        .await;
    alice.send(ClientEvent::Radio(RadioCommand::Play)).await;

    let expected = RadioState {
        station_id: StationId::Classical,
        is_playing: true,
        volume: volume(40),
    };
    let status = wait_for_status(&mut bob.status, |s| s.radio == expected)
        .await
        .unwrap();
    assert_eq!(status.leader, Some(peer("alice")));

    assert_eq!(bob.player.playing(), Some(StationId::Classical));
    assert!(bob.player.calls().contains(&PlayerCall::Play {
        station: StationId::Classical,
        volume: volume(40),
    }));
    assert_eq!(alice.player.playing(), Some(StationId::Classical));

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test]
async fn late_joiner_syncs_from_leader() {
    let hub = LoopbackHub::new();
    let mut alice = spawn_peer(&hub, "alice", Duration::from_secs(1));
    wait_for_status(&mut alice.status, |s| s.leader == Some(peer("alice")))
        .await
        .unwrap();

    alice
        .send(ClientEvent::Radio(RadioCommand::ChangeStation(StationId::SmoothJazz)))
        .await;
    alice.send(ClientEvent::Radio(RadioCommand::Play)).await;
    let leader_state = wait_for_status(&mut alice.status, |s| s.radio.is_playing)
        .await
        .unwrap()
        .radio;

    let mut bob = spawn_peer(&hub, "bob", Duration::from_secs(1));
    wait_for_status(&mut bob.status, |s| s.radio == leader_state)
        .await
        .unwrap();
    assert_eq!(bob.player.playing(), Some(StationId::SmoothJazz));

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test]
async fn non_leader_radio_commands_are_refused() {
    let hub = LoopbackHub::new();
    let (alice, mut bob) = setup_pair(&hub, Duration::from_secs(1)).await;
    let sent_before = hub.sent().len();

    bob.send(ClientEvent::Radio(RadioCommand::Play)).await;
    let status = wait_for_status(&mut bob.status, |s| s.last_rejection.is_some())
        .await
        .unwrap();
    assert!(status.last_rejection.unwrap().contains("not the radio leader"));
    assert!(!status.radio.is_playing);
    assert!(bob.player.calls().is_empty());

    // A round trip through Alice proves nothing from Bob was in flight.
    alice.send(ClientEvent::Timer(TimerCommand::Start)).await;
    wait_for_status(&mut bob.status, |s| s.timer.phase == TimerPhase::Running)
        .await
        .unwrap();
    let sent: Vec<_> = hub.sent().into_iter().skip(sent_before).collect();
    assert!(sent.iter().all(|(sender, _)| *sender == peer("alice")));
    assert!(!alice.status.borrow().radio.is_playing);

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test]
async fn playback_failure_rolls_back_only_locally() {
    let hub = LoopbackHub::new();
    let (mut alice, mut bob) = setup_pair(&hub, Duration::from_secs(1)).await;
    alice.player.fail_station(StationId::LofiGirl);

    alice.send(ClientEvent::Radio(RadioCommand::Play)).await;

    let status = wait_for_status(&mut alice.status, |s| s.radio_error.is_some())
        .await
        .unwrap();
    assert!(!status.radio.is_playing);

    // Bob applied the optimistic play and nothing corrected it.
    let status = wait_for_status(&mut bob.status, |s| s.radio.is_playing)
        .await
        .unwrap();
    assert_eq!(status.radio_error, None);

    alice.send(ClientEvent::DismissRadioError).await;
    wait_for_status(&mut alice.status, |s| s.radio_error.is_none())
        .await
        .unwrap();

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test]
async fn timers_converge_and_roll_into_breaks() {
    let hub = LoopbackHub::new();
    let (mut alice, mut bob) = setup_pair(&hub, Duration::from_millis(1)).await;

    bob.send(ClientEvent::Timer(TimerCommand::Start)).await;
    wait_for_status(&mut alice.status, |s| s.timer.phase == TimerPhase::Running)
        .await
        .unwrap();

    // 1500 fast ticks later both peers are on a break.
    let status = wait_for_status(&mut alice.status, |s| s.timer.mode == TimerMode::Break)
        .await
        .unwrap();
    assert_eq!(status.timer.completed_cycles, 1);
    wait_for_status(&mut bob.status, |s| s.timer.mode == TimerMode::Break)
        .await
        .unwrap();

    alice.send(ClientEvent::Timer(TimerCommand::Reset)).await;
    let status = wait_for_status(&mut bob.status, |s| {
        s.timer.phase == TimerPhase::Idle && s.timer.completed_cycles == 0
    })
    .await
    .unwrap();
    assert_eq!(status.timer.mode, TimerMode::Pomodoro);

    alice.shutdown().await;
    bob.shutdown().await;
}

#[tokio::test]
async fn leader_leaving_promotes_next_peer() {
    let hub = LoopbackHub::new();
    let (alice, mut bob) = setup_pair(&hub, Duration::from_secs(1)).await;
    let alice_player = alice.player.clone();

    alice.shutdown().await;
    assert!(alice_player.is_shutdown());
    assert_eq!(hub.members(), vec![peer("bob")]);

    let status = wait_for_status(&mut bob.status, |s| s.leader == Some(peer("bob")))
        .await
        .unwrap();
    assert_eq!(status.members, vec![peer("bob")]);

    bob.send(ClientEvent::Radio(RadioCommand::Play)).await;
    wait_for_status(&mut bob.status, |s| s.radio.is_playing)
        .await
        .unwrap();

    bob.shutdown().await;
}

#[tokio::test]
async fn dropped_room_stops_the_client() {
    let hub = LoopbackHub::new();
    let (alice, mut bob) = setup_pair(&hub, Duration::from_secs(1)).await;

    hub.disconnect(&peer("bob")).await;
    wait_for_status(&mut bob.status, |s| !s.connected)
        .await
        .unwrap();
    assert!(tokio::time::timeout(WAIT, bob.handle).await.is_ok());

    alice.shutdown().await;
}
