//! Per-peer event loop.

use std::time::Duration;

use studyroom_media::{MediaError, MediaPlayer};
use studyroom_protocol::wire::{decode_inbound, encode_message};
use studyroom_protocol::{RoomEvent, RoomTransport};
use studyroom_replica::{
    MediaEffect, RadioCommand, RadioReplica, Replica, SnapshotOrdering, TimerCommand, TimerEvent,
    TimerReplica,
};
use studyroom_types::{Domain, PeerId, RadioState, TimerState};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// Interval between timer ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Events fed into the client's main loop from outside.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Timer(TimerCommand),
    Radio(RadioCommand),
    /// Clear the radio's playback error.
    DismissRadioError,
    /// Shutdown signal.
    Shutdown,
}

/// Snapshot of the client published after every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    pub self_id: PeerId,
    pub connected: bool,
    pub members: Vec<PeerId>,
    pub leader: Option<PeerId>,
    pub timer: TimerState,
    pub radio: RadioState,
    /// Playback failure shown until dismissed.
    pub radio_error: Option<String>,
    /// Why the last local command was refused, if it was.
    pub last_rejection: Option<String>,
}

/// One peer in a session.
pub struct Client {
    self_id: PeerId,
    transport: Box<dyn RoomTransport>,
    player: Box<dyn MediaPlayer>,
    timer: TimerReplica,
    radio: RadioReplica,
    tick_period: Duration,
    connected: bool,
    last_rejection: Option<String>,
    event_tx: mpsc::Sender<ClientEvent>,
    event_rx: mpsc::Receiver<ClientEvent>,
    status_tx: watch::Sender<ClientStatus>,
}

impl Client {
    pub fn new(
        transport: Box<dyn RoomTransport>,
        player: Box<dyn MediaPlayer>,
        ordering: SnapshotOrdering,
    ) -> Self {
        let self_id = transport.local_id().clone();
        let timer = TimerReplica::new(self_id.clone(), ordering);
        let radio = RadioReplica::new(self_id.clone(), ordering);
        let (event_tx, event_rx) = mpsc::channel(256);
        let (status_tx, _) = watch::channel(ClientStatus {
            self_id: self_id.clone(),
            connected: false,
            members: Vec::new(),
            leader: None,
            timer: timer.state(),
            radio: radio.state(),
            radio_error: None,
            last_rejection: None,
        });

        Self {
            self_id,
            transport,
            player,
            timer,
            radio,
            tick_period: TICK_PERIOD,
            connected: false,
            last_rejection: None,
            event_tx,
            event_rx,
            status_tx,
        }
    }

    /// Override the tick period. Tests use this to run timers fast.
    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Get a clone of the event sender for feeding commands into the client.
    pub fn event_sender(&self) -> mpsc::Sender<ClientEvent> {
        self.event_tx.clone()
    }

    /// Subscribe to status updates.
    pub fn status_receiver(&self) -> watch::Receiver<ClientStatus> {
        self.status_tx.subscribe()
    }

    /// Run the client until shutdown or until the room goes away.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let (room_tx, mut room_rx) = mpsc::channel(1024);
        self.transport.start(room_tx).await?;
        self.connected = true;
        info!(peer = %self.self_id, "client running");
        self.publish_status();

        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.handle_tick();
                }
                event = room_rx.recv() => {
                    match event {
                        Some(RoomEvent::Data { sender, payload }) => {
                            self.handle_data(&sender, &payload);
                        }
                        Some(RoomEvent::MembersChanged(members)) => {
                            self.handle_members(members);
                        }
                        Some(RoomEvent::Disconnected { reason }) => {
                            warn!(%reason, "disconnected from room");
                            self.connected = false;
                            break;
                        }
                        None => {
                            self.connected = false;
                            break;
                        }
                    }
                }
                event = self.event_rx.recv() => {
                    match event {
                        Some(ClientEvent::Timer(command)) => {
                            self.handle_timer_command(command);
                        }
                        Some(ClientEvent::Radio(command)) => {
                            self.handle_radio_command(command);
                        }
                        Some(ClientEvent::DismissRadioError) => {
                            self.radio.dismiss_error();
                        }
                        Some(ClientEvent::Shutdown) | None => {
                            info!("shutting down");
                            break;
                        }
                    }
                }
            }

            self.flush().await;
            self.publish_status();
        }

        self.shutdown().await
    }

    fn handle_tick(&mut self) {
        for event in self.timer.tick() {
            match event {
                TimerEvent::PhaseCompleted {
                    mode,
                    completed_cycles,
                } => {
                    info!(%mode, completed_cycles, next = %self.timer.state(), "timer phase completed");
                }
            }
        }
    }

    fn handle_data(&mut self, from: &PeerId, payload: &[u8]) {
        let Some(msg) = decode_inbound(payload) else {
            return;
        };
        if &msg.sender_id != from {
            debug!(%from, sender = %msg.sender_id, "record sender differs from transport sender");
        }
        match msg.domain() {
            Domain::Timer => {
                self.timer.on_message(msg);
            }
            Domain::Radio => {
                self.radio.on_message(msg);
            }
        }
    }

    fn handle_members(&mut self, members: Vec<PeerId>) {
        debug!(members = members.len(), "membership changed");
        self.timer
            .core_mut()
            .forget_departed(&members.iter().cloned().collect());
        self.radio.on_membership(members);
    }

    fn handle_timer_command(&mut self, command: TimerCommand) {
        match self.timer.apply_local(command) {
            Ok(()) => self.last_rejection = None,
            Err(e) => {
                info!(error = %e, "timer command refused");
                self.last_rejection = Some(e.to_string());
            }
        }
    }

    fn handle_radio_command(&mut self, command: RadioCommand) {
        match self.radio.apply_local(command) {
            Ok(()) => self.last_rejection = None,
            Err(e) => {
                info!(error = %e, "radio command refused");
                self.last_rejection = Some(e.to_string());
            }
        }
    }

    /// Broadcast queued messages and run queued media effects.
    async fn flush(&mut self) {
        let mut outbox = self.timer.take_outbox();
        outbox.extend(self.radio.take_outbox());
        for msg in outbox {
            let payload = match encode_message(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, action = msg.verb(), "failed to encode message");
                    continue;
                }
            };
            if let Err(e) = self.transport.send(payload).await {
                warn!(error = %e, domain = %msg.domain(), action = msg.verb(), "failed to send");
            }
        }

        for effect in self.radio.take_effects() {
            match self.apply_effect(effect).await {
                Ok(()) => {}
                Err(e @ MediaError::StreamUnreachable { .. }) => {
                    self.radio.playback_failed(e.to_string());
                }
                Err(e) => warn!(error = %e, ?effect, "media player error"),
            }
        }
    }

    async fn apply_effect(&mut self, effect: MediaEffect) -> Result<(), MediaError> {
        match effect {
            MediaEffect::Start { station, volume } => {
                self.player.play(station.station(), volume).await
            }
            MediaEffect::Stop => self.player.stop().await,
            MediaEffect::SetVolume(volume) => self.player.set_volume(volume).await,
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(ClientStatus {
            self_id: self.self_id.clone(),
            connected: self.connected,
            members: self.radio.members().iter().cloned().collect(),
            leader: self.radio.leader().cloned(),
            timer: self.timer.state(),
            radio: self.radio.state(),
            radio_error: self.radio.error().map(str::to_string),
            last_rejection: self.last_rejection.clone(),
        });
    }

    async fn shutdown(&mut self) -> Result<(), ClientError> {
        info!("client shutting down");

        // Both halves run even if the first fails.
        let left = self.transport.leave().await;
        if let Err(e) = &left {
            warn!(error = %e, "failed to leave room cleanly");
        }
        let stopped = self.player.shutdown().await;
        self.connected = false;
        self.publish_status();

        left?;
        stopped?;
        info!("client shut down complete");
        Ok(())
    }
}
