//! Protocol state engine.
//!
//! The engine owns every piece of session state: connection state, own
//! user, channel, roster, clock offset and the note buffer. It performs no
//! I/O itself. The session loop feeds it transport events and timer ticks;
//! outbound frames leave through the `outbox` channel handed over on open.

use std::{sync::Arc, time::Duration};

use keyroom_shared::time::Clock;
use tokio::sync::{mpsc, oneshot};

use crate::{
    batcher::NoteBatcher,
    clock::ClockSynchronizer,
    config::ClientConfig,
    domain::{
        Channel, ChannelSettingKey, ChannelSettingValue, ChannelSettings, DEFAULT_CHANNEL_COLOR,
        Participant,
    },
    error::ClientError,
    event::{ClientEvent, EventSink},
    protocol::{InboundMessage, NoteQuota, OutboundCommand, UserSettings, decode_frame, encode},
    reconnect::should_attempt_reconnect,
    roster::{self, Roster, RosterChange},
};

/// Period of the time sync ping while connected.
pub const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Channel joined when none was requested or configured.
const DEFAULT_CHANNEL_ID: &str = "lobby";

const STATUS_OFFLINE: &str = "Offline mode";
const STATUS_CONNECTING: &str = "Connecting...";
const STATUS_JOINING: &str = "Joining channel...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected
    Idle,
    Connecting,
    Open,
    /// Transport closed; a reconnect may be pending
    Closed,
}

/// Read-only copy of the engine state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    pub state: ConnectionState,
    pub can_connect: bool,
    /// Local time the current connection opened
    pub connected_at: Option<i64>,
    pub user: Option<Participant>,
    pub participant_id: Option<String>,
    pub channel: Option<Channel>,
    pub participants: Vec<Participant>,
    pub server_time_offset: f64,
    pub is_owner: bool,
    pub prevents_playing: bool,
    pub note_quota: Option<NoteQuota>,
}

impl ClientSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Own entry in the roster, once the channel has been joined.
    pub fn own_participant(&self) -> Option<&Participant> {
        let own_id = self.participant_id.as_deref()?;
        self.participants
            .iter()
            .find(|p| p.id.as_deref() == Some(own_id))
    }
}

/// Requests queued from [`crate::KeyroomClient`] handles.
#[derive(Debug)]
pub(crate) enum Intent {
    Start,
    Stop,
    Shutdown,
    NoteOn {
        pitch: String,
        velocity: f64,
    },
    NoteOff {
        pitch: String,
    },
    Say(String),
    SetChannel {
        id: Option<String>,
        settings: Option<ChannelSettings>,
    },
    ChangeSettings(Vec<(ChannelSettingKey, ChannelSettingValue)>),
    MoveCursor {
        x: Option<f64>,
        y: Option<f64>,
    },
    UserSet {
        name: Option<String>,
        color: Option<String>,
        x: Option<f64>,
        y: Option<f64>,
    },
    KickBan {
        user_id: String,
        ms: u64,
    },
    Unban {
        user_id: String,
    },
    Chown {
        id: Option<String>,
    },
    Snapshot(oneshot::Sender<ClientSnapshot>),
    Resolve {
        id: String,
        reply: oneshot::Sender<Participant>,
    },
    ChannelSetting {
        key: ChannelSettingKey,
        reply: oneshot::Sender<Option<ChannelSettingValue>>,
    },
}

pub struct Engine {
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,

    state: ConnectionState,
    /// Cleared by an explicit stop; gates every automatic reconnect
    can_connect: bool,
    shut_down: bool,
    reconnect_attempt: u32,
    outbox: Option<mpsc::UnboundedSender<String>>,
    connected_at: Option<i64>,

    user: Option<Participant>,
    participant_id: Option<String>,
    channel: Option<Channel>,
    desired_channel_id: Option<String>,
    desired_settings: ChannelSettings,
    note_quota: Option<NoteQuota>,

    roster: Roster,
    clock_sync: ClockSynchronizer,
    batcher: NoteBatcher,
}

impl Engine {
    pub fn new(config: ClientConfig, clock: Arc<dyn Clock>, events: Arc<dyn EventSink>) -> Self {
        let engine = Self {
            desired_channel_id: config.channel.clone(),
            desired_settings: config.desired_settings.clone(),
            config,
            clock,
            events,
            state: ConnectionState::Idle,
            can_connect: false,
            shut_down: false,
            reconnect_attempt: 0,
            outbox: None,
            connected_at: None,
            user: None,
            participant_id: None,
            channel: None,
            note_quota: None,
            roster: Roster::new(),
            clock_sync: ClockSynchronizer::new(),
            batcher: NoteBatcher::new(),
        };
        engine.emit(ClientEvent::Status(STATUS_OFFLINE.to_string()));
        engine
    }

    // ========================================
    // Lifecycle
    // ========================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn can_connect(&self) -> bool {
        self.can_connect
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open && self.outbox.is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Allow connecting; the session loop dials on its next turn.
    pub fn start(&mut self) {
        if !self.can_connect {
            self.reconnect_attempt = 0;
        }
        self.can_connect = true;
    }

    /// Forbid connecting. The session loop closes an open transport and no
    /// reconnect is scheduled until [`Engine::start`].
    pub fn stop(&mut self) {
        self.can_connect = false;
    }

    /// Stop for good; the engine task exits.
    pub fn shutdown(&mut self) {
        self.can_connect = false;
        self.shut_down = true;
    }

    /// Whether the session loop should open a new connection now.
    pub fn wants_connection(&self) -> bool {
        self.can_connect
            && !self.shut_down
            && matches!(
                self.state,
                ConnectionState::Idle | ConnectionState::Closed
            )
    }

    pub fn begin_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
        tracing::info!("Connecting to {}", self.config.url);
        self.emit(ClientEvent::Status(STATUS_CONNECTING.to_string()));
    }

    /// Transport is open: handshake, first time sample, fresh note buffer.
    pub fn on_open(&mut self, outbox: mpsc::UnboundedSender<String>) {
        let now = self.clock.now_millis();
        self.state = ConnectionState::Open;
        self.outbox = Some(outbox);
        self.connected_at = Some(now);
        self.reconnect_attempt = 0;
        tracing::info!("Connected to {}", self.config.url);

        self.send(OutboundCommand::Hi {
            token: self.config.token.clone(),
        });
        self.send_ping();
        self.batcher.reset();

        self.emit(ClientEvent::Connect);
        self.emit(ClientEvent::Status(STATUS_JOINING.to_string()));
    }

    /// Report a transport error. The caller closes the connection afterwards.
    pub fn on_transport_error(&mut self, error: &str) {
        tracing::warn!("WebSocket error: {}", error);
        self.emit(ClientEvent::WsError(error.to_string()));
    }

    /// Transport is closed, for whatever reason.
    ///
    /// Returns the delay before the next connection attempt, or `None` when
    /// no reconnect should happen.
    pub fn on_close(&mut self, reason: Option<String>) -> Option<Duration> {
        self.state = ConnectionState::Closed;
        self.outbox = None;
        self.connected_at = None;
        self.user = None;
        self.participant_id = None;
        self.channel = None;
        self.batcher.reset();
        // No smoothing ticks run while offline
        self.clock_sync.settle();

        let changes = self.roster.reconcile_full(&[]);
        self.publish_roster_changes(changes);

        tracing::info!(
            "Disconnected{}",
            reason
                .as_deref()
                .map(|r| format!(": {}", r))
                .unwrap_or_default()
        );
        self.emit(ClientEvent::Disconnect(reason));
        self.emit(ClientEvent::Status(STATUS_OFFLINE.to_string()));

        let allowed = self.can_connect && !self.shut_down;
        if !should_attempt_reconnect(allowed, self.reconnect_attempt, &self.config.reconnect) {
            if allowed {
                tracing::error!(
                    "Giving up after {} reconnection attempts",
                    self.reconnect_attempt
                );
                // Stay offline until the next explicit start
                self.can_connect = false;
            }
            return None;
        }

        let delay = self.config.reconnect.delay_for(self.reconnect_attempt);
        self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
        tracing::info!(
            "Reconnecting in {:?} (attempt {})",
            delay,
            self.reconnect_attempt
        );
        Some(delay)
    }

    /// Handle one inbound text frame.
    pub fn on_frame(&mut self, text: &str) {
        self.emit(ClientEvent::WsMessage(text.to_string()));

        let messages = match decode_frame(text) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Dropping inbound frame: {}", e);
                self.emit(ClientEvent::Diagnostic(e.to_string()));
                return;
            }
        };

        for message in messages {
            match message {
                Ok(message) => self.handle_message(message),
                Err(e) => {
                    tracing::warn!("Skipping inbound message: {}", e);
                    self.emit(ClientEvent::Diagnostic(e.to_string()));
                }
            }
        }
    }

    pub fn on_ping_tick(&mut self) {
        self.send_ping();
    }

    pub fn on_flush_tick(&mut self) {
        if !self.is_connected() {
            return;
        }
        if let Some(batch) = self.batcher.flush(self.clock_sync.offset()) {
            self.send(OutboundCommand::Notes {
                t: batch.server_time,
                n: batch.notes,
            });
        }
    }

    /// Advance the clock smoothing pass by one step.
    pub fn on_smoothing_tick(&mut self) -> bool {
        self.clock_sync.step()
    }

    pub fn is_smoothing(&self) -> bool {
        self.clock_sync.is_smoothing()
    }

    pub fn server_time_offset(&self) -> f64 {
        self.clock_sync.offset()
    }

    // ========================================
    // Inbound messages
    // ========================================

    fn handle_message(&mut self, message: InboundMessage) {
        match &message {
            InboundMessage::Hi(hi) => {
                self.user = Some(hi.u.clone());
                self.clock_sync.sample(hi.t, self.clock.now_millis());
                if self.desired_channel_id.is_some() {
                    self.join_desired_channel();
                }
            }
            InboundMessage::Time(time) => {
                self.clock_sync.sample(time.t, self.clock.now_millis());
            }
            InboundMessage::Channel(ch) => {
                tracing::info!(
                    "Joined channel '{}' ({} participants)",
                    ch.ch.persistent_id,
                    ch.ppl.len()
                );
                self.desired_channel_id = Some(ch.ch.persistent_id.clone());
                self.desired_settings = ch.ch.settings.clone();
                self.channel = Some(ch.ch.clone());
                if let Some(own_id) = &ch.p {
                    self.participant_id = Some(own_id.clone());
                }
                let changes = self.roster.reconcile_full(&ch.ppl);
                self.publish_roster_changes(changes);
            }
            InboundMessage::Participant(update) => {
                let changes = self.roster.apply_update(update);
                self.publish_roster_changes(changes);
                if let Some(id) = update.id.as_deref() {
                    let participant = self.roster.resolve(id).clone();
                    self.emit(ClientEvent::ParticipantUpdated(participant));
                }
            }
            InboundMessage::Cursor(cursor) => {
                let changes = self.roster.apply_update(&cursor.as_update());
                self.publish_roster_changes(changes);
            }
            InboundMessage::Bye(bye) => {
                let changes = self.roster.remove(&bye.p);
                self.publish_roster_changes(changes);
            }
            InboundMessage::NoteQuota(quota) => {
                self.note_quota = Some(*quota);
            }
            _ => {}
        }

        self.emit(ClientEvent::Message(message));
    }

    fn publish_roster_changes(&self, changes: Vec<RosterChange>) {
        for change in changes {
            let event = match change {
                RosterChange::Added(p) => ClientEvent::ParticipantAdded(p),
                RosterChange::Removed(p) => ClientEvent::ParticipantRemoved(p),
                RosterChange::Count(n) => ClientEvent::Count(n),
            };
            self.emit(event);
        }
    }

    // ========================================
    // Outbound operations
    // ========================================

    pub fn note_on(&mut self, pitch: &str, velocity: f64) {
        if !self.is_connected() {
            return;
        }
        let now = self.clock.now_millis();
        self.batcher.note_on(pitch, velocity, now);
    }

    pub fn note_off(&mut self, pitch: &str) {
        if !self.is_connected() {
            return;
        }
        let now = self.clock.now_millis();
        self.batcher.note_off(pitch, now);
    }

    /// Join channel `id`, or rejoin the desired one (`"lobby"` by default).
    pub fn set_channel(&mut self, id: Option<String>, settings: Option<ChannelSettings>) {
        let id = id
            .or_else(|| self.desired_channel_id.clone())
            .unwrap_or_else(|| DEFAULT_CHANNEL_ID.to_string());
        self.desired_channel_id = Some(id);
        if let Some(settings) = settings {
            self.desired_settings = settings;
        }
        self.join_desired_channel();
    }

    /// Merge `changes` into the desired settings and send them.
    ///
    /// The whole call is rejected if any value has the wrong kind for its
    /// key. Offline or outside a channel it is a no-op.
    pub fn set_channel_settings(
        &mut self,
        changes: &[(ChannelSettingKey, ChannelSettingValue)],
    ) -> Result<(), ClientError> {
        let mut desired = self.desired_settings.clone();
        for (key, value) in changes {
            desired.set(*key, value.clone())?;
        }

        if !self.is_connected() || self.channel.is_none() {
            tracing::debug!("Not in a channel, ignoring settings change");
            return Ok(());
        }

        self.desired_settings = desired;
        self.send(OutboundCommand::ChangeSettings {
            set: self.desired_settings.clone(),
        });
        Ok(())
    }

    pub fn say(&mut self, message: impl Into<String>) {
        self.send(OutboundCommand::Chat {
            message: message.into(),
        });
    }

    pub fn move_cursor(&mut self, x: Option<f64>, y: Option<f64>) {
        self.send(OutboundCommand::MoveCursor { x, y });
    }

    /// Change own name and/or color; a coordinate also moves the cursor.
    pub fn userset(
        &mut self,
        name: Option<String>,
        color: Option<String>,
        x: Option<f64>,
        y: Option<f64>,
    ) {
        if name.is_some() || color.is_some() {
            self.send(OutboundCommand::UserSet {
                set: UserSettings { name, color },
            });
        }
        if x.is_some() || y.is_some() {
            self.move_cursor(x, y);
        }
    }

    /// Kick = a ban of zero duration.
    pub fn kick(&mut self, user_id: impl Into<String>) {
        self.ban(user_id, 0);
    }

    pub fn ban(&mut self, user_id: impl Into<String>, ms: u64) {
        self.send(OutboundCommand::KickBan {
            user_id: user_id.into(),
            ms,
        });
    }

    pub fn unban(&mut self, user_id: impl Into<String>) {
        self.send(OutboundCommand::Unban {
            user_id: user_id.into(),
        });
    }

    pub fn transfer_crown(&mut self, participant_id: impl Into<String>) {
        self.send(OutboundCommand::Chown {
            id: Some(participant_id.into()),
        });
    }

    pub fn drop_crown(&mut self) {
        self.send(OutboundCommand::Chown { id: None });
    }

    fn join_desired_channel(&mut self) {
        let Some(channel_id) = self.desired_channel_id.clone() else {
            return;
        };
        self.send(OutboundCommand::JoinChannel {
            channel_id,
            set: Some(self.desired_settings.clone()),
        });
    }

    fn send_ping(&mut self) {
        let e = self.clock.now_millis();
        self.send(OutboundCommand::Ping { e });
    }

    fn send(&self, command: OutboundCommand) {
        let Some(outbox) = self.outbox.as_ref().filter(|_| self.is_connected()) else {
            tracing::debug!("Not connected, dropping '{}' command", command.tag());
            return;
        };

        let json = match encode(&command) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to encode '{}' command: {}", command.tag(), e);
                return;
            }
        };

        tracing::debug!("Sending '{}' command", command.tag());
        if let Err(e) = outbox.send(json) {
            tracing::warn!("Failed to queue '{}' command: {}", command.tag(), e);
        }
    }

    // ========================================
    // Queries
    // ========================================

    pub fn user(&self) -> Option<&Participant> {
        self.user.as_ref()
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant_id.as_deref()
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The participant with session id `id`, or the offline placeholder.
    pub fn resolve(&self, id: &str) -> &Participant {
        self.roster.resolve(id)
    }

    pub fn is_owner(&self) -> bool {
        roster::is_owner(self.channel.as_ref(), self.participant_id.as_deref())
    }

    pub fn prevents_playing(&self) -> bool {
        roster::prevents_playing(
            self.is_connected(),
            self.is_owner(),
            self.channel.as_ref().map(|c| &c.settings),
        )
    }

    /// Current value of a channel setting.
    ///
    /// Offline, only `color` has a value: the default background color.
    pub fn channel_setting(&self, key: ChannelSettingKey) -> Option<ChannelSettingValue> {
        match self.channel.as_ref().filter(|_| self.is_connected()) {
            Some(channel) => channel.settings.get(key),
            None => (key == ChannelSettingKey::Color)
                .then(|| ChannelSettingValue::Text(DEFAULT_CHANNEL_COLOR.to_string())),
        }
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            state: self.state,
            can_connect: self.can_connect,
            connected_at: self.connected_at,
            user: self.user.clone(),
            participant_id: self.participant_id.clone(),
            channel: self.channel.clone(),
            participants: self.roster.participants().cloned().collect(),
            server_time_offset: self.clock_sync.offset(),
            is_owner: self.is_owner(),
            prevents_playing: self.prevents_playing(),
            note_quota: self.note_quota,
        }
    }

    pub(crate) fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Start => self.start(),
            Intent::Stop => self.stop(),
            Intent::Shutdown => self.shutdown(),
            Intent::NoteOn { pitch, velocity } => self.note_on(&pitch, velocity),
            Intent::NoteOff { pitch } => self.note_off(&pitch),
            Intent::Say(message) => self.say(message),
            Intent::SetChannel { id, settings } => self.set_channel(id, settings),
            Intent::ChangeSettings(changes) => {
                if let Err(e) = self.set_channel_settings(&changes) {
                    tracing::warn!("Rejected channel settings change: {}", e);
                }
            }
            Intent::MoveCursor { x, y } => self.move_cursor(x, y),
            Intent::UserSet { name, color, x, y } => self.userset(name, color, x, y),
            Intent::KickBan { user_id, ms } => self.ban(user_id, ms),
            Intent::Unban { user_id } => self.unban(user_id),
            Intent::Chown { id: Some(id) } => self.transfer_crown(id),
            Intent::Chown { id: None } => self.drop_crown(),
            Intent::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Intent::Resolve { id, reply } => {
                let _ = reply.send(self.resolve(&id).clone());
            }
            Intent::ChannelSetting { key, reply } => {
                let _ = reply.send(self.channel_setting(key));
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        self.events.emit(&event);
    }
}
