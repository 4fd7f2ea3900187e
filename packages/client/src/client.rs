//! Cloneable handle to a running client engine.

use std::sync::Arc;

use keyroom_shared::time::{Clock, SystemClock};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    config::ClientConfig,
    domain::{ChannelSettingKey, ChannelSettingValue, ChannelSettings, Participant},
    engine::{ClientSnapshot, Engine, Intent},
    error::ClientError,
    event::EventSink,
    runner::run_engine,
};

/// Handle to a client engine running on its own task.
///
/// Commands are queued and return immediately; queries wait for the engine
/// to answer. Every method fails with [`ClientError::EngineStopped`] once
/// the engine task has exited.
#[derive(Debug, Clone)]
pub struct KeyroomClient {
    intents: mpsc::UnboundedSender<Intent>,
}

impl KeyroomClient {
    /// Spawn an engine on the current tokio runtime.
    ///
    /// The engine starts offline; call [`KeyroomClient::start`] to connect.
    pub fn spawn(config: ClientConfig, events: Arc<dyn EventSink>) -> (Self, JoinHandle<()>) {
        Self::spawn_with_clock(config, Arc::new(SystemClock), events)
    }

    pub fn spawn_with_clock(
        config: ClientConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> (Self, JoinHandle<()>) {
        let (intents, receiver) = mpsc::unbounded_channel();
        let engine = Engine::new(config, clock, events);
        let handle = tokio::spawn(run_engine(engine, receiver));
        (Self { intents }, handle)
    }

    // ========================================
    // Lifecycle
    // ========================================

    pub fn start(&self) -> Result<(), ClientError> {
        self.enqueue(Intent::Start)
    }

    /// Close the connection and stay offline until the next `start`.
    pub fn stop(&self) -> Result<(), ClientError> {
        self.enqueue(Intent::Stop)
    }

    /// Close the connection and end the engine task.
    pub fn shutdown(&self) -> Result<(), ClientError> {
        self.enqueue(Intent::Shutdown)
    }

    // ========================================
    // Commands
    // ========================================

    /// Press a key. Dropped while offline.
    pub fn start_note(&self, pitch: impl Into<String>, velocity: f64) -> Result<(), ClientError> {
        self.enqueue(Intent::NoteOn {
            pitch: pitch.into(),
            velocity,
        })
    }

    /// Release a key. Dropped while offline.
    pub fn stop_note(&self, pitch: impl Into<String>) -> Result<(), ClientError> {
        self.enqueue(Intent::NoteOff {
            pitch: pitch.into(),
        })
    }

    pub fn say(&self, message: impl Into<String>) -> Result<(), ClientError> {
        self.enqueue(Intent::Say(message.into()))
    }

    /// Join `id`, or rejoin the desired channel when `None`.
    pub fn set_channel(
        &self,
        id: Option<String>,
        settings: Option<ChannelSettings>,
    ) -> Result<(), ClientError> {
        self.enqueue(Intent::SetChannel { id, settings })
    }

    /// Change settings of the current channel.
    ///
    /// Keys outside the known set and values of the wrong kind reject the
    /// whole call before anything is queued.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo(client: keyroom_client::KeyroomClient) -> Result<(), keyroom_client::ClientError> {
    /// use keyroom_client::ChannelSettingValue;
    /// client.set_channel_settings([
    ///     ("color", ChannelSettingValue::from("#202020")),
    ///     ("visible", ChannelSettingValue::from(false)),
    /// ])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_channel_settings<I, K>(&self, changes: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = (K, ChannelSettingValue)>,
        K: AsRef<str>,
    {
        let mut scratch = ChannelSettings::default();
        let mut validated = Vec::new();
        for (key, value) in changes {
            let key: ChannelSettingKey = key.as_ref().parse()?;
            scratch.set(key, value.clone())?;
            validated.push((key, value));
        }
        self.enqueue(Intent::ChangeSettings(validated))
    }

    pub fn move_cursor(&self, x: Option<f64>, y: Option<f64>) -> Result<(), ClientError> {
        self.enqueue(Intent::MoveCursor { x, y })
    }

    /// Change own profile; a coordinate also moves the cursor.
    pub fn userset(
        &self,
        name: Option<String>,
        color: Option<String>,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<(), ClientError> {
        self.enqueue(Intent::UserSet { name, color, x, y })
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), ClientError> {
        self.userset(Some(name.into()), None, None, None)
    }

    pub fn kick(&self, user_id: impl Into<String>) -> Result<(), ClientError> {
        self.ban(user_id, 0)
    }

    pub fn ban(&self, user_id: impl Into<String>, ms: u64) -> Result<(), ClientError> {
        self.enqueue(Intent::KickBan {
            user_id: user_id.into(),
            ms,
        })
    }

    pub fn unban(&self, user_id: impl Into<String>) -> Result<(), ClientError> {
        self.enqueue(Intent::Unban {
            user_id: user_id.into(),
        })
    }

    pub fn transfer_crown(&self, participant_id: impl Into<String>) -> Result<(), ClientError> {
        self.enqueue(Intent::Chown {
            id: Some(participant_id.into()),
        })
    }

    pub fn drop_crown(&self) -> Result<(), ClientError> {
        self.enqueue(Intent::Chown { id: None })
    }

    // ========================================
    // Queries
    // ========================================

    pub async fn snapshot(&self) -> Result<ClientSnapshot, ClientError> {
        self.request(Intent::Snapshot).await
    }

    /// The participant with session id `id`, or the offline placeholder.
    pub async fn participant(&self, id: impl Into<String>) -> Result<Participant, ClientError> {
        let id = id.into();
        self.request(|reply| Intent::Resolve { id, reply }).await
    }

    pub async fn channel_setting(
        &self,
        key: ChannelSettingKey,
    ) -> Result<Option<ChannelSettingValue>, ClientError> {
        self.request(|reply| Intent::ChannelSetting { key, reply })
            .await
    }

    pub async fn is_owner(&self) -> Result<bool, ClientError> {
        Ok(self.snapshot().await?.is_owner)
    }

    pub async fn prevents_playing(&self) -> Result<bool, ClientError> {
        Ok(self.snapshot().await?.prevents_playing)
    }

    pub async fn server_time_offset(&self) -> Result<f64, ClientError> {
        Ok(self.snapshot().await?.server_time_offset)
    }

    fn enqueue(&self, intent: Intent) -> Result<(), ClientError> {
        self.intents
            .send(intent)
            .map_err(|_| ClientError::EngineStopped)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Intent,
    ) -> Result<T, ClientError> {
        let (reply, response) = oneshot::channel();
        self.enqueue(make(reply))?;
        response.await.map_err(|_| ClientError::EngineStopped)
    }
}
