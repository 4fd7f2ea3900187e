//! Client configuration.

use crate::{domain::ChannelSettings, reconnect::ReconnectPolicy};

/// Everything needed to construct a client.
///
/// # Example
///
/// ```
/// use keyroom_client::ClientConfig;
///
/// let config = ClientConfig::new("ws://127.0.0.1:8080")
///     .with_channel("lobby")
///     .with_token("secret");
/// assert_eq!(config.channel.as_deref(), Some("lobby"));
/// assert_eq!(config.desired_settings.color.as_deref(), Some("#ecfaed"));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the server
    pub url: String,
    /// Access token sent with the handshake
    pub token: Option<String>,
    /// `Origin` header for the WebSocket upgrade request
    pub origin: Option<String>,
    /// Channel joined once the handshake completes
    pub channel: Option<String>,
    /// Settings requested when joining or creating a channel
    pub desired_settings: ChannelSettings,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            origin: None,
            channel: None,
            desired_settings: ChannelSettings::desired_default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_desired_settings(mut self, settings: ChannelSettings) -> Self {
        self.desired_settings = settings;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
