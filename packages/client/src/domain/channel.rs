//! Channel state: settings, crown and membership count.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::de;
use crate::error::ClientError;

/// Background color requested when nothing else is configured.
pub const DEFAULT_CHANNEL_COLOR: &str = "#ecfaed";

/// A server-side room as last pushed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name, unique on the server
    #[serde(rename = "_id")]
    pub persistent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub settings: ChannelSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crown: Option<Crown>,
    /// Number of participants in the channel
    #[serde(default, deserialize_with = "de::count")]
    pub count: u32,
}

impl Channel {
    /// Session id of the crown holder, if the crown is held.
    pub fn crown_holder(&self) -> Option<&str> {
        self.crown.as_ref().and_then(|c| c.participant_id.as_deref())
    }
}

/// Ownership token of a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crown {
    /// Session id of the holder; absent while the crown lies dropped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    /// Persistent id of the holder, or of whoever dropped it
    #[serde(default)]
    pub user_id: String,
    /// Server time of the grant or drop
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub time: f64,
    #[serde(default)]
    pub start_pos: Position,
    #[serde(default)]
    pub end_pos: Position,
}

/// Normalized cursor position (0 to 100).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub x: f64,
    #[serde(default, deserialize_with = "de::number_or_zero")]
    pub y: f64,
}

/// Channel settings.
///
/// Known keys are typed; every other key the server sends is kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    #[serde(
        default,
        deserialize_with = "de::strict_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub chat: Option<bool>,
    #[serde(
        default,
        deserialize_with = "de::strict_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::strict_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub color2: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::strict_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub visible: Option<bool>,
    #[serde(
        default,
        deserialize_with = "de::strict_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub lobby: Option<bool>,
    /// Only the crown holder may play
    #[serde(
        default,
        deserialize_with = "de::strict_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub crownsolo: Option<bool>,
    #[serde(
        rename = "no cussing",
        default,
        deserialize_with = "de::strict_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub no_cussing: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChannelSettings {
    /// Settings the client asks for before the server has said anything.
    pub fn desired_default() -> Self {
        Self {
            color: Some(DEFAULT_CHANNEL_COLOR.to_string()),
            ..Default::default()
        }
    }

    pub fn get(&self, key: ChannelSettingKey) -> Option<ChannelSettingValue> {
        use ChannelSettingKey::*;
        match key {
            Chat => self.chat.map(ChannelSettingValue::Bool),
            Color => self.color.clone().map(ChannelSettingValue::Text),
            Color2 => self.color2.clone().map(ChannelSettingValue::Text),
            Visible => self.visible.map(ChannelSettingValue::Bool),
            Lobby => self.lobby.map(ChannelSettingValue::Bool),
            CrownSolo => self.crownsolo.map(ChannelSettingValue::Bool),
            NoCussing => self.no_cussing.map(ChannelSettingValue::Bool),
        }
    }

    /// Set a known key, checking that the value has the key's kind.
    pub fn set(
        &mut self,
        key: ChannelSettingKey,
        value: ChannelSettingValue,
    ) -> Result<(), ClientError> {
        use ChannelSettingKey::*;
        match (key, value) {
            (Color, ChannelSettingValue::Text(s)) => self.color = Some(s),
            (Color2, ChannelSettingValue::Text(s)) => self.color2 = Some(s),
            (Chat, ChannelSettingValue::Bool(b)) => self.chat = Some(b),
            (Visible, ChannelSettingValue::Bool(b)) => self.visible = Some(b),
            (Lobby, ChannelSettingValue::Bool(b)) => self.lobby = Some(b),
            (CrownSolo, ChannelSettingValue::Bool(b)) => self.crownsolo = Some(b),
            (NoCussing, ChannelSettingValue::Bool(b)) => self.no_cussing = Some(b),
            (key, _) => {
                return Err(ClientError::InvalidChannelSetting {
                    key: key.as_str().to_string(),
                    expected: key.expected_kind(),
                });
            }
        }
        Ok(())
    }
}

/// The closed set of setting keys a client may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSettingKey {
    Chat,
    Color,
    Color2,
    Visible,
    Lobby,
    CrownSolo,
    NoCussing,
}

impl ChannelSettingKey {
    pub const ALL: [ChannelSettingKey; 7] = [
        ChannelSettingKey::Chat,
        ChannelSettingKey::Color,
        ChannelSettingKey::Color2,
        ChannelSettingKey::Visible,
        ChannelSettingKey::Lobby,
        ChannelSettingKey::CrownSolo,
        ChannelSettingKey::NoCussing,
    ];

    /// Wire name of the key
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelSettingKey::Chat => "chat",
            ChannelSettingKey::Color => "color",
            ChannelSettingKey::Color2 => "color2",
            ChannelSettingKey::Visible => "visible",
            ChannelSettingKey::Lobby => "lobby",
            ChannelSettingKey::CrownSolo => "crownsolo",
            ChannelSettingKey::NoCussing => "no cussing",
        }
    }

    fn expected_kind(self) -> &'static str {
        match self {
            ChannelSettingKey::Color | ChannelSettingKey::Color2 => "string",
            _ => "boolean",
        }
    }
}

impl FromStr for ChannelSettingKey {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelSettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ClientError::UnknownChannelSetting(s.to_string()))
    }
}

impl fmt::Display for ChannelSettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a single channel setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelSettingValue {
    Bool(bool),
    Text(String),
}

impl From<bool> for ChannelSettingValue {
    fn from(value: bool) -> Self {
        ChannelSettingValue::Bool(value)
    }
}

impl From<&str> for ChannelSettingValue {
    fn from(value: &str) -> Self {
        ChannelSettingValue::Text(value.to_string())
    }
}

impl From<String> for ChannelSettingValue {
    fn from(value: String) -> Self {
        ChannelSettingValue::Text(value)
    }
}
