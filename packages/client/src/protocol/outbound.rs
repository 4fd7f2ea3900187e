//! Client → server commands.
//!
//! Commands are stateless values; [`encode`] wraps one command into the
//! single-element array every outbound frame uses.

use serde::Serialize;

use crate::{
    domain::{ChannelSettings, Note},
    error::ClientError,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "m")]
pub enum OutboundCommand {
    /// Handshake, sent once the transport is open
    #[serde(rename = "hi")]
    Hi {
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    /// Time sync ping carrying the local time
    #[serde(rename = "t")]
    Ping { e: i64 },
    /// Note batch; `t` is the server time of the first note
    #[serde(rename = "n")]
    Notes { t: f64, n: Vec<Note> },
    /// Join (or create) a channel
    #[serde(rename = "ch")]
    JoinChannel {
        #[serde(rename = "_id")]
        channel_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        set: Option<ChannelSettings>,
    },
    /// Change settings of the current channel (crown holder only)
    #[serde(rename = "chset")]
    ChangeSettings { set: ChannelSettings },
    #[serde(rename = "a")]
    Chat { message: String },
    /// Cursor move; a missing coordinate is sent as `null`
    #[serde(rename = "m")]
    MoveCursor { x: Option<f64>, y: Option<f64> },
    #[serde(rename = "userset")]
    UserSet { set: UserSettings },
    /// Ban for `ms` milliseconds; `0` is a kick
    #[serde(rename = "kickban")]
    KickBan {
        #[serde(rename = "_id")]
        user_id: String,
        ms: u64,
    },
    #[serde(rename = "unban")]
    Unban {
        #[serde(rename = "_id")]
        user_id: String,
    },
    /// Give the crown to a participant, or drop it when `id` is absent
    #[serde(rename = "chown")]
    Chown {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl OutboundCommand {
    /// The `m` tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            OutboundCommand::Hi { .. } => "hi",
            OutboundCommand::Ping { .. } => "t",
            OutboundCommand::Notes { .. } => "n",
            OutboundCommand::JoinChannel { .. } => "ch",
            OutboundCommand::ChangeSettings { .. } => "chset",
            OutboundCommand::Chat { .. } => "a",
            OutboundCommand::MoveCursor { .. } => "m",
            OutboundCommand::UserSet { .. } => "userset",
            OutboundCommand::KickBan { .. } => "kickban",
            OutboundCommand::Unban { .. } => "unban",
            OutboundCommand::Chown { .. } => "chown",
        }
    }
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Serialize a command as a one-element JSON array frame.
pub fn encode(command: &OutboundCommand) -> Result<String, ClientError> {
    Ok(serde_json::to_string(&[command])?)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn encode_value(command: &OutboundCommand) -> Value {
        serde_json::from_str(&encode(command).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_wraps_command_in_array() {
        // テスト項目: コマンドは要素 1 つの配列に包まれてエンコードされる
        // given (前提条件):
        let command = OutboundCommand::Chat {
            message: "hello".to_string(),
        };

        // when (操作):
        let value = encode_value(&command);

        // then (期待する結果):
        assert_eq!(value, json!([{"m": "a", "message": "hello"}]));
    }

    #[test]
    fn test_encode_join_channel_with_settings() {
        // テスト項目: チャンネル参加コマンドは _id と set を含む
        // given (前提条件):
        let command = OutboundCommand::JoinChannel {
            channel_id: "lobby".to_string(),
            set: Some(ChannelSettings::desired_default()),
        };

        // when (操作):
        let value = encode_value(&command);

        // then (期待する結果):
        assert_eq!(
            value,
            json!([{"m": "ch", "_id": "lobby", "set": {"color": "#ecfaed"}}])
        );
    }

    #[test]
    fn test_encode_cursor_with_missing_coordinate() {
        // テスト項目: 座標が無い場合は null として送られる
        // given (前提条件):
        let command = OutboundCommand::MoveCursor {
            x: Some(12.5),
            y: None,
        };

        // when (操作):
        let value = encode_value(&command);

        // then (期待する結果):
        assert_eq!(value, json!([{"m": "m", "x": 12.5, "y": null}]));
    }

    #[test]
    fn test_encode_moderation_commands() {
        // テスト項目: モデレーション系コマンドが正しい形でエンコードされる
        // given (前提条件):
        let kick = OutboundCommand::KickBan {
            user_id: "u2".to_string(),
            ms: 0,
        };
        let unban = OutboundCommand::Unban {
            user_id: "u2".to_string(),
        };
        let drop_crown = OutboundCommand::Chown { id: None };

        // when (操作):
        let kick = encode_value(&kick);
        let unban = encode_value(&unban);
        let drop_crown = encode_value(&drop_crown);

        // then (期待する結果):
        assert_eq!(kick, json!([{"m": "kickban", "_id": "u2", "ms": 0}]));
        assert_eq!(unban, json!([{"m": "unban", "_id": "u2"}]));
        assert_eq!(drop_crown, json!([{"m": "chown"}]));
    }

    #[test]
    fn test_encode_hi_without_token() {
        // テスト項目: トークン未設定の hi はタグのみになる
        // given (前提条件):
        let command = OutboundCommand::Hi { token: None };

        // when (操作):
        let value = encode_value(&command);

        // then (期待する結果):
        assert_eq!(value, json!([{"m": "hi"}]));
        assert_eq!(command.tag(), "hi");
    }
}
