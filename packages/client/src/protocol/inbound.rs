//! Server → client messages.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    domain::{Channel, Note, Participant, de},
    error::ClientError,
};

/// Tags decoded into typed messages. Anything else is passed through as
/// [`InboundMessage::Other`].
const KNOWN_TAGS: &[&str] = &[
    "hi",
    "t",
    "ch",
    "p",
    "m",
    "bye",
    "a",
    "c",
    "ls",
    "n",
    "nq",
    "notification",
];

/// One tagged element of an inbound frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "m")]
pub enum InboundMessage {
    /// Handshake reply
    #[serde(rename = "hi")]
    Hi(HiMessage),
    /// Time sync sample
    #[serde(rename = "t")]
    Time(TimeMessage),
    /// Channel (re)join or channel update
    #[serde(rename = "ch")]
    Channel(ChannelMessage),
    /// Participant joined or changed
    #[serde(rename = "p")]
    Participant(Participant),
    /// Cursor move
    #[serde(rename = "m")]
    Cursor(CursorMessage),
    /// Participant left
    #[serde(rename = "bye")]
    Bye(ByeMessage),
    #[serde(rename = "a")]
    Chat(ChatMessage),
    #[serde(rename = "c")]
    ChatHistory(ChatHistoryMessage),
    #[serde(rename = "ls")]
    ChannelList(ChannelListMessage),
    #[serde(rename = "n")]
    Notes(NoteMessage),
    #[serde(rename = "nq")]
    NoteQuota(NoteQuota),
    #[serde(rename = "notification")]
    Notification(NotificationMessage),
    /// Tag this client does not interpret
    #[serde(skip_deserializing)]
    Other { tag: String, body: Value },
}

impl InboundMessage {
    /// The `m` tag this message was received with.
    pub fn tag(&self) -> &str {
        match self {
            InboundMessage::Hi(_) => "hi",
            InboundMessage::Time(_) => "t",
            InboundMessage::Channel(_) => "ch",
            InboundMessage::Participant(_) => "p",
            InboundMessage::Cursor(_) => "m",
            InboundMessage::Bye(_) => "bye",
            InboundMessage::Chat(_) => "a",
            InboundMessage::ChatHistory(_) => "c",
            InboundMessage::ChannelList(_) => "ls",
            InboundMessage::Notes(_) => "n",
            InboundMessage::NoteQuota(_) => "nq",
            InboundMessage::Notification(_) => "notification",
            InboundMessage::Other { tag, .. } => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HiMessage {
    /// Server time
    pub t: f64,
    /// Own user, without a session id
    #[serde(default)]
    pub u: Participant,
    #[serde(default)]
    pub motd: Option<String>,
    /// Echo of the client time
    #[serde(default)]
    pub e: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeMessage {
    /// Server time
    pub t: f64,
    /// Echo of the client time sent with the ping
    #[serde(default)]
    pub e: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelMessage {
    pub ch: Channel,
    /// Full membership of the channel
    #[serde(default)]
    pub ppl: Vec<Participant>,
    /// Own session id
    #[serde(default)]
    pub p: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CursorMessage {
    pub id: String,
    #[serde(default, deserialize_with = "de::coordinate")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "de::coordinate")]
    pub y: Option<f64>,
}

impl CursorMessage {
    pub fn as_update(&self) -> Participant {
        Participant::cursor(self.id.clone(), self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ByeMessage {
    /// Session id of the participant who left
    pub p: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    /// Message text
    pub a: String,
    /// Sender
    #[serde(default)]
    pub p: Participant,
    /// Server time
    #[serde(default)]
    pub t: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatHistoryMessage {
    #[serde(default)]
    pub c: Vec<ChatMessage>,
    #[serde(default)]
    pub t: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelListMessage {
    /// `true` when `u` is the complete list, `false` for an incremental update
    #[serde(default)]
    pub c: bool,
    #[serde(default)]
    pub u: Vec<Channel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NoteMessage {
    #[serde(default)]
    pub n: Vec<Note>,
    /// Session id of the player
    #[serde(default, deserialize_with = "de::participant_ref")]
    pub p: Option<String>,
    /// Server time of the batch
    #[serde(default)]
    pub t: f64,
}

/// Note rate limits the server enforces on this client.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct NoteQuota {
    /// Note events allowed per 2 s period
    #[serde(default)]
    pub allowance: f64,
    /// Note events allowed across the buffered history
    #[serde(default)]
    pub max: f64,
    /// Number of buffered 2 s periods
    #[serde(rename = "maxHistLen", default, deserialize_with = "de::count")]
    pub max_hist_len: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct NotificationMessage {
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// Decode one inbound frame.
///
/// The outer error means the whole frame is unusable (not JSON, not an
/// array). Each element decodes independently so one bad element does not
/// hide the rest of the frame.
pub fn decode_frame(text: &str) -> Result<Vec<Result<InboundMessage, ClientError>>, ClientError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ClientError::MalformedFrame(e.to_string()))?;

    let Value::Array(elements) = value else {
        return Err(ClientError::MalformedFrame(
            "expected a JSON array of messages".to_string(),
        ));
    };

    Ok(elements.into_iter().map(decode_message).collect())
}

fn decode_message(element: Value) -> Result<InboundMessage, ClientError> {
    let Some(tag) = element.get("m").and_then(Value::as_str).map(str::to_string) else {
        return Err(ClientError::MalformedFrame(
            "message without a string 'm' tag".to_string(),
        ));
    };

    if !KNOWN_TAGS.contains(&tag.as_str()) {
        return Ok(InboundMessage::Other { tag, body: element });
    }

    serde_json::from_value(element)
        .map_err(|e| ClientError::MalformedFrame(format!("'{}' message: {}", tag, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_frame_with_multiple_messages() {
        // テスト項目: 1 フレームに含まれる複数のメッセージがタグごとにデコードされる
        // given (前提条件):
        let text = r#"[
            {"m":"t","t":1700000000500,"e":1700000000000},
            {"m":"bye","p":"p2"},
            {"m":"m","id":"p3","x":"50.00","y":"12.5"}
        ]"#;

        // when (操作):
        let messages = decode_frame(text).unwrap();

        // then (期待する結果):
        assert_eq!(messages.len(), 3);
        let messages: Vec<InboundMessage> = messages.into_iter().map(|m| m.unwrap()).collect();
        assert_eq!(
            messages[0],
            InboundMessage::Time(TimeMessage {
                t: 1700000000500.0,
                e: Some(1700000000000.0),
            })
        );
        assert_eq!(messages[1].tag(), "bye");
        match &messages[2] {
            InboundMessage::Cursor(cursor) => {
                assert_eq!(cursor.id, "p3");
                assert_eq!(cursor.x, Some(50.0));
                assert_eq!(cursor.y, Some(12.5));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_frame_rejects_non_json() {
        // テスト項目: JSON でないフレームはエラーになる
        // given (前提条件):
        let text = "hello";

        // when (操作):
        let result = decode_frame(text);

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_frame_rejects_non_array() {
        // テスト項目: 配列でない JSON はエラーになる
        // given (前提条件):
        let text = r#"{"m":"t","t":1}"#;

        // when (操作):
        let result = decode_frame(text);

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::MalformedFrame(_))));
    }

    #[test]
    fn test_unknown_tag_passes_through() {
        // テスト項目: 未知のタグは Other としてそのまま渡される
        // given (前提条件):
        let text = r#"[{"m":"custom","data":{"k":1}}]"#;

        // when (操作):
        let mut messages = decode_frame(text).unwrap();

        // then (期待する結果):
        let message = messages.remove(0).unwrap();
        assert_eq!(message.tag(), "custom");
        match message {
            InboundMessage::Other { body, .. } => assert_eq!(body["data"]["k"], 1),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_bad_element_does_not_hide_others() {
        // テスト項目: 不正な要素があっても同じフレームの他の要素はデコードされる
        // given (前提条件):
        let text = r#"[{"m":"bye"},{"no_tag":true},{"m":"bye","p":"p1"}]"#;

        // when (操作):
        let messages = decode_frame(text).unwrap();

        // then (期待する結果):
        assert_eq!(messages.len(), 3);
        assert!(messages[0].is_err());
        assert!(messages[1].is_err());
        assert_eq!(
            messages[2].as_ref().unwrap(),
            &InboundMessage::Bye(ByeMessage { p: "p1".to_string() })
        );
    }

    #[test]
    fn test_decode_channel_message() {
        // テスト項目: ch メッセージからチャンネル・参加者一覧・自分の ID を取り出せる
        // given (前提条件):
        let text = r##"[{
            "m": "ch",
            "p": "p1",
            "ch": {"_id": "lobby", "settings": {"color": "#ecfaed", "lobby": true}, "count": 2},
            "ppl": [
                {"id": "p1", "_id": "u1", "name": "Alice", "color": "#f00", "x": 0, "y": 0},
                {"id": "p2", "_id": "u2", "name": "Bob", "color": "#0f0"}
            ]
        }]"##;

        // when (操作):
        let mut messages = decode_frame(text).unwrap();

        // then (期待する結果):
        match messages.remove(0).unwrap() {
            InboundMessage::Channel(ch) => {
                assert_eq!(ch.p.as_deref(), Some("p1"));
                assert_eq!(ch.ch.persistent_id, "lobby");
                assert_eq!(ch.ch.settings.lobby, Some(true));
                assert_eq!(ch.ppl.len(), 2);
                assert_eq!(ch.ppl[1].name.as_deref(), Some("Bob"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_note_message_with_string_player() {
        // テスト項目: n メッセージのプレイヤーは ID 文字列でも読み取れる
        // given (前提条件):
        let text = r#"[{"m":"n","t":1000,"p":"p9","n":[{"n":"c4","v":0.5},{"n":"c4","d":40,"s":1}]}]"#;

        // when (操作):
        let mut messages = decode_frame(text).unwrap();

        // then (期待する結果):
        match messages.remove(0).unwrap() {
            InboundMessage::Notes(notes) => {
                assert_eq!(notes.p.as_deref(), Some("p9"));
                assert_eq!(notes.n.len(), 2);
                assert!(notes.n[1].is_stop);
                assert_eq!(notes.n[1].delay, 40);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_messages_with_float_integers() {
        // テスト項目: 整数フィールド (d / count / maxHistLen) が小数でもメッセージは破棄されない
        // given (前提条件):
        let text = r#"[
            {"m":"n","t":1000,"p":"p9","n":[{"n":"c4","d":12.5,"v":0.5}]},
            {"m":"ch","p":"p1","ch":{"_id":"lobby","count":2.0},"ppl":[{"id":"p1"}]},
            {"m":"nq","allowance":200,"max":600,"maxHistLen":3.0}
        ]"#;

        // when (操作):
        let messages: Vec<InboundMessage> = decode_frame(text)
            .unwrap()
            .into_iter()
            .map(|m| m.unwrap())
            .collect();

        // then (期待する結果):
        match &messages[0] {
            InboundMessage::Notes(notes) => assert_eq!(notes.n[0].delay, 13),
            other => panic!("unexpected message: {:?}", other),
        }
        match &messages[1] {
            InboundMessage::Channel(ch) => {
                assert_eq!(ch.ch.count, 2);
                assert_eq!(ch.ppl.len(), 1);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        match &messages[2] {
            InboundMessage::NoteQuota(quota) => assert_eq!(quota.max_hist_len, 3),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
