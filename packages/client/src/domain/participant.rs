//! Participant presence inside the current channel.

use serde::{Deserialize, Serialize};

use super::de;

/// Color shown for a participant that is not (or no longer) in the roster.
const OFFLINE_COLOR: &str = "#777";

/// One connected user's presence in the channel.
///
/// The same shape doubles as a partial update: `p`, `m` and `ch.ppl`
/// entries carry only the fields that changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Session-scoped participant id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Stable user id
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub persistent_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::strict_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::strict_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<String>,
    /// Cursor X, 0 to 100
    #[serde(
        default,
        deserialize_with = "de::coordinate",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<f64>,
    /// Cursor Y, 0 to 100
    #[serde(
        default,
        deserialize_with = "de::coordinate",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<f64>,
}

impl Participant {
    /// Placeholder returned for ids missing from the roster.
    pub fn offline() -> Self {
        Self {
            id: None,
            persistent_id: Some(String::new()),
            name: Some(String::new()),
            color: Some(OFFLINE_COLOR.to_string()),
            x: None,
            y: None,
        }
    }

    /// Cursor-only update as carried by an `m` message.
    pub fn cursor(id: impl Into<String>, x: Option<f64>, y: Option<f64>) -> Self {
        Self {
            id: Some(id.into()),
            x,
            y,
            ..Default::default()
        }
    }

    /// Merge the fields present in `update` into this record.
    ///
    /// Coordinates overwrite when present and finite, so `0.0` is a valid
    /// position. Name and color overwrite only with a non-empty value. The
    /// session id never changes.
    pub fn merge(&mut self, update: &Participant) {
        if let Some(x) = update.x.filter(|v| v.is_finite()) {
            self.x = Some(x);
        }
        if let Some(y) = update.y.filter(|v| v.is_finite()) {
            self.y = Some(y);
        }
        if let Some(name) = update.name.as_ref().filter(|n| !n.is_empty()) {
            self.name = Some(name.clone());
        }
        if let Some(color) = update.color.as_ref().filter(|c| !c.is_empty()) {
            self.color = Some(color.clone());
        }
        if let Some(persistent_id) = update.persistent_id.as_ref().filter(|p| !p.is_empty()) {
            self.persistent_id = Some(persistent_id.clone());
        }
    }

    /// Display name, or the persistent id when no name is known.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.persistent_id.as_deref())
            .unwrap_or("anonymous")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Participant {
        Participant {
            id: Some("p1".to_string()),
            persistent_id: Some("u1".to_string()),
            name: Some("Alice".to_string()),
            color: Some("#ff0000".to_string()),
            x: Some(10.0),
            y: Some(20.0),
        }
    }

    #[test]
    fn test_merge_cursor_update_keeps_name_and_color() {
        // テスト項目: カーソル移動の更新では名前と色が消えない
        // given (前提条件):
        let mut participant = alice();
        let update = Participant::cursor("p1", Some(55.5), Some(66.6));

        // when (操作):
        participant.merge(&update);

        // then (期待する結果):
        assert_eq!(participant.x, Some(55.5));
        assert_eq!(participant.y, Some(66.6));
        assert_eq!(participant.name.as_deref(), Some("Alice"));
        assert_eq!(participant.color.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn test_merge_zero_coordinate_overwrites() {
        // テスト項目: 座標 0 は有効な値として上書きされる
        // given (前提条件):
        let mut participant = alice();
        let update = Participant::cursor("p1", Some(0.0), None);

        // when (操作):
        participant.merge(&update);

        // then (期待する結果):
        assert_eq!(participant.x, Some(0.0));
        assert_eq!(participant.y, Some(20.0));
    }

    #[test]
    fn test_merge_ignores_nan_and_empty_strings() {
        // テスト項目: NaN 座標や空文字列の名前は既存の値を上書きしない
        // given (前提条件):
        let mut participant = alice();
        let update = Participant {
            id: Some("p1".to_string()),
            name: Some(String::new()),
            x: Some(f64::NAN),
            ..Default::default()
        };

        // when (操作):
        participant.merge(&update);

        // then (期待する結果):
        assert_eq!(participant.x, Some(10.0));
        assert_eq!(participant.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_deserialize_string_coordinates() {
        // テスト項目: 文字列で送られてきた座標も数値として読み取れる
        // given (前提条件):
        let json = r#"{"id":"p2","x":"12.5","y":7}"#;

        // when (操作):
        let participant: Participant = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(participant.id.as_deref(), Some("p2"));
        assert_eq!(participant.x, Some(12.5));
        assert_eq!(participant.y, Some(7.0));
        assert_eq!(participant.name, None);
    }

    #[test]
    fn test_offline_placeholder() {
        // テスト項目: オフライン参加者のプレースホルダは灰色で名前が空
        // given (前提条件):

        // when (操作):
        let placeholder = Participant::offline();

        // then (期待する結果):
        assert_eq!(placeholder.color.as_deref(), Some("#777"));
        assert_eq!(placeholder.name.as_deref(), Some(""));
        assert_eq!(placeholder.persistent_id.as_deref(), Some(""));
        assert_eq!(placeholder.id, None);
    }
}
