//! Participant roster of the current channel.
//!
//! Mutations return the changes they caused instead of publishing them, so
//! the engine decides how they surface as events.

use std::collections::HashMap;

use crate::domain::{Channel, ChannelSettings, Participant};

/// One observable change to the roster.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterChange {
    Added(Participant),
    Removed(Participant),
    /// Roster size after an add or remove
    Count(usize),
}

/// Participants keyed by session id.
#[derive(Debug, Clone)]
pub struct Roster {
    participants: HashMap<String, Participant>,
    offline: Participant,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        Self {
            participants: HashMap::new(),
            offline: Participant::offline(),
        }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Replace the roster with the authoritative membership `members`.
    ///
    /// Ids missing from `members` are removed first, then every member is
    /// applied as an update.
    pub fn reconcile_full(&mut self, members: &[Participant]) -> Vec<RosterChange> {
        let departed: Vec<String> = self
            .participants
            .keys()
            .filter(|id| !members.iter().any(|m| m.id.as_deref() == Some(id.as_str())))
            .cloned()
            .collect();

        let mut changes = Vec::new();
        for id in departed {
            changes.extend(self.remove(&id));
        }
        for member in members {
            changes.extend(self.apply_update(member));
        }
        changes
    }

    /// Insert an unknown participant or merge into a known one.
    ///
    /// Updates without a session id are ignored.
    pub fn apply_update(&mut self, update: &Participant) -> Vec<RosterChange> {
        let Some(id) = update.id.as_deref() else {
            tracing::debug!("Ignoring participant update without an id");
            return Vec::new();
        };

        if let Some(existing) = self.participants.get_mut(id) {
            existing.merge(update);
            return Vec::new();
        }

        self.participants.insert(id.to_string(), update.clone());
        tracing::debug!("Participant '{}' added", id);
        vec![
            RosterChange::Added(update.clone()),
            RosterChange::Count(self.len()),
        ]
    }

    /// Remove a participant. No-op when the id is unknown.
    pub fn remove(&mut self, id: &str) -> Vec<RosterChange> {
        match self.participants.remove(id) {
            Some(removed) => {
                tracing::debug!("Participant '{}' removed", id);
                vec![
                    RosterChange::Removed(removed),
                    RosterChange::Count(self.len()),
                ]
            }
            None => Vec::new(),
        }
    }

    /// The participant with session id `id`, or the offline placeholder.
    pub fn resolve(&self, id: &str) -> &Participant {
        self.participants.get(id).unwrap_or(&self.offline)
    }
}

/// Whether the session `own_id` holds the crown of `channel`.
pub fn is_owner(channel: Option<&Channel>, own_id: Option<&str>) -> bool {
    match (channel.and_then(Channel::crown_holder), own_id) {
        (Some(holder), Some(own)) => holder == own,
        _ => false,
    }
}

/// Whether exclusive play keeps this session from playing.
pub fn prevents_playing(connected: bool, owner: bool, settings: Option<&ChannelSettings>) -> bool {
    connected && !owner && settings.and_then(|s| s.crownsolo) == Some(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::domain::Crown;

    fn member(id: &str, name: &str) -> Participant {
        Participant {
            id: Some(id.to_string()),
            persistent_id: Some(format!("user-{}", id)),
            name: Some(name.to_string()),
            color: Some("#123456".to_string()),
            x: Some(50.0),
            y: Some(50.0),
        }
    }

    fn ids(roster: &Roster) -> HashSet<String> {
        roster.participants().filter_map(|p| p.id.clone()).collect()
    }

    #[test]
    fn test_apply_update_adds_unknown_participant() {
        // テスト項目: 未知の ID の更新は参加者の追加と人数変更を通知する
        // given (前提条件):
        let mut roster = Roster::new();

        // when (操作):
        let changes = roster.apply_update(&member("p1", "Alice"));

        // then (期待する結果):
        assert_eq!(
            changes,
            vec![
                RosterChange::Added(member("p1", "Alice")),
                RosterChange::Count(1)
            ]
        );
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_apply_update_merges_known_participant() {
        // テスト項目: 既知の参加者への更新は部分マージされ、通知は発生しない
        // given (前提条件):
        let mut roster = Roster::new();
        roster.apply_update(&member("p1", "Alice"));

        // when (操作):
        let changes = roster.apply_update(&Participant::cursor("p1", Some(1.0), Some(2.0)));

        // then (期待する結果):
        assert!(changes.is_empty());
        let alice = roster.resolve("p1");
        assert_eq!(alice.name.as_deref(), Some("Alice"));
        assert_eq!((alice.x, alice.y), (Some(1.0), Some(2.0)));
    }

    #[test]
    fn test_apply_update_without_id_is_ignored() {
        // テスト項目: ID の無い更新は無視される
        // given (前提条件):
        let mut roster = Roster::new();
        let update = Participant {
            name: Some("ghost".to_string()),
            ..Default::default()
        };

        // when (操作):
        let changes = roster.apply_update(&update);

        // then (期待する結果):
        assert!(changes.is_empty());
        assert!(roster.is_empty());
    }

    #[test]
    fn test_reconcile_full_matches_member_list_exactly() {
        // テスト項目: フル同期後のロスターはメンバーリストと完全に一致する
        // given (前提条件):
        let mut roster = Roster::new();
        roster.apply_update(&member("p1", "Alice"));
        roster.apply_update(&member("p2", "Bob"));
        let members = vec![member("p2", "Bob"), member("p3", "Carol")];

        // when (操作):
        let changes = roster.reconcile_full(&members);

        // then (期待する結果):
        assert_eq!(
            ids(&roster),
            HashSet::from(["p2".to_string(), "p3".to_string()])
        );
        assert!(changes.contains(&RosterChange::Removed(member("p1", "Alice"))));
        assert!(changes.contains(&RosterChange::Added(member("p3", "Carol"))));
        assert_eq!(changes.last(), Some(&RosterChange::Count(2)));
    }

    #[test]
    fn test_reconcile_full_is_idempotent() {
        // テスト項目: 同じメンバーリストで 2 回同期しても結果は変わらず、2 回目は通知なし
        // given (前提条件):
        let mut roster = Roster::new();
        let members = vec![member("p1", "Alice"), member("p2", "Bob")];
        roster.reconcile_full(&members);

        // when (操作):
        let changes = roster.reconcile_full(&members);

        // then (期待する結果):
        assert!(changes.is_empty());
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_reconcile_with_empty_list_clears_roster() {
        // テスト項目: 空リストとの同期で全員が削除され、人数は 0 になる
        // given (前提条件):
        let mut roster = Roster::new();
        roster.apply_update(&member("p1", "Alice"));
        roster.apply_update(&member("p2", "Bob"));

        // when (操作):
        let changes = roster.reconcile_full(&[]);

        // then (期待する結果):
        let removed = changes
            .iter()
            .filter(|c| matches!(c, RosterChange::Removed(_)))
            .count();
        assert_eq!(removed, 2);
        assert_eq!(changes.last(), Some(&RosterChange::Count(0)));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        // テスト項目: 存在しない ID の削除は何も起こさない
        // given (前提条件):
        let mut roster = Roster::new();
        roster.apply_update(&member("p1", "Alice"));

        // when (操作):
        let changes = roster.remove("nobody");

        // then (期待する結果):
        assert!(changes.is_empty());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_count_always_matches_distinct_ids() {
        // テスト項目: どのような操作列でも報告される人数は実際の ID 数と一致する
        // given (前提条件):
        let mut roster = Roster::new();
        let mut reported = 0;
        let record = |changes: Vec<RosterChange>, reported: &mut usize| {
            for change in changes {
                if let RosterChange::Count(n) = change {
                    *reported = n;
                }
            }
        };

        // when (操作):
        record(roster.apply_update(&member("p1", "A")), &mut reported);
        record(roster.apply_update(&member("p1", "A2")), &mut reported);
        record(roster.apply_update(&member("p2", "B")), &mut reported);
        record(roster.remove("p1"), &mut reported);
        record(roster.remove("p1"), &mut reported);
        record(
            roster.reconcile_full(&[member("p3", "C"), member("p4", "D"), member("p2", "B")]),
            &mut reported,
        );

        // then (期待する結果):
        assert_eq!(reported, roster.len());
        assert_eq!(roster.len(), ids(&roster).len());
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn test_resolve_unknown_returns_placeholder() {
        // テスト項目: 未知の ID の解決はプレースホルダを返す
        // given (前提条件):
        let roster = Roster::new();

        // when (操作):
        let participant = roster.resolve("missing");

        // then (期待する結果):
        assert_eq!(participant, &Participant::offline());
    }

    fn channel_with_crown(holder: Option<&str>, crownsolo: Option<bool>) -> Channel {
        Channel {
            persistent_id: "room".to_string(),
            settings: ChannelSettings {
                crownsolo,
                ..Default::default()
            },
            crown: Some(Crown {
                participant_id: holder.map(str::to_string),
                user_id: "user-p1".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_owner() {
        // テスト項目: クラウン保持者のセッション ID が自分と一致するときだけオーナーになる
        // given (前提条件):
        let held = channel_with_crown(Some("p1"), None);
        let dropped = channel_with_crown(None, None);

        // when (操作):
        let owner = is_owner(Some(&held), Some("p1"));
        let other = is_owner(Some(&held), Some("p2"));
        let dropped_unassigned = is_owner(Some(&dropped), None);
        let no_channel = is_owner(None, Some("p1"));

        // then (期待する結果):
        assert!(owner);
        assert!(!other);
        assert!(!dropped_unassigned);
        assert!(!no_channel);
    }

    #[test]
    fn test_prevents_playing() {
        // テスト項目: 接続中・非オーナー・crownsolo が true のときだけ演奏が制限される
        // given (前提条件):
        let solo = channel_with_crown(Some("p1"), Some(true));
        let open = channel_with_crown(Some("p1"), Some(false));

        // when (操作):
        let blocked = prevents_playing(true, false, Some(&solo.settings));
        let owner = prevents_playing(true, true, Some(&solo.settings));
        let offline = prevents_playing(false, false, Some(&solo.settings));
        let not_solo = prevents_playing(true, false, Some(&open.settings));
        let no_channel = prevents_playing(true, false, None);

        // then (期待する結果):
        assert!(blocked);
        assert!(!owner);
        assert!(!offline);
        assert!(!not_solo);
        assert!(!no_channel);
    }
}
