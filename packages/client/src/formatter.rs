//! Message formatting utilities for the terminal client.

use keyroom_shared::time::{format_local_time, timestamp_to_rfc3339};

use crate::domain::{Channel, Participant};

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the participant list of a channel
    ///
    /// # Arguments
    ///
    /// * `channel` - The joined channel
    /// * `participants` - Current roster
    /// * `own_id` - Own session id (to mark as "me")
    ///
    /// # Returns
    ///
    /// A formatted string with the channel name and the participant list
    pub fn format_channel(
        channel: &Channel,
        participants: &[Participant],
        own_id: Option<&str>,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{}\n", RULE));
        output.push_str(&format!(
            "Channel '{}' ({} participants)\n",
            channel.persistent_id,
            participants.len()
        ));

        if participants.is_empty() {
            output.push_str("(No participants)\n");
        } else {
            let mut sorted: Vec<&Participant> = participants.iter().collect();
            sorted.sort_by(|a, b| a.display_name().cmp(b.display_name()));
            for participant in sorted {
                let is_me = own_id.is_some() && participant.id.as_deref() == own_id;
                let is_crowned = channel.crown_holder().is_some()
                    && participant.id.as_deref() == channel.crown_holder();
                output.push_str(&format!(
                    "{}{}{}\n",
                    participant.display_name(),
                    if is_me { " (me)" } else { "" },
                    if is_crowned { " [crown]" } else { "" },
                ));
            }
        }

        output.push_str(&format!("{}\n", RULE));
        output
    }

    /// Format a participant-joined notification
    pub fn format_participant_joined(participant: &Participant) -> String {
        format!("\n+ {} joined\n", participant.display_name())
    }

    /// Format a participant-left notification
    pub fn format_participant_left(participant: &Participant) -> String {
        format!("\n- {} left\n", participant.display_name())
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `from` - The sender
    /// * `content` - The message content
    /// * `sent_at` - Server time of the message (milliseconds)
    ///
    /// # Returns
    ///
    /// A formatted string with the chat message
    pub fn format_chat_message(from: &Participant, content: &str, sent_at: f64) -> String {
        format!(
            "\n\n{}\n[{}] @{}: {}\n{}\n",
            THIN_RULE,
            format_local_time(sent_at as i64),
            from.display_name(),
            content,
            THIN_RULE
        )
    }

    /// Format a connection status line
    pub fn format_status(status: &str) -> String {
        format!("\n* {}\n", status)
    }

    /// Format a disconnect notification
    pub fn format_disconnected(reason: Option<&str>) -> String {
        match reason {
            Some(reason) => format!("\n* Disconnected: {}\n", reason),
            None => "\n* Disconnected\n".to_string(),
        }
    }

    /// Format connection details
    ///
    /// # Arguments
    ///
    /// * `connected_at` - Local time the connection opened (milliseconds)
    /// * `server_time_offset` - Current clock offset to the server (milliseconds)
    pub fn format_connection_info(connected_at: Option<i64>, server_time_offset: f64) -> String {
        let since = connected_at
            .and_then(timestamp_to_rfc3339)
            .unwrap_or_else(|| "-".to_string());
        format!(
            "connected since {} (clock offset {:+.0} ms)\n",
            since, server_time_offset
        )
    }

    /// Format a server notification
    pub fn format_notification(title: Option<&str>, text: Option<&str>) -> String {
        match (title, text) {
            (Some(title), Some(text)) => format!("\n! {}: {}\n", title, text),
            (Some(only), None) | (None, Some(only)) => format!("\n! {}\n", only),
            (None, None) => "\n! (empty notification)\n".to_string(),
        }
    }
}
