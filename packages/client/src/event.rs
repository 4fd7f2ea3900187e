//! Events the client publishes to application code.

use crate::{
    dispatcher::{EventDispatcher, NamedEvent},
    domain::Participant,
    protocol::InboundMessage,
};

/// Event names published besides the inbound protocol tags.
pub mod names {
    pub const STATUS: &str = "status";
    pub const WS_MESSAGE: &str = "wsmessage";
    pub const WS_ERROR: &str = "wserror";
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const DIAGNOSTIC: &str = "diagnostic";
    pub const PARTICIPANT_ADDED: &str = "participant added";
    pub const PARTICIPANT_UPDATED: &str = "participant update";
    pub const PARTICIPANT_REMOVED: &str = "participant removed";
    pub const COUNT: &str = "count";
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Human-readable connection status
    Status(String),
    /// Raw inbound text frame, before decoding
    WsMessage(String),
    /// Transport error, reported before the connection is closed
    WsError(String),
    Connect,
    /// Connection closed, with the close reason when known
    Disconnect(Option<String>),
    /// Inbound data that could not be decoded
    Diagnostic(String),
    ParticipantAdded(Participant),
    ParticipantUpdated(Participant),
    ParticipantRemoved(Participant),
    /// Roster size after a participant was added or removed
    Count(usize),
    /// Decoded protocol message, published on its `m` tag
    Message(InboundMessage),
}

impl NamedEvent for ClientEvent {
    fn name(&self) -> &str {
        match self {
            ClientEvent::Status(_) => names::STATUS,
            ClientEvent::WsMessage(_) => names::WS_MESSAGE,
            ClientEvent::WsError(_) => names::WS_ERROR,
            ClientEvent::Connect => names::CONNECT,
            ClientEvent::Disconnect(_) => names::DISCONNECT,
            ClientEvent::Diagnostic(_) => names::DIAGNOSTIC,
            ClientEvent::ParticipantAdded(_) => names::PARTICIPANT_ADDED,
            ClientEvent::ParticipantUpdated(_) => names::PARTICIPANT_UPDATED,
            ClientEvent::ParticipantRemoved(_) => names::PARTICIPANT_REMOVED,
            ClientEvent::Count(_) => names::COUNT,
            ClientEvent::Message(message) => message.tag(),
        }
    }
}

/// Where the engine publishes its events.
///
/// The engine only depends on this trait; [`EventDispatcher`] is the
/// implementation applications normally inject.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ClientEvent);
}

impl EventSink for EventDispatcher<ClientEvent> {
    fn emit(&self, event: &ClientEvent) {
        EventDispatcher::emit(self, event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::protocol::{ByeMessage, InboundMessage};

    #[test]
    fn test_message_events_use_protocol_tag() {
        // テスト項目: プロトコルメッセージのイベント名は m タグになる
        // given (前提条件):
        let event = ClientEvent::Message(InboundMessage::Bye(ByeMessage {
            p: "p1".to_string(),
        }));

        // when (操作):
        let name = event.name();

        // then (期待する結果):
        assert_eq!(name, "bye");
    }

    #[test]
    fn test_dispatcher_as_event_sink() {
        // テスト項目: EventDispatcher を EventSink として注入するとリスナーに届く
        // given (前提条件):
        let dispatcher = EventDispatcher::<ClientEvent>::new();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let seen = counts.clone();
        dispatcher.on(names::COUNT, move |event: &ClientEvent| {
            if let ClientEvent::Count(n) = event {
                seen.lock().unwrap().push(*n);
            }
        });
        let sink: Arc<dyn EventSink> = Arc::new(dispatcher);

        // when (操作):
        sink.emit(&ClientEvent::Count(3));
        sink.emit(&ClientEvent::Connect);

        // then (期待する結果):
        assert_eq!(*counts.lock().unwrap(), vec![3]);
    }
}
