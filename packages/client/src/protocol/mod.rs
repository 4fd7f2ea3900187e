//! Wire format of the protocol.
//!
//! Every frame in either direction is a JSON array of objects tagged by
//! their `m` field.
//! - `inbound`: server → client messages and frame decoding
//! - `outbound`: client → server commands and frame encoding

pub mod inbound;
pub mod outbound;

pub use inbound::{
    ByeMessage, ChannelListMessage, ChannelMessage, ChatHistoryMessage, ChatMessage,
    CursorMessage, HiMessage, InboundMessage, NoteMessage, NoteQuota, NotificationMessage,
    TimeMessage, decode_frame,
};
pub use outbound::{OutboundCommand, UserSettings, encode};
