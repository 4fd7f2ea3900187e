//! Keyroom protocol client library.
//!
//! Keeps a local view of a shared multiplayer piano channel (participants,
//! channel settings, server clock) and sends locally played notes in timed
//! batches. A [`KeyroomClient`] handle drives an engine task; everything the
//! engine learns is published as [`ClientEvent`]s through an [`EventSink`].

// protocol state
pub mod batcher;
pub mod clock;
pub mod engine;
pub mod reconnect;
pub mod roster;

// wire and domain types
pub mod domain;
pub mod protocol;

// application surface
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod formatter;

// I/O
mod runner;
mod session;

pub use client::KeyroomClient;
pub use config::ClientConfig;
pub use dispatcher::{EventDispatcher, ListenerId, NamedEvent};
pub use domain::{
    Channel, ChannelSettingKey, ChannelSettingValue, ChannelSettings, Crown, Note, Participant,
};
pub use engine::{ClientSnapshot, ConnectionState, Engine};
pub use error::ClientError;
pub use event::{ClientEvent, EventSink, names};
pub use protocol::InboundMessage;
pub use reconnect::ReconnectPolicy;
