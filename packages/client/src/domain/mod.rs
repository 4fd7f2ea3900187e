//! Domain types shared by the roster, the channel state and the note batcher.

mod channel;
pub(crate) mod de;
mod note;
mod participant;

pub use channel::{
    Channel, ChannelSettingKey, ChannelSettingValue, ChannelSettings, Crown, DEFAULT_CHANNEL_COLOR,
    Position,
};
pub use note::Note;
pub use participant::Participant;
