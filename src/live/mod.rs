//! Server push channel.

pub mod channel;
pub mod event;

pub use channel::{channel_url, ChannelState, Connector, LiveChannel, MessageStream, WsConnector};
pub use event::LiveEvent;
