pub mod channel;
pub mod listeners;
pub mod models;
pub mod transport;

pub use channel::{ChannelEvent, ChannelManager};
pub use listeners::{Listener, ListenerRegistry, Subscription};
pub use models::*;
pub use transport::{Connector, Transport, TransportEvent, WsConnector, WsTransport};
