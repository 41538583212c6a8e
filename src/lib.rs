//! Live poll client: loads poll snapshots over HTTP, keeps one realtime
//! channel per displayed poll, and merges vote-count updates into a view
//! model.

pub mod api;
pub mod error;
pub mod guards;
pub mod polls;
pub mod realtime;
pub mod startup;

pub use error::{ChannelError, ConfigError, LoadError};
pub use polls::{LoadState, PollListPage, PollPage, PollView};
pub use startup::{AppState, ClientConfig};
