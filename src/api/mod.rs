pub mod client;
pub mod envelope;
pub mod models;

pub use client::PollsClient;
pub use envelope::*;
pub use models::*;
