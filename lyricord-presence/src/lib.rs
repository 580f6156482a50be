pub mod activity;
pub mod client;
pub mod error;
pub mod sink;

pub use activity::PresenceActivity;
pub use client::{DiscordClient, PresenceClient};
pub use error::PresenceError;
pub use sink::PresenceSink;
