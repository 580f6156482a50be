use lyricord_core::CoreError;
use thiserror::Error;

/// Errors talking to the local Discord client over IPC.
#[derive(Debug, Error)]
pub enum PresenceError {
    /// Discord is not running or refused the handshake.
    #[error("Failed to connect to Discord: {reason}")]
    Connect { reason: String },

    #[error("Failed to update Discord presence: {reason}")]
    Update { reason: String },
}

impl From<PresenceError> for CoreError {
    fn from(err: PresenceError) -> Self {
        Self::NotificationFailed {
            sink: "discord".to_string(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PresenceError>;
