use lyricord_core::CoreError;
use thiserror::Error;

/// Errors from Spotify authentication and playback polling.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Authentication failed during OAuth flow or token exchange.
    #[error("Spotify authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// The redirect URI in the config cannot be served locally.
    #[error("Invalid redirect URI {uri}: {reason}")]
    InvalidRedirectUri { uri: String, reason: String },

    #[error("Spotify API error: {0}")]
    Api(#[from] rspotify::ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Token cache could not be parsed or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SpotifyError> for CoreError {
    fn from(err: SpotifyError) -> Self {
        Self::PlaybackSource {
            source_name: "spotify".to_string(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_playback_source_error() {
        let err: CoreError = SpotifyError::AuthFailed {
            reason: "expired".into(),
        }
        .into();

        match err {
            CoreError::PlaybackSource {
                source_name,
                reason,
            } => {
                assert_eq!(source_name, "spotify");
                assert_eq!(reason, "Spotify authentication failed: expired");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
