pub mod callback;
pub mod error;
pub mod oauth;
pub mod paths;
pub mod poller;

pub use error::SpotifyError;
pub use oauth::SpotifyOAuth;
pub use paths::{spotify_token_cache_path, SPOTIFY_TOKEN_CACHE_FILE_NAME};
pub use poller::SpotifyPoller;
