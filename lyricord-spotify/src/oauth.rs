use crate::callback::{CallbackServer, RedirectTarget};
use crate::error::{Result, SpotifyError};
use chrono::{DateTime, TimeDelta, Utc};
use rspotify::{prelude::*, scopes, AuthCodeSpotify, Credentials, OAuth, Token};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for interactive OAuth callback (10 minutes)
const OAUTH_CALLBACK_TIMEOUT: Duration = Duration::from_secs(600);

/// Refresh token proactively if it expires within this many seconds
const PROACTIVE_REFRESH_THRESHOLD_SECS: i64 = 60;

/// Token as stored in the cache file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    /// Unix timestamp in seconds
    expires_at: Option<i64>,
    scopes: Vec<String>,
}

impl From<&Token> for CachedToken {
    fn from(token: &Token) -> Self {
        let mut scopes: Vec<String> = token.scopes.iter().cloned().collect();
        scopes.sort();
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at.map(|at| at.timestamp()),
            scopes,
        }
    }
}

impl From<CachedToken> for Token {
    fn from(cached: CachedToken) -> Self {
        Self {
            access_token: cached.access_token,
            refresh_token: cached.refresh_token,
            expires_at: cached
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            expires_in: TimeDelta::zero(),
            scopes: cached.scopes.into_iter().collect(),
        }
    }
}

/// Whether a token expiring at `expires_at` should be refreshed at `now`.
/// Tokens without an expiry are assumed to be valid.
fn expires_soon(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| (at - now).num_seconds() <= PROACTIVE_REFRESH_THRESHOLD_SECS)
}

/// Spotify OAuth manager.
///
/// Holds the authenticated client and keeps its token cached on disk so the
/// browser login only happens once.
pub struct SpotifyOAuth {
    client: AuthCodeSpotify,
    token_path: PathBuf,
}

impl SpotifyOAuth {
    /// Create an OAuth manager with the token cached at the default location
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self::with_token_path(
            client_id,
            client_secret,
            redirect_uri,
            crate::paths::spotify_token_cache_path(),
        )
    }

    #[must_use]
    pub fn with_token_path(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        token_path: PathBuf,
    ) -> Self {
        let creds = Credentials::new(&client_id.into(), &client_secret.into());
        let oauth = OAuth {
            redirect_uri: redirect_uri.into(),
            scopes: scopes!(
                "user-read-email",
                "user-read-currently-playing",
                "user-read-playback-state"
            ),
            ..Default::default()
        };

        Self {
            client: AuthCodeSpotify::new(creds, oauth),
            token_path,
        }
    }

    /// Get the underlying Spotify client
    #[must_use]
    pub const fn client(&self) -> &AuthCodeSpotify {
        &self.client
    }

    async fn lock_token(&self) -> Result<futures::lock::MutexGuard<'_, Option<Token>>> {
        self.client
            .token
            .lock()
            .await
            .map_err(|_| SpotifyError::AuthFailed {
                reason: "Failed to acquire token lock".to_string(),
            })
    }

    fn read_cache(&self) -> Result<Option<Token>> {
        if !self.token_path.exists() {
            info!("No cached token file found at {:?}", self.token_path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.token_path)?;
        let cached: CachedToken = serde_json::from_str(&content)?;
        Ok(Some(cached.into()))
    }

    async fn write_cache(&self) -> Result<()> {
        let cached = match self.lock_token().await?.as_ref() {
            Some(token) => CachedToken::from(token),
            None => return Ok(()),
        };

        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.token_path, serde_json::to_string_pretty(&cached)?)?;
        debug!("Saved Spotify token to {:?}", self.token_path);
        Ok(())
    }

    /// Load the cached token into the client, refreshing it if expired.
    ///
    /// Returns `false` when there is no usable cached token.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be read or parsed, or the
    /// refresh fails.
    pub async fn load_cached_token(&self) -> Result<bool> {
        let Some(token) = self.read_cache()? else {
            return Ok(false);
        };

        if token.is_expired() {
            if token.refresh_token.is_none() {
                info!("Cached token is expired and has no refresh token, re-authentication required");
                return Ok(false);
            }
            info!("Cached token is expired but has refresh token, attempting refresh...");
            *self.lock_token().await? = Some(token);
            self.refresh_token().await?;
            return Ok(true);
        }

        *self.lock_token().await? = Some(token);
        info!("Loaded valid cached Spotify token");
        Ok(true)
    }

    /// Refresh the access token and update the cache
    ///
    /// # Errors
    ///
    /// Returns an error if the token refresh fails or the token cannot be saved.
    pub async fn refresh_token(&self) -> Result<()> {
        info!("Refreshing Spotify access token");

        self.client
            .refresh_token()
            .await
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("Token refresh failed: {e}"),
            })?;

        self.write_cache().await
    }

    /// Refresh the token if it expires within 60 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the token refresh fails.
    pub async fn ensure_token_fresh(&self) -> Result<()> {
        let expires_at = {
            let guard = self.lock_token().await?;
            match guard.as_ref() {
                Some(token) => token.expires_at,
                None => {
                    warn!("No token available for proactive refresh check");
                    return Ok(());
                }
            }
        };

        if expires_soon(expires_at, Utc::now()) {
            debug!("Token expires within {}s, refreshing proactively", PROACTIVE_REFRESH_THRESHOLD_SECS);
            self.refresh_token().await?;
        }
        Ok(())
    }

    /// Exchange an authorization code for a token
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange or save fails.
    pub async fn handle_callback(&self, code: &str) -> Result<()> {
        self.client
            .request_token(code)
            .await
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("Token exchange failed: {e}"),
            })?;

        self.write_cache().await?;
        info!("Successfully authenticated with Spotify");
        Ok(())
    }

    /// Run the browser login: serve the redirect URI locally, open the
    /// authorization page and wait up to 10 minutes for the callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start, the callback never
    /// arrives, or the token exchange fails.
    pub async fn authenticate_interactive(&self) -> Result<()> {
        let target = RedirectTarget::parse(&self.client.oauth.redirect_uri)?;
        let server = CallbackServer::bind(target).await?;

        let auth_url = self
            .client
            .get_authorize_url(false)
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("Failed to generate auth URL: {e}"),
            })?;

        info!("Opening browser for Spotify authorization...");
        if let Err(e) = open::that(&auth_url) {
            warn!("Could not open browser automatically: {}", e);
            info!("Please open this URL manually:\n{auth_url}");
        }

        let code = server.wait_for_code(OAUTH_CALLBACK_TIMEOUT).await?;
        info!("Received authorization code, exchanging for token...");
        self.handle_callback(&code).await
    }

    /// Use the cached token if possible, otherwise log in interactively
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or token refresh fails.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        info!("Checking for cached Spotify token...");

        match self.load_cached_token().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => warn!("Cached Spotify token unusable: {}", e),
        }

        info!("No valid cached token, starting interactive authentication...");
        self.authenticate_interactive().await
    }

    /// Display name of the logged-in user, falling back to the user id
    ///
    /// # Errors
    ///
    /// Returns an error if the profile request fails.
    pub async fn current_user_name(&self) -> Result<String> {
        let user = self.client.me().await?;
        Ok(user
            .display_name
            .unwrap_or_else(|| user.id.id().to_string()))
    }

    /// Delete the token cache file
    pub fn clear_tokens(&self) {
        if self.token_path.exists() {
            if let Err(e) = fs::remove_file(&self.token_path) {
                warn!("Failed to remove token cache {:?}: {}", self.token_path, e);
            }
        }
    }
}
