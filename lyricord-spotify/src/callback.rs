//! Local HTTP server that receives the OAuth redirect.

use crate::error::{Result, SpotifyError};
use axum::{extract::Query, response::Html, routing::get, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::info;

/// Port used when the redirect URI doesn't name one
const DEFAULT_CALLBACK_PORT: u16 = 8888;

type CodeSender = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// Where the OAuth redirect lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub addr: SocketAddr,
    pub path: String,
}

impl RedirectTarget {
    /// Parse a redirect URI such as `http://127.0.0.1:8888/callback`.
    ///
    /// `localhost` binds to the IPv4 loopback address.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is malformed or its host is not an IP
    /// address or `localhost`.
    pub fn parse(redirect_uri: &str) -> Result<Self> {
        let invalid = |reason: String| SpotifyError::InvalidRedirectUri {
            uri: redirect_uri.to_string(),
            reason,
        };

        let url = url::Url::parse(redirect_uri).map_err(|e| invalid(e.to_string()))?;
        let host = match url.host_str() {
            None | Some("localhost") => "127.0.0.1",
            Some(host) => host,
        };
        let port = url.port().unwrap_or(DEFAULT_CALLBACK_PORT);

        // IPv6 hosts come back bracketed, which SocketAddr also expects
        let addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| invalid(format!("cannot listen on {host}:{port}: {e}")))?;

        Ok(Self {
            addr,
            path: url.path().to_string(),
        })
    }
}

/// Query parameters Spotify appends to the redirect
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// Bound callback server waiting for a single authorization code
pub struct CallbackServer {
    listener: TcpListener,
    target: RedirectTarget,
}

impl CallbackServer {
    /// Bind the listener for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(target: RedirectTarget) -> Result<Self> {
        let listener = TcpListener::bind(target.addr)
            .await
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("Failed to bind to {}: {e}", target.addr),
            })?;

        info!(
            "OAuth callback server listening on http://{}{}",
            target.addr, target.path
        );
        Ok(Self { listener, target })
    }

    /// Serve until a code arrives or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or if the server stops first.
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String> {
        let (tx, rx) = oneshot::channel::<String>();
        let tx: CodeSender = Arc::new(Mutex::new(Some(tx)));

        let app = Router::new().route(
            &self.target.path,
            get(move |Query(params): Query<CallbackParams>| {
                let tx = tx.clone();
                async move { handle_redirect(params, tx).await }
            }),
        );
        let server = axum::serve(self.listener, app);

        tokio::select! {
            code = rx => code.map_err(|_| SpotifyError::AuthFailed {
                reason: "Callback channel closed unexpectedly".into(),
            }),
            _ = server => Err(SpotifyError::AuthFailed {
                reason: "Server stopped unexpectedly".into(),
            }),
            () = tokio::time::sleep(timeout) => Err(SpotifyError::AuthFailed {
                reason: format!(
                    "OAuth callback timed out after {} minutes. Please try again.",
                    timeout.as_secs() / 60
                ),
            }),
        }
    }
}

async fn handle_redirect(params: CallbackParams, tx: CodeSender) -> Html<String> {
    match (params.code, params.error) {
        (Some(code), _) => {
            if let Some(sender) = tx.lock().await.take() {
                let _ = sender.send(code);
            }
            Html(page(
                "Authorization Successful",
                "lyricord is now connected to Spotify. You can close this window.",
            ))
        }
        (None, Some(error)) => Html(page(
            "Authorization Failed",
            &format!("Error: {error}. Please close this window and try again."),
        )),
        (None, None) => Html(page(
            "Authorization Failed",
            "No authorization code received. Please close this window and try again.",
        )),
    }
}

fn page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
    <h1>{title}</h1>
    <p>{message}</p>
</body>
</html>"#
    )
}
