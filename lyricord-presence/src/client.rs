use crate::activity::PresenceActivity;
use crate::error::{PresenceError, Result};
use discord_rich_presence::{activity, DiscordIpc, DiscordIpcClient};

/// Connection to a presence service.
///
/// Calls are synchronous; implementations are expected to be quick local IPC.
pub trait PresenceClient: Send + 'static {
    /// Open the connection.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Connect`] if the service is unreachable.
    fn connect(&mut self) -> Result<()>;

    /// Replace the shown activity.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Update`] if the activity was not accepted.
    fn set_activity(&mut self, activity: &PresenceActivity) -> Result<()>;

    /// Remove the shown activity.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Update`] if the request failed.
    fn clear_activity(&mut self) -> Result<()>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Update`] if the close handshake failed.
    fn close(&mut self) -> Result<()>;
}

/// Discord Rich Presence over the local IPC socket
pub struct DiscordClient {
    ipc: DiscordIpcClient,
}

impl DiscordClient {
    /// Create a client for the Discord application `client_id`. Does not connect.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Connect`] if the IPC client cannot be created.
    pub fn new(client_id: &str) -> Result<Self> {
        let ipc = DiscordIpcClient::new(client_id).map_err(|e| PresenceError::Connect {
            reason: e.to_string(),
        })?;
        Ok(Self { ipc })
    }
}

#[allow(clippy::needless_pass_by_value)]
fn update_error(e: Box<dyn std::error::Error>) -> PresenceError {
    PresenceError::Update {
        reason: e.to_string(),
    }
}

impl PresenceClient for DiscordClient {
    fn connect(&mut self) -> Result<()> {
        self.ipc.connect().map_err(|e| PresenceError::Connect {
            reason: e.to_string(),
        })
    }

    fn set_activity(&mut self, presence: &PresenceActivity) -> Result<()> {
        let assets = activity::Assets::new()
            .large_image(presence.large_image)
            .large_text(presence.large_text)
            .small_image(presence.small_image)
            .small_text(presence.small_text);

        let mut payload = activity::Activity::new()
            .details(&presence.details)
            .assets(assets);
        if let Some(state) = &presence.state {
            payload = payload.state(state);
        }

        self.ipc.set_activity(payload).map_err(update_error)
    }

    fn clear_activity(&mut self) -> Result<()> {
        self.ipc.clear_activity().map_err(update_error)
    }

    fn close(&mut self) -> Result<()> {
        self.ipc.close().map_err(update_error)
    }
}
