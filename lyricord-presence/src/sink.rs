//! Rich Presence as a [`NotificationSink`].

use crate::activity::PresenceActivity;
use crate::client::PresenceClient;
use crate::error::Result;
use async_trait::async_trait;
use lyricord_core::{LyricLine, NotificationSink, TrackInfo};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct PresenceState<C> {
    client: C,
    connected: bool,
    track: Option<TrackInfo>,
    line: Option<LyricLine>,
    /// Last activity the client accepted
    shown: Option<PresenceActivity>,
}

impl<C: PresenceClient> PresenceState<C> {
    /// Send the activity for the current track and line, connecting first if
    /// needed. A failed update drops the connection so the next one reconnects.
    fn publish(&mut self) -> Result<()> {
        let activity = PresenceActivity::new(self.track.as_ref(), self.line.as_ref());
        if self.shown.as_ref() == Some(&activity) {
            return Ok(());
        }

        if !self.connected {
            self.client.connect()?;
            self.connected = true;
            info!("Connected to Discord");
        }

        if let Err(e) = self.client.set_activity(&activity) {
            self.connected = false;
            self.shown = None;
            return Err(e);
        }

        debug!(
            "Presence updated: {} / {}",
            activity.details,
            activity.state.as_deref().unwrap_or("-")
        );
        self.shown = Some(activity);
        Ok(())
    }
}

/// Shows the current track and lyric line as a Rich Presence activity.
///
/// The synchronizer reports the track through
/// [`on_track_changed`](NotificationSink::on_track_changed) and each line
/// through [`on_line_changed`](NotificationSink::on_line_changed). Identical
/// consecutive activities are only sent once.
pub struct PresenceSink<C> {
    state: Mutex<PresenceState<C>>,
}

impl<C: PresenceClient> PresenceSink<C> {
    /// Wrap `client`. The connection is opened on the first update.
    #[must_use]
    pub fn new(client: C) -> Self {
        Self {
            state: Mutex::new(PresenceState {
                client,
                connected: false,
                track: None,
                line: None,
                shown: None,
            }),
        }
    }

    /// Clear the activity and close the connection
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if !state.connected {
            return;
        }

        if let Err(e) = state.client.clear_activity() {
            warn!("Failed to clear Discord presence: {}", e);
        }
        if let Err(e) = state.client.close() {
            warn!("Failed to close Discord connection: {}", e);
        }
        state.connected = false;
        state.shown = None;
        info!("Disconnected from Discord");
    }
}

#[async_trait]
impl<C: PresenceClient> NotificationSink for PresenceSink<C> {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn on_line_changed(&self, line: Option<&LyricLine>) -> lyricord_core::Result<()> {
        let mut state = self.state.lock().await;
        state.line = line.cloned();
        state.publish().map_err(Into::into)
    }

    async fn on_track_changed(&self, track: Option<&TrackInfo>) -> lyricord_core::Result<()> {
        let mut state = self.state.lock().await;
        state.track = track.cloned();
        // The previous track's line no longer applies
        state.line = None;
        state.publish().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PresenceError;
    use lyricord_core::CoreError;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Connect,
        Set(String, Option<String>),
        Clear,
        Close,
    }

    /// Records calls; optionally fails the next connect or update
    #[derive(Clone, Default)]
    struct MockClient {
        calls: Arc<StdMutex<Vec<Call>>>,
        fail_connect: Arc<StdMutex<bool>>,
        fail_update: Arc<StdMutex<bool>>,
    }

    impl MockClient {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn updates(&self) -> Vec<(String, Option<String>)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Set(details, state) => Some((details, state)),
                    _ => None,
                })
                .collect()
        }
    }

    impl PresenceClient for MockClient {
        fn connect(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Connect);
            if std::mem::take(&mut *self.fail_connect.lock().unwrap()) {
                return Err(PresenceError::Connect {
                    reason: "discord not running".into(),
                });
            }
            Ok(())
        }

        fn set_activity(&mut self, activity: &PresenceActivity) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Set(
                activity.details.clone(),
                activity.state.clone(),
            ));
            if std::mem::take(&mut *self.fail_update.lock().unwrap()) {
                return Err(PresenceError::Update {
                    reason: "pipe closed".into(),
                });
            }
            Ok(())
        }

        fn clear_activity(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Clear);
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Close);
            Ok(())
        }
    }

    fn track(id: &str, name: &str) -> TrackInfo {
        TrackInfo::new(
            id,
            name,
            vec!["Singer".into(), "Guest".into()],
            "Album",
            Duration::from_secs(200),
        )
    }

    fn update(details: &str, state: Option<&str>) -> (String, Option<String>) {
        (details.to_string(), state.map(ToString::to_string))
    }

    #[tokio::test]
    async fn test_track_and_lines_are_shown() {
        let client = MockClient::default();
        let sink = PresenceSink::new(client.clone());

        sink.on_track_changed(Some(&track("1", "Song"))).await.unwrap();
        sink.on_line_changed(Some(&LyricLine::new(1.0, "first line")))
            .await
            .unwrap();
        sink.on_line_changed(None).await.unwrap();

        assert_eq!(client.calls()[0], Call::Connect);
        assert_eq!(
            client.updates(),
            vec![
                update("Song by Singer", None),
                update("Song by Singer", Some("first line")),
                update("Song by Singer", None),
            ]
        );
    }

    #[tokio::test]
    async fn test_idle_shows_nothing_playing() {
        let client = MockClient::default();
        let sink = PresenceSink::new(client.clone());

        sink.on_track_changed(Some(&track("1", "Song"))).await.unwrap();
        sink.on_line_changed(Some(&LyricLine::new(1.0, "la")))
            .await
            .unwrap();
        sink.on_line_changed(None).await.unwrap();
        sink.on_track_changed(None).await.unwrap();

        assert_eq!(
            client.updates().last(),
            Some(&update("Nothing playing", None))
        );
    }

    #[tokio::test]
    async fn test_new_track_drops_previous_line() {
        let client = MockClient::default();
        let sink = PresenceSink::new(client.clone());

        sink.on_track_changed(Some(&track("1", "Song"))).await.unwrap();
        sink.on_line_changed(Some(&LyricLine::new(1.0, "old words")))
            .await
            .unwrap();
        sink.on_track_changed(Some(&track("2", "Next"))).await.unwrap();

        assert_eq!(
            client.updates().last(),
            Some(&update("Next by Singer", None))
        );
    }

    #[tokio::test]
    async fn test_identical_activity_sent_once() {
        let client = MockClient::default();
        let sink = PresenceSink::new(client.clone());

        sink.on_track_changed(None).await.unwrap();
        sink.on_line_changed(None).await.unwrap();
        sink.on_track_changed(None).await.unwrap();

        assert_eq!(
            client.calls(),
            vec![Call::Connect, Call::Set("Nothing playing".into(), None)]
        );
    }

    #[tokio::test]
    async fn test_connect_failure_retried_on_next_update() {
        let client = MockClient::default();
        *client.fail_connect.lock().unwrap() = true;
        let sink = PresenceSink::new(client.clone());

        let err = sink
            .on_track_changed(Some(&track("1", "Song")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotificationFailed { ref sink, .. } if sink == "discord"
        ));
        assert!(client.updates().is_empty());

        sink.on_line_changed(Some(&LyricLine::new(1.0, "hello")))
            .await
            .unwrap();
        assert_eq!(
            client.calls(),
            vec![
                Call::Connect,
                Call::Connect,
                Call::Set("Song by Singer".into(), Some("hello".into())),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_failure_reconnects() {
        let client = MockClient::default();
        let sink = PresenceSink::new(client.clone());

        sink.on_track_changed(Some(&track("1", "Song"))).await.unwrap();
        *client.fail_update.lock().unwrap() = true;
        assert!(sink
            .on_line_changed(Some(&LyricLine::new(1.0, "lost")))
            .await
            .is_err());

        sink.on_line_changed(Some(&LyricLine::new(2.0, "kept")))
            .await
            .unwrap();

        let connects = client
            .calls()
            .iter()
            .filter(|c| **c == Call::Connect)
            .count();
        assert_eq!(connects, 2);
        assert_eq!(
            client.updates().last(),
            Some(&update("Song by Singer", Some("kept")))
        );
    }

    #[tokio::test]
    async fn test_shutdown_clears_and_closes() {
        let client = MockClient::default();
        let sink = PresenceSink::new(client.clone());

        // Never connected: nothing to close
        sink.shutdown().await;
        assert!(client.calls().is_empty());

        sink.on_track_changed(Some(&track("1", "Song"))).await.unwrap();
        sink.shutdown().await;

        let calls = client.calls();
        assert_eq!(&calls[calls.len() - 2..], &[Call::Clear, Call::Close]);
    }
}
