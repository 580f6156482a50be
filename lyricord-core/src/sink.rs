//! Notification sinks invoked when the active lyric line changes.

use crate::error::Result;
use crate::lyrics::LyricLine;
use crate::playback::TrackInfo;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Receiver for active-line transitions.
///
/// The [`Synchronizer`](crate::Synchronizer) calls [`on_line_changed`](Self::on_line_changed)
/// once per transition, from its tick loop, and waits for it to finish before
/// the next tick. `None` means no line is active (before the first line, or
/// the lyrics are empty) so downstream displays can clear.
///
/// A returned error is logged and broadcast as
/// [`SyncEvent::DispatchFailed`](crate::SyncEvent::DispatchFailed). It is not
/// retried.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Human-readable sink name used in logs
    fn name(&self) -> &'static str;

    /// Handle a transition to `line`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink could not deliver the notification.
    async fn on_line_changed(&self, line: Option<&LyricLine>) -> Result<()>;

    /// Handle a change of the track being synchronized. `None` means nothing
    /// is playing any more.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink could not deliver the notification.
    async fn on_track_changed(&self, _track: Option<&TrackInfo>) -> Result<()> {
        Ok(())
    }
}

/// Sink that logs each line as `[mm:ss.xx] text`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn on_line_changed(&self, line: Option<&LyricLine>) -> Result<()> {
        match line {
            Some(line) => info!("{line}"),
            None => info!("[--:--.--] (no active line)"),
        }
        Ok(())
    }
}

/// Sink backed by a synchronous closure.
pub struct FnSink<F> {
    name: &'static str,
    f: F,
}

impl<F> FnSink<F>
where
    F: Fn(Option<&LyricLine>) -> Result<()> + Send + Sync,
{
    pub const fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

#[async_trait]
impl<F> NotificationSink for FnSink<F>
where
    F: Fn(Option<&LyricLine>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn on_line_changed(&self, line: Option<&LyricLine>) -> Result<()> {
        (self.f)(line)
    }
}

/// Forwards every notification to each inner sink in order.
///
/// All sinks are called even if an earlier one fails; the first error is
/// returned.
pub struct MultiSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl MultiSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for MultiSink {
    fn name(&self) -> &'static str {
        "multi"
    }

    async fn on_line_changed(&self, line: Option<&LyricLine>) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.on_line_changed(line).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn on_track_changed(&self, track: Option<&TrackInfo>) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.on_track_changed(track).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_log_sink_never_fails() {
        let sink = LogSink;
        assert!(sink.on_line_changed(None).await.is_ok());
        assert!(sink
            .on_line_changed(Some(&LyricLine::new(1.0, "hello")))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_fn_sink_forwards_lines() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = FnSink::new("recorder", move |line: Option<&LyricLine>| {
            seen_clone
                .lock()
                .unwrap()
                .push(line.map(|l| l.text.clone()));
            Ok(())
        });

        sink.on_line_changed(Some(&LyricLine::new(0.0, "a")))
            .await
            .unwrap();
        sink.on_line_changed(None).await.unwrap();

        assert_eq!(sink.name(), "recorder");
        assert_eq!(*seen.lock().unwrap(), vec![Some("a".to_string()), None]);
    }

    #[tokio::test]
    async fn test_fn_sink_propagates_errors() {
        let sink = FnSink::new("broken", |_: Option<&LyricLine>| {
            Err(CoreError::NotificationFailed {
                sink: "broken".into(),
                reason: "offline".into(),
            })
        });

        assert!(sink.on_line_changed(None).await.is_err());
    }

    #[tokio::test]
    async fn test_multi_sink_calls_every_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let broken = FnSink::new("broken", |_: Option<&LyricLine>| {
            Err(CoreError::NotificationFailed {
                sink: "broken".into(),
                reason: "offline".into(),
            })
        });
        let recorder = FnSink::new("recorder", move |line: Option<&LyricLine>| {
            seen_clone
                .lock()
                .unwrap()
                .push(line.map(|l| l.text.clone()));
            Ok(())
        });
        let sink = MultiSink::new(vec![Arc::new(broken), Arc::new(recorder)]);

        let result = sink.on_line_changed(Some(&LyricLine::new(0.0, "a"))).await;

        assert!(matches!(
            result,
            Err(CoreError::NotificationFailed { sink, .. }) if sink == "broken"
        ));
        assert_eq!(*seen.lock().unwrap(), vec![Some("a".to_string())]);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_track_changes_ignored_by_default() {
        let sink = MultiSink::new(vec![Arc::new(LogSink)]);
        let track = TrackInfo::new("id", "Song", vec![], "Album", std::time::Duration::ZERO);
        assert!(sink.on_track_changed(Some(&track)).await.is_ok());
        assert!(sink.on_track_changed(None).await.is_ok());
    }
}
