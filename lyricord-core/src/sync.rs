use crate::clock::VirtualClock;
use crate::config::SyncConfig;
use crate::error::{CoreError, Result};
use crate::lyrics::{LyricIndex, LyricLine};
use crate::playback::TrackInfo;
use crate::sink::NotificationSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default period of the tick loop
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default drift (seconds) below which a progress report is ignored
pub const DEFAULT_RESYNC_THRESHOLD_SECS: f64 = 1.0;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the synchronizer
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Tick loop started at this position
    Started { position: f64 },
    /// Tick loop stopped; the clock is frozen at this position
    Stopped { position: f64 },
    /// Clock jumped to a reported position
    Resynced { position: f64 },
    /// Lyrics were replaced
    LyricsReplaced { lines: usize },
    /// The track being synchronized changed; `None` when playback went idle
    TrackChanged { track: Option<TrackInfo> },
    /// Active line changed and the sink was invoked
    LineChanged { line: Option<LyricLine> },
    /// The sink returned an error for a transition
    DispatchFailed { message: String },
}

/// Mutable state shared by the driver-facing operations and the tick loop
struct SyncState {
    clock: VirtualClock,
    playing: bool,
    lyrics: Arc<LyricIndex>,
    track: Option<TrackInfo>,
    last_active: Option<LyricLine>,
    /// Reported position to jump to on the next tick
    pending_resync: Option<f64>,
    lyrics_replaced: bool,
}

/// Result of one evaluation step
struct Tick {
    position: f64,
    resynced_to: Option<f64>,
    line_change: Option<LineChange>,
}

struct LineChange {
    line: Option<LyricLine>,
}

impl SyncState {
    fn new(now: Instant) -> Self {
        Self {
            clock: VirtualClock::new(now, 0.0),
            playing: false,
            lyrics: Arc::new(LyricIndex::empty()),
            track: None,
            last_active: None,
            pending_resync: None,
            lyrics_replaced: false,
        }
    }

    /// Current position; frozen at the anchor while stopped
    fn position(&self, now: Instant) -> f64 {
        if self.playing {
            self.clock.extrapolate(now)
        } else {
            self.clock.anchor().position
        }
    }

    /// Apply pending flags, look up the active line and record a transition.
    fn advance(&mut self, now: Instant) -> Tick {
        // Line shown for the previous lyrics; only used to clear it if the
        // new lyrics have nothing active yet.
        let mut stale = None;
        if self.lyrics_replaced {
            stale = self.last_active.take();
            let position = self.clock.extrapolate(now);
            self.clock.reset_anchor(now, position);
            self.lyrics_replaced = false;
        }

        let mut resynced_to = None;
        let position = if let Some(reported) = self.pending_resync.take() {
            self.clock.reset_anchor(now, reported);
            resynced_to = Some(reported);
            reported
        } else {
            self.clock.extrapolate(now)
        };

        let active = self.lyrics.active_line(position);
        let changed = active != self.last_active.as_ref() || (active.is_none() && stale.is_some());

        let line_change = if changed {
            self.last_active = active.cloned();
            Some(LineChange {
                line: self.last_active.clone(),
            })
        } else {
            None
        };

        Tick {
            position,
            resynced_to,
            line_change,
        }
    }
}

/// Parts of the synchronizer the tick loop needs
struct Inner {
    state: Mutex<SyncState>,
    sink: Arc<dyn NotificationSink>,
    event_tx: broadcast::Sender<SyncEvent>,
    tick_interval: Duration,
    resync_threshold: f64,
}

impl Inner {
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        debug!(
            "Tick loop running every {}ms",
            self.tick_interval.as_millis()
        );

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick(Instant::now()).await;
        }

        debug!("Tick loop exited");
    }

    async fn tick(&self, now: Instant) {
        let tick = self.state.lock().await.advance(now);

        if let Some(position) = tick.resynced_to {
            info!("Resynced clock to {:.2}s", position);
            let _ = self.event_tx.send(SyncEvent::Resynced { position });
        }

        let Some(LineChange { line }) = tick.line_change else {
            return;
        };

        debug!(
            "Active line changed at {:.2}s: {:?}",
            tick.position,
            line.as_ref().map(|l| l.text.as_str())
        );
        self.dispatch(line).await;
    }

    /// Hand a transition to the sink. Must be called without the state lock held.
    async fn dispatch(&self, line: Option<LyricLine>) {
        if let Err(e) = self.sink.on_line_changed(line.as_ref()).await {
            self.report_failure(&e);
        }
        let _ = self.event_tx.send(SyncEvent::LineChanged { line });
    }

    fn report_failure(&self, e: &CoreError) {
        warn!("Notification sink {} failed: {}", self.sink.name(), e);
        let _ = self.event_tx.send(SyncEvent::DispatchFailed {
            message: e.to_string(),
        });
    }
}

/// Handle to a running tick loop
struct TickLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps a virtual playback clock in step with reported progress and
/// notifies a [`NotificationSink`] whenever the active lyric line changes.
///
/// The synchronizer is either stopped or playing. While playing, a background
/// task re-evaluates the active line every tick. Progress reports and lyric
/// replacements only set pending flags that the next tick consumes, so they
/// take effect within one tick period.
///
/// ```ignore
/// let sync = Synchronizer::new(Arc::new(LogSink));
/// sync.set_lyrics(index).await;
/// sync.set_progress(12.0).await;
/// sync.start().await;
/// ```
pub struct Synchronizer {
    inner: Arc<Inner>,
    runner: Mutex<Option<TickLoop>>,
}

impl Synchronizer {
    /// Create a stopped synchronizer with default timing
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Arc<Self> {
        Self::with_config(sink, &SyncConfig::default())
    }

    /// Create a stopped synchronizer with timing taken from `config`
    #[must_use]
    pub fn with_config(sink: Arc<dyn NotificationSink>, config: &SyncConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Arc::new(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SyncState::new(Instant::now())),
                sink,
                event_tx,
                tick_interval: config.tick_interval().max(Duration::from_millis(1)),
                resync_threshold: config.resync_threshold_secs(),
            }),
            runner: Mutex::new(None),
        })
    }

    /// Subscribe to synchronizer events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Start the tick loop. Does nothing if already playing.
    pub async fn start(&self) {
        let mut runner = self.runner.lock().await;
        if runner.is_some() {
            return;
        }

        let position = {
            let mut state = self.inner.state.lock().await;
            let position = state.clock.anchor().position;
            state.clock.reset_anchor(Instant::now(), position);
            state.playing = true;
            position
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.inner.clone().run(cancel.clone()));
        *runner = Some(TickLoop { cancel, handle });

        info!("Lyric sync started at {:.2}s", position);
        let _ = self.inner.event_tx.send(SyncEvent::Started { position });
    }

    /// Stop the tick loop and wait for it to exit. Does nothing if already stopped.
    ///
    /// Once this returns the sink will not be called again until the next
    /// [`start`](Self::start). A dispatch already in progress is allowed to finish.
    pub async fn stop(&self) {
        let mut runner = self.runner.lock().await;
        let Some(tick_loop) = runner.take() else {
            return;
        };

        tick_loop.cancel.cancel();
        if let Err(e) = tick_loop.handle.await {
            warn!("Tick loop ended abnormally: {}", e);
        }

        let position = {
            let mut state = self.inner.state.lock().await;
            let now = Instant::now();
            let position = state.clock.extrapolate(now);
            state.clock.reset_anchor(now, position);
            state.playing = false;
            position
        };

        info!("Lyric sync stopped at {:.2}s", position);
        let _ = self.inner.event_tx.send(SyncEvent::Stopped { position });
    }

    /// Stop the tick loop and clear the display.
    ///
    /// If a line is currently shown the sink receives `None` once, and the
    /// next [`start`](Self::start) dispatches the active line afresh. Lyrics
    /// and position are kept.
    pub async fn clear(&self) {
        self.stop().await;

        let shown = self.inner.state.lock().await.last_active.take();
        if shown.is_some() {
            debug!("Clearing displayed line");
            self.inner.dispatch(None).await;
        }
    }

    /// Tell the sink which track is being synchronized.
    ///
    /// Setting the same track again is a no-op.
    pub async fn set_track(&self, track: Option<TrackInfo>) {
        {
            let mut state = self.inner.state.lock().await;
            if state.track == track {
                return;
            }
            state.track.clone_from(&track);
        }

        if let Err(e) = self.inner.sink.on_track_changed(track.as_ref()).await {
            self.inner.report_failure(&e);
        }
        let _ = self.inner.event_tx.send(SyncEvent::TrackChanged { track });
    }

    /// Track most recently passed to [`set_track`](Self::set_track)
    pub async fn track(&self) -> Option<TrackInfo> {
        self.inner.state.lock().await.track.clone()
    }

    /// Report the externally observed playback position in seconds.
    ///
    /// Reports within the resync threshold of the current position are
    /// treated as drift noise and ignored. Larger differences schedule a
    /// resync that the next tick applies.
    pub async fn set_progress(&self, progress: f64) {
        let mut state = self.inner.state.lock().await;
        let reference = state
            .pending_resync
            .unwrap_or_else(|| state.position(Instant::now()));

        let drift = (reference - progress).abs();
        if drift < self.inner.resync_threshold {
            debug!(
                "Ignoring progress {:.2}s (drift {:.3}s)",
                progress, drift
            );
            return;
        }

        debug!(
            "Progress {:.2}s differs from {:.2}s, resync pending",
            progress, reference
        );
        state.pending_resync = Some(progress);
    }

    /// Replace the lyrics. The next tick forgets the previous active line
    /// and evaluates against the new lyrics without losing the position.
    pub async fn set_lyrics(&self, lyrics: impl Into<Arc<LyricIndex>>) {
        let lyrics = lyrics.into();
        let lines = lyrics.len();
        {
            let mut state = self.inner.state.lock().await;
            state.lyrics = lyrics;
            state.lyrics_replaced = true;
        }

        info!("Lyrics replaced ({} lines)", lines);
        let _ = self.inner.event_tx.send(SyncEvent::LyricsReplaced { lines });
    }

    /// Validate `lines` and replace the lyrics with them.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLyrics`](crate::CoreError::InvalidLyrics)
    /// if the lines are unsorted or have invalid timestamps. The current
    /// lyrics are left in place.
    pub async fn try_set_lyrics(&self, lines: Vec<LyricLine>) -> Result<()> {
        let index = LyricIndex::new(lines)?;
        self.set_lyrics(index).await;
        Ok(())
    }

    /// Whether the tick loop is running
    pub async fn is_playing(&self) -> bool {
        self.inner.state.lock().await.playing
    }

    /// Current playback position in seconds, without pending resyncs applied
    pub async fn position(&self) -> f64 {
        self.inner.state.lock().await.position(Instant::now())
    }

    /// Line most recently dispatched to the sink
    pub async fn active_line(&self) -> Option<LyricLine> {
        self.inner.state.lock().await.last_active.clone()
    }

    /// Current lyrics
    pub async fn lyrics(&self) -> Arc<LyricIndex> {
        self.inner.state.lock().await.lyrics.clone()
    }

    /// Configured tick period
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.inner.tick_interval
    }
}
