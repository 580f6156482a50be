pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod fetcher;
pub mod lrc;
pub mod lyrics;
pub mod paths;
pub mod playback;
pub mod provider;
pub mod sink;
pub mod source;
pub mod sync;

pub use clock::{ClockAnchor, VirtualClock};
pub use config::{
    DiscordConfig, LoggingConfig, LyricordConfig, LyricsConfig, LyricsProviderType,
    SpotifyConfig, SyncConfig, CONFIG_TEMPLATE,
};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use driver::{PlaybackDriver, PollOutcome};
pub use error::{CoreError, Result};
pub use fetcher::LyricsFetcher;
pub use lrc::{LrcFile, LrcMetadata};
pub use lyrics::{active_line, format_timestamp, LyricIndex, LyricLine};
pub use paths::{
    config_dir, config_path, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME,
};
pub use playback::{NowPlaying, TrackInfo};
pub use provider::{FetchedLyrics, LyricsProvider, LyricsQuery, LyricsResult};
pub use sink::{FnSink, LogSink, MultiSink, NotificationSink};
pub use source::PlaybackSource;
pub use sync::{SyncEvent, Synchronizer, DEFAULT_RESYNC_THRESHOLD_SECS, DEFAULT_TICK_INTERVAL};
