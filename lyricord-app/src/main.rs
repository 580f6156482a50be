mod logging;

use lyricord_core::{
    CoreError, DiscordConfig, LogSink, LyricordConfig, LyricsFetcher, LyricsProvider,
    LyricsProviderType, MultiSink, NotificationSink, PlaybackDriver, SyncEvent, Synchronizer,
};
use lyricord_lyrics_lrclib::LrclibProvider;
use lyricord_presence::{DiscordClient, PresenceSink};
use lyricord_spotify::{SpotifyOAuth, SpotifyPoller};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

fn main() {
    logging::init_tracing(logging::file_logging_enabled());

    let config = match LyricordConfig::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created config at {}. Add your Spotify client_id and client_secret \
                 (from https://developer.spotify.com/dashboard) and restart.",
                path.display()
            );
            std::process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            error!("Config file: {}", LyricordConfig::config_path().display());
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let cancel_token = CancellationToken::new();
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    if let Err(e) = runtime.block_on(run(config, cancel_token)) {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: LyricordConfig, cancel_token: CancellationToken) -> Result<(), CoreError> {
    let providers = create_providers(&config);
    if providers.is_empty() {
        return Err(CoreError::ConfigInvalid {
            message: "no lyrics provider could be initialized".to_string(),
        });
    }
    let fetcher = Arc::new(LyricsFetcher::new(providers));
    info!("Lyrics providers: {:?}", fetcher.provider_names());

    let oauth = Arc::new(SpotifyOAuth::new(
        &config.spotify.client_id,
        &config.spotify.client_secret,
        &config.spotify.oauth_redirect_uri,
    ));

    tokio::select! {
        () = cancel_token.cancelled() => return Ok(()),
        result = oauth.ensure_authenticated() => result?,
    }

    match oauth.current_user_name().await {
        Ok(name) => info!("Logged in to Spotify as {}", name),
        Err(e) => error!("Failed to fetch Spotify profile: {}", e),
    }

    let presence = create_presence(&config.discord);
    let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(LogSink)];
    if let Some(presence) = &presence {
        sinks.push(presence.clone());
    }

    let synchronizer = Synchronizer::with_config(Arc::new(MultiSink::new(sinks)), &config.sync);
    tokio::spawn(log_sync_events(synchronizer.clone()));

    let driver = PlaybackDriver::new(
        Arc::new(SpotifyPoller::new(oauth)),
        fetcher,
        synchronizer,
        &config.spotify,
        cancel_token,
    );

    info!(
        "Polling Spotify every {}ms (idle: {}ms)",
        config.spotify.poll_interval_ms, config.spotify.idle_poll_interval_ms
    );
    driver.run().await;

    if let Some(presence) = presence {
        presence.shutdown().await;
    }

    info!("Goodbye");
    Ok(())
}

fn create_providers(config: &LyricordConfig) -> Vec<Box<dyn LyricsProvider>> {
    config
        .lyrics
        .providers
        .iter()
        .filter_map(|provider_type| -> Option<Box<dyn LyricsProvider>> {
            match provider_type {
                LyricsProviderType::Lrclib => match LrclibProvider::new() {
                    Ok(provider) => Some(Box::new(provider)),
                    Err(e) => {
                        error!("Failed to create LRCLIB provider: {}", e);
                        None
                    }
                },
            }
        })
        .collect()
}

fn create_presence(config: &DiscordConfig) -> Option<Arc<PresenceSink<DiscordClient>>> {
    if !config.is_enabled() {
        info!("Discord presence disabled (no client_id)");
        return None;
    }

    match DiscordClient::new(config.client_id.trim()) {
        Ok(client) => {
            info!("Discord presence enabled");
            Some(Arc::new(PresenceSink::new(client)))
        }
        Err(e) => {
            error!("Failed to create Discord client: {}", e);
            None
        }
    }
}

/// Log synchronizer lifecycle events
async fn log_sync_events(synchronizer: Arc<Synchronizer>) {
    let mut rx = synchronizer.subscribe();
    drop(synchronizer);

    loop {
        match rx.recv().await {
            Ok(SyncEvent::Resynced { position }) => debug!("Resynced to {:.2}s", position),
            Ok(SyncEvent::LineChanged { line: None }) => debug!("Display cleared"),
            // Started, Stopped and LyricsReplaced are logged by the synchronizer,
            // TrackChanged and DispatchFailed by the driver
            Ok(_) => {}
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(n)) => debug!("Missed {} sync events", n),
        }
    }
}
