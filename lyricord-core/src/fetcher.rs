//! Lyrics fetcher that tries each configured provider in turn.

use tracing::{info, warn};

use crate::lyrics::LyricIndex;
use crate::playback::TrackInfo;
use crate::provider::{LyricsProvider, LyricsQuery, LyricsResult};

/// Resolves synced lyrics for a track from an ordered list of providers
pub struct LyricsFetcher {
    providers: Vec<Box<dyn LyricsProvider>>,
}

impl LyricsFetcher {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn LyricsProvider>>) -> Self {
        Self { providers }
    }

    /// Names of the configured providers, in priority order
    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch synced lyrics for `track`.
    ///
    /// The first provider returning synced lyrics wins. Unsynced results,
    /// misses and provider errors fall through to the next provider. If no
    /// provider has synced lyrics the result is an empty index, which the
    /// synchronizer treats as "no active line".
    pub async fn fetch(&self, track: &TrackInfo) -> LyricIndex {
        let provider_names = self.provider_names();
        info!(
            "Fetching lyrics for {} (providers: {:?})",
            track, provider_names
        );

        let query = LyricsQuery::for_track(track);

        for provider in &self.providers {
            match provider.fetch(&query).await {
                Ok(fetched) => match fetched.result {
                    LyricsResult::Synced(lrc) => {
                        info!(
                            "Found synced lyrics from {} ({} lines, provider_id: {})",
                            provider.name(),
                            lrc.lyrics.len(),
                            fetched.provider_id
                        );
                        return lrc.into_index();
                    }
                    LyricsResult::Unsynced(_) => {
                        info!(
                            "Provider {} returned unsynced lyrics (cannot be timed)",
                            provider.name()
                        );
                    }
                    LyricsResult::NotFound => {
                        info!("Provider {} returned no lyrics", provider.name());
                    }
                },
                Err(e) => {
                    warn!("Provider {} failed with error: {}", provider.name(), e);
                }
            }
        }

        info!(
            "No synced lyrics found for {} (tried {} providers: {:?})",
            track,
            self.providers.len(),
            provider_names
        );
        LyricIndex::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::lrc::LrcFile;
    use crate::provider::FetchedLyrics;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    enum Canned {
        Synced(&'static str),
        Plain,
        Missing,
        Broken,
    }

    struct FakeProvider {
        name: &'static str,
        canned: Canned,
        calls: Arc<AtomicUsize>,
    }

    impl FakeProvider {
        fn boxed(name: &'static str, canned: Canned, calls: &Arc<AtomicUsize>) -> Box<dyn LyricsProvider> {
            Box::new(Self {
                name,
                canned,
                calls: calls.clone(),
            })
        }
    }

    #[async_trait]
    impl LyricsProvider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _query: &LyricsQuery) -> Result<FetchedLyrics, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match self.canned {
                Canned::Synced(lrc) => LyricsResult::Synced(LrcFile::parse(lrc)),
                Canned::Plain => LyricsResult::Unsynced("plain words".into()),
                Canned::Missing => LyricsResult::NotFound,
                Canned::Broken => {
                    return Err(CoreError::LyricsProviderFailed {
                        provider: self.name.into(),
                        reason: "boom".into(),
                    })
                }
            };
            Ok(FetchedLyrics {
                result,
                provider_id: "7".into(),
            })
        }
    }

    fn track() -> TrackInfo {
        TrackInfo::new("t1", "Song", vec!["Artist".into()], "Album", Duration::from_secs(180))
    }

    #[tokio::test]
    async fn test_first_synced_provider_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = LyricsFetcher::new(vec![
            FakeProvider::boxed("broken", Canned::Broken, &calls),
            FakeProvider::boxed("plain", Canned::Plain, &calls),
            FakeProvider::boxed("good", Canned::Synced("[00:01.00]one\n[00:02.00]two"), &calls),
            FakeProvider::boxed("unused", Canned::Synced("[00:01.00]other"), &calls),
        ]);

        let index = fetcher.fetch(&track()).await;

        assert_eq!(index.len(), 2);
        assert_eq!(index.first().unwrap().text, "one");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_synced_lyrics_gives_empty_index() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = LyricsFetcher::new(vec![
            FakeProvider::boxed("missing", Canned::Missing, &calls),
            FakeProvider::boxed("plain", Canned::Plain, &calls),
        ]);

        assert!(fetcher.fetch(&track()).await.is_empty());
        assert_eq!(fetcher.provider_names(), vec!["missing", "plain"]);
    }

    #[tokio::test]
    async fn test_no_providers() {
        let fetcher = LyricsFetcher::new(Vec::new());
        assert!(fetcher.fetch(&track()).await.is_empty());
    }
}
