mod response;

use async_trait::async_trait;
use const_format::concatcp;
use lyricord_core::{CoreError, FetchedLyrics, LyricsProvider, LyricsQuery};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use response::{best_match, LrclibRecord};
use std::fmt::Write;
use std::time::Duration;
use tracing::{info, warn};

const LRCLIB_API_URL: &str = "https://lrclib.net/api";

const USER_AGENT: &str = concatcp!(
    "lyricord/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/lyricord/lyricord)"
);

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Duration tolerance for matching search results (±2 seconds)
const DURATION_TOLERANCE_SECS: f64 = 2.0;

/// LRCLIB.net lyrics provider.
///
/// Lookup order: exact `/get` match, then `/search` by track name filtered to
/// the track's duration, then free-text `/search` on artist and title.
pub struct LrclibProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl LrclibProvider {
    /// Create a provider against lrclib.net with a 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_base_url(LRCLIB_API_URL)
    }

    /// Create a provider against another LRCLIB-compatible server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn get_url(&self, query: &LyricsQuery) -> String {
        let mut url = format!(
            "{}/get?artist_name={}&track_name={}",
            self.base_url,
            urlencoding::encode(&query.artist_name),
            urlencoding::encode(&query.track_name)
        );
        if let Some(album) = &query.album_name {
            let _ = write!(url, "&album_name={}", urlencoding::encode(album));
        }
        if let Some(duration) = query.duration_secs {
            let _ = write!(url, "&duration={duration}");
        }
        url
    }

    fn track_search_url(&self, query: &LyricsQuery) -> String {
        format!(
            "{}/search?track_name={}",
            self.base_url,
            urlencoding::encode(&query.track_name)
        )
    }

    fn text_search_url(&self, query: &LyricsQuery) -> String {
        let text = format!("{} {}", query.artist_name, query.track_name);
        format!("{}/search?q={}", self.base_url, urlencoding::encode(&text))
    }

    fn status_error(&self, what: &str, status: reqwest::StatusCode) -> CoreError {
        CoreError::LyricsProviderFailed {
            provider: self.name().to_string(),
            reason: format!("LRCLIB {what} returned status: {status}"),
        }
    }

    fn not_found(query: &LyricsQuery) -> CoreError {
        CoreError::LyricsNotFound {
            track: query.track_name.clone(),
            artist: query.artist_name.clone(),
        }
    }

    /// Search by track name only and keep results within ±2 seconds of the track duration
    async fn search_by_track_name(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError> {
        let url = self.track_search_url(query);
        info!("LRCLIB GET (search by track): {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!("LRCLIB search returned status: {}", response.status());
            return self.search_fallback(query).await;
        }

        let mut records: Vec<LrclibRecord> = response.json().await?;
        if let Some(duration) = query.duration_secs {
            records.retain(|r| r.duration_within(duration, DURATION_TOLERANCE_SECS));
        }

        match best_match(records, query.duration_secs, 10.0) {
            Some(record) => {
                info!(
                    "LRCLIB found match by track name + duration (id: {}, artist: {}, duration: {:?})",
                    record.id, record.artist_name, record.duration
                );
                Ok(record.into_fetched())
            }
            None => {
                info!("LRCLIB search by track name found nothing usable, trying full search");
                self.search_fallback(query).await
            }
        }
    }

    async fn search_fallback(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError> {
        let url = self.text_search_url(query);
        info!("LRCLIB GET (full search): {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error("search", response.status()));
        }

        let records: Vec<LrclibRecord> = response.json().await?;
        let record = best_match(records, query.duration_secs, 1.0).ok_or_else(|| Self::not_found(query))?;

        info!(
            "LRCLIB found match via full search (id: {}, artist: {})",
            record.id, record.artist_name
        );
        Ok(record.into_fetched())
    }
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &'static str {
        "lrclib"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError> {
        info!(
            "Fetching lyrics from LRCLIB for: {} - {} (duration: {:?}s)",
            query.artist_name, query.track_name, query.duration_secs
        );

        let url = self.get_url(query);
        info!("LRCLIB GET (exact match): {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            info!("LRCLIB exact match not found, trying search by track name only");
            return self.search_by_track_name(query).await;
        }
        if !status.is_success() {
            warn!("LRCLIB returned status: {}", status);
            return Err(self.status_error("get", status));
        }

        let record: LrclibRecord = response.json().await?;
        info!("LRCLIB found match with id: {}", record.id);
        Ok(record.into_fetched())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> LyricsQuery {
        LyricsQuery::new("Don't Stop Me Now", "Queen & Friends")
            .with_album("Jazz")
            .with_duration(209)
    }

    #[test]
    fn test_get_url_encodes_fields() {
        let provider = LrclibProvider::new().unwrap();
        assert_eq!(
            provider.get_url(&query()),
            "https://lrclib.net/api/get?artist_name=Queen%20%26%20Friends\
             &track_name=Don%27t%20Stop%20Me%20Now&album_name=Jazz&duration=209"
        );
    }

    #[test]
    fn test_get_url_without_optional_fields() {
        let provider = LrclibProvider::new().unwrap();
        let url = provider.get_url(&LyricsQuery::new("Song", "Artist"));
        assert_eq!(url, "https://lrclib.net/api/get?artist_name=Artist&track_name=Song");
    }

    #[test]
    fn test_search_urls() {
        let provider = LrclibProvider::with_base_url("http://localhost:3000/api/").unwrap();
        assert_eq!(
            provider.track_search_url(&query()),
            "http://localhost:3000/api/search?track_name=Don%27t%20Stop%20Me%20Now"
        );
        assert_eq!(
            provider.text_search_url(&LyricsQuery::new("Song", "Artist")),
            "http://localhost:3000/api/search?q=Artist%20Song"
        );
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("lyricord/"));
    }
}
