//! Looks a parsed track up on the other services, so a reply can point to the
//! same song elsewhere.

use std::time::Duration;

use anyhow::{anyhow, Context as _};
use regex::Regex;
use rspotify::{
    clients::BaseClient,
    model::{SearchResult, SearchType},
    ClientCredsSpotify, Config as SpotifyConfig, Credentials,
};
use serenity::async_trait;

use crate::config::Config;
use crate::provider::Provider;
use crate::track::{TrackMetadata, PLACEHOLDER};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Featuring credits and bracketed tags that make searches miss.
const NOISE_PATTERN: &str = r"(?i)\(feat[^)]*\)|\[[^\]]*\]";

#[async_trait]
pub trait TrackFinder: Send + Sync {
    fn provider(&self) -> Provider;

    /// Link to the best match for `query`, if the service has one.
    async fn find_track(&self, query: &str) -> anyhow::Result<Option<String>>;
}

pub struct SpotifyFinder {
    client: ClientCredsSpotify,
}

impl SpotifyFinder {
    pub async fn new(creds: Credentials) -> anyhow::Result<Self> {
        let config = SpotifyConfig {
            token_refreshing: true,
            ..Default::default()
        };
        let mut spotify = ClientCredsSpotify::with_config(creds, config);

        // Obtaining the access token
        spotify.request_token().await?;
        Ok(SpotifyFinder { client: spotify })
    }
}

#[async_trait]
impl TrackFinder for SpotifyFinder {
    fn provider(&self) -> Provider {
        Provider::Spotify
    }

    async fn find_track(&self, query: &str) -> anyhow::Result<Option<String>> {
        let res = self
            .client
            .search(query, SearchType::Track, None, None, Some(1), None)
            .await?;
        if let SearchResult::Tracks(tracks) = res {
            Ok(tracks
                .items
                .into_iter()
                .next()
                .and_then(|track| track.external_urls.get("spotify").cloned()))
        } else {
            Err(anyhow!("Not a track"))
        }
    }
}

pub struct CrossLinker {
    finders: Vec<Box<dyn TrackFinder>>,
    noise: Regex,
}

impl CrossLinker {
    pub fn new(finders: Vec<Box<dyn TrackFinder>>) -> anyhow::Result<Self> {
        Ok(CrossLinker {
            finders,
            noise: Regex::new(NOISE_PATTERN)?,
        })
    }

    /// Enables the services that have credentials configured.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut finders: Vec<Box<dyn TrackFinder>> = Vec::new();
        match &config.spotify {
            Some(creds) => {
                let spotify = SpotifyFinder::new(creds.clone())
                    .await
                    .context("Spotify authentication failed")?;
                finders.push(Box::new(spotify));
            }
            None => tracing::info!("no Spotify credentials, Spotify lookups disabled"),
        }
        Self::new(finders)
    }

    pub fn search_query(&self, track: &TrackMetadata) -> Option<String> {
        if track.title == PLACEHOLDER {
            return None;
        }
        let title = self.noise.replace_all(&track.title, "");
        let query = if track.artists == PLACEHOLDER {
            title.trim().to_string()
        } else {
            format!("{} {}", track.artists, title.trim())
        };
        (!query.is_empty()).then_some(query)
    }

    /// Links to `track` on every service except `source`. Lookups that fail
    /// or find nothing are left out.
    pub async fn find_links(
        &self,
        track: &TrackMetadata,
        source: Provider,
    ) -> Vec<(Provider, String)> {
        let query = match self.search_query(track) {
            Some(query) => query,
            None => return Vec::new(),
        };
        let mut links = Vec::new();
        for finder in self.finders.iter().filter(|f| f.provider() != source) {
            let provider = finder.provider();
            match tokio::time::timeout(LOOKUP_TIMEOUT, finder.find_track(&query)).await {
                Ok(Ok(Some(url))) => links.push((provider, url)),
                Ok(Ok(None)) => tracing::debug!(%provider, query = %query, "no match"),
                Ok(Err(err)) => tracing::warn!(%provider, error = %err, "lookup failed"),
                Err(_) => {
                    tracing::warn!(%provider, timeout = ?LOOKUP_TIMEOUT, "lookup timed out")
                }
            }
        }
        links
    }
}
