use std::time::Instant;

use crate::config::Config;
use crate::error::ExtractionError;
use crate::opengraph::{extract_tags, ArtistSplitter, HttpTagSource, TagSource};
use crate::provider::{Provider, ProviderPatterns, RawLinkRequest};
use crate::render::{extract_rendered, ChromeRenderer, PageRenderer};
use crate::track::{normalize, ParseResult, RawTrack};

/// Turns chat messages into track metadata. Holds no per-request state, so a
/// single instance serves concurrent messages.
pub struct LinkParser {
    patterns: ProviderPatterns,
    splitter: ArtistSplitter,
    tags: Box<dyn TagSource>,
    renderer: Box<dyn PageRenderer>,
}

impl LinkParser {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::with_sources(
            ProviderPatterns::new()?,
            ArtistSplitter::new()?,
            Box::new(HttpTagSource::new()?),
            Box::new(ChromeRenderer::new(config.render.clone())),
        ))
    }

    pub fn with_sources(
        patterns: ProviderPatterns,
        splitter: ArtistSplitter,
        tags: Box<dyn TagSource>,
        renderer: Box<dyn PageRenderer>,
    ) -> Self {
        LinkParser {
            patterns,
            splitter,
            tags,
            renderer,
        }
    }

    pub fn patterns(&self) -> &ProviderPatterns {
        &self.patterns
    }

    async fn extract(&self, provider: Provider, url: &str) -> Result<RawTrack, ExtractionError> {
        match provider {
            Provider::Spotify => extract_tags(self.tags.as_ref(), &self.splitter, url).await,
            Provider::YandexMusic | Provider::MtsMusic => {
                extract_rendered(self.renderer.as_ref(), url).await
            }
            Provider::Unknown => Err(ExtractionError::UnsupportedLink),
        }
    }

    pub async fn parse_link(&self, text: &str) -> ParseResult {
        let request = match RawLinkRequest::from_message(&self.patterns, text) {
            Some(request) => request,
            None => return ParseResult::Failure("no link found".to_string()),
        };
        let provider = self.patterns.classify(&request.url);
        tracing::debug!(message = %request.text, url = %request.url, %provider, "parsing link");
        let started = Instant::now();
        let result = self.extract(provider, &request.url).await;
        let elapsed = started.elapsed();
        match result {
            Ok(raw) => {
                tracing::info!(url = %request.url, %provider, ?elapsed, "link parsed");
                ParseResult::Success(normalize(raw))
            }
            Err(err) => {
                tracing::warn!(
                    url = %request.url,
                    %provider,
                    ?elapsed,
                    error = %err,
                    "link parsing failed"
                );
                ParseResult::Failure(err.to_string())
            }
        }
    }
}
