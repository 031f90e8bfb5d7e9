use std::time::Duration;

use anyhow::anyhow;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serenity::async_trait;

use crate::error::ExtractionError;
use crate::track::RawTrack;

/// Spotify only serves Open Graph tags to link-preview crawlers.
const PREVIEW_USER_AGENT: &str = "TelegramBot (like Twitterbot) Android";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Leading or trailing "by", "•" and "·" around a derived artist name.
const SEPARATORS_PATTERN: &str = r"(?i)^(?:\s|by\b|[•·])+|(?:\s|\bby|[•·])+$";
const LEADING_SEPARATOR_PATTERN: &str = r"(?i)^\s*(?:by\b|[•·])";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OgTags {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

fn meta_content(document: &Html, property: &str) -> anyhow::Result<Option<String>> {
    let query = format!(r#"meta[property="{property}"], meta[name="{property}"]"#);
    let selector =
        Selector::parse(&query).map_err(|err| anyhow!("invalid selector {query}: {err:?}"))?;
    Ok(document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string))
}

impl OgTags {
    pub fn from_html(html: &str) -> anyhow::Result<Self> {
        let document = Html::parse_document(html);
        Ok(OgTags {
            title: meta_content(&document, "og:title")?,
            description: meta_content(&document, "og:description")?,
            url: meta_content(&document, "og:url")?,
        })
    }
}

#[async_trait]
pub trait TagSource: Send + Sync {
    async fn fetch_tags(&self, url: &str) -> anyhow::Result<OgTags>;
}

pub struct HttpTagSource {
    client: Client,
}

impl HttpTagSource {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(PREVIEW_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(HttpTagSource { client })
    }
}

#[async_trait]
impl TagSource for HttpTagSource {
    async fn fetch_tags(&self, url: &str) -> anyhow::Result<OgTags> {
        let html = self
            .client
            .get(url)
            .header("accept", "text/html")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        OgTags::from_html(&html)
    }
}

/// Splits an Open Graph description like `Artist · Song · 2021` or
/// `Song by Artist` into the artist part. Built once and shared.
pub struct ArtistSplitter {
    separators: Regex,
    leading_separator: Regex,
}

impl ArtistSplitter {
    pub fn new() -> anyhow::Result<Self> {
        Ok(ArtistSplitter {
            separators: Regex::new(SEPARATORS_PATTERN)?,
            leading_separator: Regex::new(LEADING_SEPARATOR_PATTERN)?,
        })
    }

    fn strip(&self, segment: &str) -> Option<String> {
        let artists = self.separators.replace_all(segment, "");
        (!artists.is_empty()).then(|| artists.into_owned())
    }

    /// The text before the title. When nothing precedes it, the text after
    /// it, but only in the `Title by Artist` shape. The whole description
    /// when the title does not occur in it.
    pub fn derive_artists(&self, description: &str, title: &str) -> Option<String> {
        if title.is_empty() {
            return self.strip(description);
        }
        match description.split_once(title) {
            None => self.strip(description),
            Some((before, after)) => self.strip(before).or_else(|| {
                if self.leading_separator.is_match(after) {
                    self.strip(after)
                } else {
                    None
                }
            }),
        }
    }
}

pub async fn extract_tags(
    source: &dyn TagSource,
    splitter: &ArtistSplitter,
    url: &str,
) -> Result<RawTrack, ExtractionError> {
    let tags = source
        .fetch_tags(url)
        .await
        .map_err(|err| ExtractionError::NoMetadata(format!("{err:#}")))?;
    if tags.title.is_none() && tags.description.is_none() {
        return Err(ExtractionError::NoMetadata(
            "page has neither og:title nor og:description".to_string(),
        ));
    }
    let artists = match &tags.description {
        Some(description) => {
            splitter.derive_artists(description, tags.title.as_deref().unwrap_or_default())
        }
        None => {
            tracing::debug!(url, "og:description missing, artist left unknown");
            None
        }
    };
    Ok(RawTrack {
        title: tags.title,
        artists,
        url: Some(tags.url.unwrap_or_else(|| url.to_string())),
    })
}
