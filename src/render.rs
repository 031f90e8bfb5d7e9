//! Title extraction for providers whose pages only get a meaningful
//! `document.title` after client-side rendering.
//!
//! Every call launches its own headless Chrome through `chromiumoxide` with a
//! throwaway profile directory, and tears it down again before returning.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use futures::StreamExt;
use itertools::Itertools;
use serenity::async_trait;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::error::ExtractionError;
use crate::track::RawTrack;

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Rendered titles look like `Artist — Track — Site`.
const TITLE_DELIMITER: &str = " — ";

/// Chrome's lifecycle name for "at most two requests in flight for 500ms".
const NETWORK_IDLE_EVENT: &str = "networkAlmostIdle";

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Chrome/Chromium executable, detected when unset
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    /// How long to wait for the network to go idle before reading the title anyway
    pub settle_timeout: Duration,
    /// Upper bound for a whole render, from browser launch to shutdown
    pub timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            settle_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// The document title of `url` once the page has finished rendering.
    async fn render_page_title(&self, url: &str) -> anyhow::Result<String>;
}

/// A browser owned by a single render call. Dropping it stops the CDP
/// handler and removes the profile directory; chromiumoxide kills a browser
/// process that was not closed.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl BrowserSession {
    async fn launch(config: &RenderConfig) -> anyhow::Result<Self> {
        let profile = tempfile::Builder::new().prefix("tune-relay-").tempdir()?;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage");
        if let Some(chrome_path) = &config.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });
        tracing::debug!(profile = %profile.path().display(), "browser launched");
        Ok(BrowserSession {
            browser,
            handler,
            _profile: profile,
        })
    }

    async fn close(mut self) {
        match self.browser.close().await {
            Ok(_) => {
                if let Err(err) = self.browser.wait().await {
                    tracing::warn!(error = %err, "failed to wait for browser exit");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to close browser, killing it");
                if let Some(Err(err)) = self.browser.kill().await {
                    tracing::warn!(error = %err, "failed to kill browser");
                }
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

pub struct ChromeRenderer {
    config: RenderConfig,
}

impl ChromeRenderer {
    pub fn new(config: RenderConfig) -> Self {
        ChromeRenderer { config }
    }

    async fn read_title(&self, browser: &Browser, url: &str) -> anyhow::Result<String> {
        let page = browser.new_page("about:blank").await?;
        page.execute(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
            .await?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await?;
        let mut lifecycle = page.event_listener::<EventLifecycleEvent>().await?;

        let navigation = page.execute(NavigateParams::new(url)).await?;
        if let Some(error) = &navigation.result.error_text {
            bail!("navigation to {url} failed: {error}");
        }
        let loader_id = navigation.result.loader_id.clone();

        let started = Instant::now();
        let settled = tokio::time::timeout(self.config.settle_timeout, async {
            while let Some(event) = lifecycle.next().await {
                let same_load = loader_id.as_ref().map_or(true, |id| *id == event.loader_id);
                if same_load && event.name == NETWORK_IDLE_EVENT {
                    return true;
                }
            }
            false
        })
        .await;
        match settled {
            Ok(true) => {
                tracing::debug!(url, elapsed = ?started.elapsed(), "network settled")
            }
            Ok(false) => tracing::warn!(url, "lifecycle events ended before the page settled"),
            Err(_) => tracing::warn!(
                url,
                timeout = ?self.config.settle_timeout,
                "page did not settle, reading title anyway"
            ),
        }

        page.get_title()
            .await?
            .ok_or_else(|| anyhow!("page {url} has no title"))
    }
}

/// Runs `render` to completion or fails once `timeout` has passed. Dropping
/// the future on expiry drops any `BrowserSession` it holds.
async fn with_deadline<F>(timeout: Duration, url: &str, render: F) -> anyhow::Result<String>
where
    F: Future<Output = anyhow::Result<String>>,
{
    match tokio::time::timeout(timeout, render).await {
        Ok(title) => title,
        Err(_) => bail!("rendering {url} timed out after {timeout:?}"),
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render_page_title(&self, url: &str) -> anyhow::Result<String> {
        with_deadline(self.config.timeout, url, async {
            let session = BrowserSession::launch(&self.config).await?;
            let title = self.read_title(&session.browser, url).await;
            session.close().await;
            title
        })
        .await
    }
}

pub fn parse_rendered_title(title: &str, url: &str) -> Result<RawTrack, ExtractionError> {
    let segments = title.split(TITLE_DELIMITER).map(str::trim).collect_vec();
    match segments.as_slice() {
        [artists, track, _site, ..] => Ok(RawTrack {
            title: Some(track.to_string()),
            artists: Some(artists.to_string()),
            url: Some(url.to_string()),
        }),
        _ => Err(ExtractionError::UnparsableTitle(title.to_string())),
    }
}

pub async fn extract_rendered(
    renderer: &dyn PageRenderer,
    url: &str,
) -> Result<RawTrack, ExtractionError> {
    let title = renderer
        .render_page_title(url)
        .await
        .map_err(|err| ExtractionError::RenderFailure(format!("{err:#}")))?;
    tracing::debug!(url, title = %title, "rendered page title");
    parse_rendered_title(&title, url)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRenderer(Result<&'static str, &'static str>);

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render_page_title(&self, _url: &str) -> anyhow::Result<String> {
            self.0.map(str::to_string).map_err(|e| anyhow!(e))
        }
    }

    const URL: &str = "https://music.yandex.ru/album/1/track/2";

    #[test]
    fn splits_artist_and_track() {
        let raw = parse_rendered_title("Artist — Track — SiteName", URL).unwrap();
        assert_eq!(raw.title.as_deref(), Some("Track"));
        assert_eq!(raw.artists.as_deref(), Some("Artist"));
        assert_eq!(raw.url.as_deref(), Some(URL));

        let raw =
            parse_rendered_title("Король и Шут — Лесник — слушать онлайн — Яндекс Музыка", URL)
                .unwrap();
        assert_eq!(raw.title.as_deref(), Some("Лесник"));
        assert_eq!(raw.artists.as_deref(), Some("Король и Шут"));
    }

    #[test]
    fn short_titles_are_unparsable() {
        for title in ["JustOneSegment", "Artist — Track", "", "Artist - Track - Site"] {
            let err = parse_rendered_title(title, URL).unwrap_err();
            assert!(
                matches!(&err, ExtractionError::UnparsableTitle(t) if t == title),
                "{title}"
            );
        }
    }

    #[tokio::test]
    async fn renderer_errors_are_render_failures() {
        let err = extract_rendered(&FakeRenderer(Err("chrome not found")), URL)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::RenderFailure(msg) if msg.contains("chrome")));
    }

    #[tokio::test]
    async fn stalled_render_hits_the_deadline() {
        let err = with_deadline(Duration::from_millis(20), URL, std::future::pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");

        let title = with_deadline(Duration::from_secs(5), URL, async { Ok("T".to_string()) })
            .await
            .unwrap();
        assert_eq!(title, "T");
    }

    #[tokio::test]
    async fn keeps_original_url() {
        let renderer = FakeRenderer(Ok("Artist — Track — Яндекс Музыка"));
        let raw = extract_rendered(&renderer, URL).await.unwrap();
        assert_eq!(raw.url.as_deref(), Some(URL));
    }
}
