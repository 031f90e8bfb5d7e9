use std::fmt;

use regex::{Regex, RegexBuilder};

const SPOTIFY_PATTERN: &str = r"^https?://(open\.spotify\.com|spotify\.link)/\S+";
const YANDEX_MUSIC_PATTERN: &str = r"^https?://music\.yandex\.ru/\S+";
const MTS_MUSIC_PATTERN: &str = r"^https?://mts-music-spo\.onelink\.me/\S+";
const URL_PATTERN: &str = r"https?://\S+";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Spotify,
    YandexMusic,
    MtsMusic,
    Unknown,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Spotify => "🟢 Spotify",
            Provider::YandexMusic => "🟠 Yandex Music",
            Provider::MtsMusic => "🟣 MTS Music",
            Provider::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Provider URL shapes, checked in order; the first match wins.
pub struct ProviderPatterns {
    patterns: Vec<(Provider, Regex)>,
    url: Regex,
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

impl ProviderPatterns {
    pub fn new() -> anyhow::Result<Self> {
        let patterns = [
            (Provider::Spotify, SPOTIFY_PATTERN),
            (Provider::YandexMusic, YANDEX_MUSIC_PATTERN),
            (Provider::MtsMusic, MTS_MUSIC_PATTERN),
        ]
        .into_iter()
        .map(|(provider, pattern)| Ok::<_, anyhow::Error>((provider, case_insensitive(pattern)?)))
        .collect::<anyhow::Result<_>>()?;
        let url = case_insensitive(URL_PATTERN)?;
        Ok(ProviderPatterns { patterns, url })
    }

    /// First `http(s)://` substring of `text`, up to the next whitespace.
    pub fn find_first_url<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.url.find(text).map(|m| m.as_str())
    }

    pub fn classify(&self, url: &str) -> Provider {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(url))
            .map(|(provider, _)| *provider)
            .unwrap_or(Provider::Unknown)
    }
}

/// A chat message together with the link it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLinkRequest {
    pub text: String,
    pub url: String,
}

impl RawLinkRequest {
    pub fn from_message(patterns: &ProviderPatterns, text: &str) -> Option<Self> {
        let url = patterns.find_first_url(text)?;
        Some(RawLinkRequest {
            text: text.to_string(),
            url: url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_hosts() {
        let patterns = ProviderPatterns::new().unwrap();
        let cases = [
            ("https://open.spotify.com/track/abc?si=1", Provider::Spotify),
            ("http://spotify.link/xyz", Provider::Spotify),
            ("HTTPS://OPEN.SPOTIFY.COM/album/1", Provider::Spotify),
            ("https://music.yandex.ru/album/1/track/2", Provider::YandexMusic),
            ("https://mts-music-spo.onelink.me/abc", Provider::MtsMusic),
        ];
        for (url, expected) in cases {
            assert_eq!(patterns.classify(url), expected, "{url}");
        }
    }

    #[test]
    fn everything_else_is_unknown() {
        let patterns = ProviderPatterns::new().unwrap();
        for url in [
            "",
            "hello",
            "https://example.com/open.spotify.com/track",
            "https://music.yandex.com/track/1",
            "https://open.spotify.com/",
            "ftp://open.spotify.com/track/1",
        ] {
            assert_eq!(patterns.classify(url), Provider::Unknown, "{url}");
        }
    }

    #[test]
    fn finds_first_url_only() {
        let patterns = ProviderPatterns::new().unwrap();
        let text = "check https://open.spotify.com/track/a and https://music.yandex.ru/b";
        assert_eq!(
            patterns.find_first_url(text),
            Some("https://open.spotify.com/track/a")
        );
        assert_eq!(patterns.find_first_url("no links here"), None);
        assert_eq!(patterns.find_first_url("http://"), None);

        let req = RawLinkRequest::from_message(&patterns, text).unwrap();
        assert_eq!(req.url, "https://open.spotify.com/track/a");
        assert_eq!(req.text, text);
    }
}
