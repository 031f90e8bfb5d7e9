pub const PLACEHOLDER: &str = "N/A";

/// Title suffixes some provider pages append to the track name.
const MARKETING_SUFFIXES: &[&str] = &[" - слушать песню онлайн", " - listen online"];

/// Whatever an extractor managed to pull out of a page, unescaped and possibly
/// incomplete.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawTrack {
    pub title: Option<String>,
    pub artists: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artists: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Success(TrackMetadata),
    Failure(String),
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success(_))
    }
}

impl From<TrackMetadata> for RawTrack {
    fn from(track: TrackMetadata) -> Self {
        RawTrack {
            title: Some(track.title),
            artists: Some(track.artists),
            url: Some(track.url),
        }
    }
}

fn clean(field: Option<String>) -> String {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn strip_marketing(mut title: &str) -> &str {
    while let Some(stripped) = MARKETING_SUFFIXES
        .iter()
        .find_map(|suffix| title.strip_suffix(suffix))
    {
        title = stripped.trim_end();
    }
    title
}

pub fn normalize(raw: RawTrack) -> TrackMetadata {
    let title = raw.title.map(|t| strip_marketing(t.trim()).to_string());
    TrackMetadata {
        title: clean(title),
        artists: clean(raw.artists),
        url: clean(raw.url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_get_placeholder() {
        let track = normalize(RawTrack {
            title: Some("  Song ".to_string()),
            artists: Some("   ".to_string()),
            url: None,
        });
        assert_eq!(track.title, "Song");
        assert_eq!(track.artists, PLACEHOLDER);
        assert_eq!(track.url, PLACEHOLDER);
    }

    #[test]
    fn strips_marketing_suffix() {
        let track = normalize(RawTrack {
            title: Some("Кукла колдуна - слушать песню онлайн".to_string()),
            artists: Some("Король и Шут".to_string()),
            url: Some("https://music.mts.ru/track/1".to_string()),
        });
        assert_eq!(track.title, "Кукла колдуна");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            RawTrack::default(),
            RawTrack {
                title: Some(" Title - listen online ".to_string()),
                artists: Some("\tArtist ".to_string()),
                url: Some("https://example.com".to_string()),
            },
        ];
        for raw in inputs {
            let once = normalize(raw);
            let twice = normalize(once.clone().into());
            assert_eq!(once, twice);
        }
    }
}
