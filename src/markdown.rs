use std::fmt::Write;

use crate::provider::Provider;
use crate::track::{ParseResult, TrackMetadata, PLACEHOLDER};

pub const ERROR_MESSAGE: &str = "Error parsing the link.";

const SPECIAL_CHARS: &[char] = &[
    '*', '_', '`', '[', ']', '(', ')', '~', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Backslash-escapes markup characters. Apply once: the backslash itself is
/// not special, so escaping twice doubles every escape.
pub fn escape_markdown(text: &str) -> String {
    if text.is_empty() {
        return PLACEHOLDER.to_string();
    }
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        if SPECIAL_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn format_card(track: &TrackMetadata) -> String {
    let mut card = String::new();
    _ = writeln!(&mut card, "**Title:** {}", escape_markdown(&track.title));
    _ = writeln!(&mut card, "**Artists:** {}", escape_markdown(&track.artists));
    _ = write!(&mut card, "**URL:** {}", track.url);
    card
}

/// What the user sees for a parse outcome; failure reasons stay in the logs.
pub fn format_reply(result: &ParseResult) -> String {
    match result {
        ParseResult::Success(track) => format_card(track),
        ParseResult::Failure(_) => ERROR_MESSAGE.to_string(),
    }
}

/// Extra card lines for the same track on other services, empty when there
/// are none.
pub fn format_links(links: &[(Provider, String)]) -> String {
    let mut out = String::new();
    if links.is_empty() {
        return out;
    }
    out.push_str("\n\n**Also on:**");
    for (provider, url) in links {
        _ = write!(&mut out, "\n{}: {}", escape_markdown(provider.display_name()), url);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_every_special_char() {
        assert_eq!(
            escape_markdown("*_`[]()~>#+-=|{}.!"),
            r"\*\_\`\[\]\(\)\~\>\#\+\-\=\|\{\}\.\!"
        );
        assert_eq!(escape_markdown("AC/DC, 2024: ok"), "AC/DC, 2024: ok");
        assert_eq!(escape_markdown(""), PLACEHOLDER);
    }

    #[test]
    fn double_escape_adds_backslashes() {
        let once = escape_markdown("a.b");
        assert_eq!(once, r"a\.b");
        assert_eq!(escape_markdown(&once), r"a\\.b");
    }

    #[test]
    fn card_escapes_text_but_not_url() {
        let card = format_card(&TrackMetadata {
            title: "Hey (Remix)".to_string(),
            artists: "A-ha".to_string(),
            url: "https://open.spotify.com/track/abc".to_string(),
        });
        assert_eq!(
            card,
            "**Title:** Hey \\(Remix\\)\n**Artists:** A\\-ha\n**URL:** https://open.spotify.com/track/abc"
        );
    }

    #[test]
    fn links_follow_the_card() {
        assert_eq!(format_links(&[]), "");
        let links = [(Provider::Spotify, "https://open.spotify.com/track/1".to_string())];
        assert_eq!(
            format_links(&links),
            "\n\n**Also on:**\n🟢 Spotify: https://open.spotify.com/track/1"
        );
    }

    #[test]
    fn failures_hide_the_reason() {
        let reply = format_reply(&ParseResult::Failure("rendering failed: boom".to_string()));
        assert_eq!(reply, ERROR_MESSAGE);
    }
}
