//! Page route classification and channel identity extraction.

use std::sync::OnceLock;

use regex::Regex;

/// What kind of view a location path shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A single-content view (`/watch...`).
    Watch,
    /// A channel page (`/channel/`, `/@handle`, `/c/`, `/user/`).
    Channel,
    Other,
}

impl PathKind {
    pub fn classify(path: &str) -> Self {
        if path.starts_with("/watch") {
            Self::Watch
        } else if ["/channel/", "/@", "/c/", "/user/"]
            .iter()
            .any(|prefix| path.starts_with(prefix))
        {
            Self::Channel
        } else {
            Self::Other
        }
    }

    #[inline]
    pub fn is_watch(self) -> bool {
        self == Self::Watch
    }

    /// Watch and channel pages show one publisher's identity.
    #[inline]
    pub fn shows_channel(self) -> bool {
        self != Self::Other
    }
}

fn channel_href_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/channel/(UC[\w-]{16,})").ok()).as_ref()
}

/// Channel id embedded in a `/channel/UC...` link, or `""`.
pub fn parse_channel_id_from_href(href: &str) -> &str {
    channel_href_regex()
        .and_then(|re| re.captures(href))
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_paths() {
        assert_eq!(PathKind::classify("/watch"), PathKind::Watch);
        assert_eq!(PathKind::classify("/watch?v=abc"), PathKind::Watch);
        assert_eq!(PathKind::classify("/@someone/videos"), PathKind::Channel);
        assert_eq!(PathKind::classify("/channel/UCabc"), PathKind::Channel);
        assert_eq!(PathKind::classify("/c/legacy"), PathKind::Channel);
        assert_eq!(PathKind::classify("/user/old"), PathKind::Channel);
        assert_eq!(PathKind::classify("/results"), PathKind::Other);
        assert_eq!(PathKind::classify(""), PathKind::Other);
        assert!(PathKind::Channel.shows_channel());
        assert!(!PathKind::Channel.is_watch());
    }

    #[test]
    fn extracts_channel_id() {
        assert_eq!(
            parse_channel_id_from_href("/channel/UCabcdefghijklmnop12/videos"),
            "UCabcdefghijklmnop12"
        );
        assert_eq!(
            parse_channel_id_from_href("https://www.youtube.com/channel/UC_x-y_z0123456789a"),
            "UC_x-y_z0123456789a"
        );
        assert_eq!(parse_channel_id_from_href("/channel/UCshort"), "");
        assert_eq!(parse_channel_id_from_href("/@handle"), "");
    }
}
