//! Hand-authored trigger tables
//!
//! A trigger key is a field name whose presence in a host node marks a
//! listing, card or player entry. Each trigger carries the candidate paths,
//! relative to the trigger's subtree, where the channel id and name live.

use serde_json::{json, Map, Value};

use crate::config::DEFAULT_BLOCK_MESSAGE;
use crate::filter::{MatchAction, MatchContext, MatchHook};
use crate::path::scalar_text;
use crate::pattern::Field;
use crate::types::BlockNotification;

/// Candidate paths for each identity field.
#[derive(Debug, Clone, Copy)]
pub struct PathSpec {
    pub channel_id: &'static [&'static str],
    pub channel_name: &'static [&'static str],
}

impl PathSpec {
    pub fn paths(&self, field: Field) -> &'static [&'static str] {
        match field {
            Field::ChannelId => self.channel_id,
            Field::ChannelName => self.channel_name,
        }
    }
}

#[derive(Clone, Copy)]
pub struct TriggerRule {
    pub key: &'static str,
    pub paths: PathSpec,
    /// Runs on a match; without one the trigger key is deleted.
    pub on_match: Option<MatchHook>,
}

/// Which table applies to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleSetKind {
    /// Search, browse and related listings plus channel cards.
    Main,
    /// Navigation sidebar entries.
    Guide,
    /// The loaded video's metadata.
    Player,
}

impl RuleSetKind {
    pub fn rule_set(self) -> &'static FilterRuleSet {
        match self {
            Self::Main => &MAIN,
            Self::Guide => &GUIDE,
            Self::Player => &PLAYER,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "main" => Some(Self::Main),
            "guide" => Some(Self::Guide),
            "player" => Some(Self::Player),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Guide => "guide",
            Self::Player => "player",
        }
    }
}

pub struct FilterRuleSet {
    pub kind: RuleSetKind,
    pub triggers: &'static [TriggerRule],
}

impl FilterRuleSet {
    pub fn get(&self, key: &str) -> Option<&TriggerRule> {
        self.triggers.iter().find(|t| t.key == key)
    }
}

/// Grouping wrappers removed whenever their subtree lost an entry.
pub const COLLAPSIBLE_KEYS: &[&str] = &[
    "richItemRenderer",
    "content",
    "horizontalListRenderer",
    "verticalListRenderer",
    "shelfRenderer",
    "richShelfRenderer",
    "gridRenderer",
    "expandedShelfContentsRenderer",
    "reelShelfRenderer",
    "richSectionRenderer",
];

pub fn is_collapsible(key: &str) -> bool {
    COLLAPSIBLE_KEYS.contains(&key)
}

// =============================================================================
// Main
// =============================================================================

const BYLINE: PathSpec = PathSpec {
    channel_id: &["shortBylineText.runs.navigationEndpoint.browseEndpoint.browseId"],
    channel_name: &["shortBylineText", "longBylineText", "ownerText", "bylineText"],
};

const fn byline(key: &'static str) -> TriggerRule {
    TriggerRule {
        key,
        paths: BYLINE,
        on_match: None,
    }
}

const CHANNEL_CARD: PathSpec = PathSpec {
    channel_id: &["channelId"],
    channel_name: &["title"],
};

pub static MAIN: FilterRuleSet = FilterRuleSet {
    kind: RuleSetKind::Main,
    triggers: &[
        byline("videoRenderer"),
        byline("gridVideoRenderer"),
        byline("compactVideoRenderer"),
        byline("playlistVideoRenderer"),
        byline("playlistPanelVideoRenderer"),
        byline("radioRenderer"),
        byline("compactRadioRenderer"),
        byline("playlistRenderer"),
        byline("compactPlaylistRenderer"),
        byline("gridPlaylistRenderer"),
        byline("reelItemRenderer"),
        byline("videoWithContextRenderer"),
        byline("endScreenVideoRenderer"),
        byline("endScreenPlaylistRenderer"),
        TriggerRule {
            key: "watchCardCompactVideoRenderer",
            paths: PathSpec {
                channel_id: &["subtitles.runs.navigationEndpoint.browseEndpoint.browseId"],
                channel_name: &["subtitles"],
            },
            on_match: None,
        },
        TriggerRule {
            key: "channelRenderer",
            paths: PathSpec {
                channel_id: &["channelId", "navigationEndpoint.browseEndpoint.browseId"],
                channel_name: &["title", "shortBylineText"],
            },
            on_match: None,
        },
        TriggerRule {
            key: "gridChannelRenderer",
            paths: CHANNEL_CARD,
            on_match: None,
        },
        TriggerRule {
            key: "miniChannelRenderer",
            paths: CHANNEL_CARD,
            on_match: None,
        },
        TriggerRule {
            key: "lockupViewModel",
            paths: PathSpec {
                channel_id: &[
                    "metadata.lockupMetadataViewModel.image.decoratedAvatarViewModel.rendererContext.commandContext.onTap.innertubeCommand.browseEndpoint.browseId",
                    "metadata.lockupMetadataViewModel.metadata.contentMetadataViewModel.metadataRows.metadataParts.text.commandRuns.onTap.innertubeCommand.browseEndpoint.browseId",
                ],
                channel_name: &[
                    "metadata.lockupMetadataViewModel.metadata.contentMetadataViewModel.metadataRows.metadataParts.text.content",
                ],
            },
            on_match: None,
        },
    ],
};

// =============================================================================
// Guide
// =============================================================================

pub static GUIDE: FilterRuleSet = FilterRuleSet {
    kind: RuleSetKind::Guide,
    triggers: &[TriggerRule {
        key: "guideEntryRenderer",
        paths: PathSpec {
            channel_id: &["navigationEndpoint.browseEndpoint.browseId", "icon.iconType"],
            channel_name: &["title", "formattedTitle"],
        },
        on_match: None,
    }],
};

// =============================================================================
// Player
// =============================================================================

pub static PLAYER: FilterRuleSet = FilterRuleSet {
    kind: RuleSetKind::Player,
    triggers: &[
        TriggerRule {
            key: "videoDetails",
            paths: PathSpec {
                channel_id: &["channelId"],
                channel_name: &["author"],
            },
            on_match: Some(disable_player),
        },
        TriggerRule {
            key: "args",
            paths: PathSpec {
                channel_id: &["ucid", "raw_player_response.videoDetails.channelId"],
                channel_name: &["author", "raw_player_response.videoDetails.author"],
            },
            on_match: None,
        },
        TriggerRule {
            key: "PLAYER_VARS",
            paths: PathSpec {
                channel_id: &[
                    "ucid",
                    "raw_player_response.videoDetails.channelId",
                    "raw_player_response.embedPreview.thumbnailPreviewRenderer.videoDetails.embeddedPlayerOverlayVideoDetailsRenderer.expandedRenderer.embeddedPlayerOverlayVideoDetailsExpandedRenderer.subscribeButton.subscribeButtonRenderer.channelId",
                ],
                channel_name: &["author", "raw_player_response.videoDetails.author"],
            },
            on_match: None,
        },
    ],
};

/// Replace a player response with an unplayable error screen and notify.
fn disable_player(node: &Map<String, Value>, key: &str, ctx: &MatchContext<'_>) -> MatchAction {
    let message = if ctx.block_message.is_empty() {
        DEFAULT_BLOCK_MESSAGE
    } else {
        ctx.block_message
    };

    let details = node.get(key);
    let field = |name: &str| details.and_then(|d| d.get(name)).map(scalar_text).unwrap_or_default();
    ctx.notify(BlockNotification {
        channel_id: field("channelId"),
        channel_name: field("author"),
        message: message.to_string(),
    });

    MatchAction::Replace(blocked_player_response(message))
}

/// The synthetic payload a blocked player response is replaced with.
pub fn blocked_player_response(message: &str) -> Value {
    json!({
        "playabilityStatus": {
            "status": "ERROR",
            "reason": message,
            "errorScreen": {
                "playerErrorMessageRenderer": {
                    "reason": { "simpleText": message },
                    "icon": { "iconType": "ERROR_OUTLINE" }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_have_unique_keys() {
        for set in [&MAIN, &GUIDE, &PLAYER] {
            let mut keys: Vec<_> = set.triggers.iter().map(|t| t.key).collect();
            let before = keys.len();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), before, "{:?}", set.kind);
        }
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [RuleSetKind::Main, RuleSetKind::Guide, RuleSetKind::Player] {
            assert_eq!(RuleSetKind::from_str(kind.as_str()), Some(kind));
            assert_eq!(kind.rule_set().kind, kind);
        }
        assert_eq!(RuleSetKind::from_str("other"), None);
    }

    #[test]
    fn only_video_details_has_a_hook() {
        assert!(PLAYER.get("videoDetails").unwrap().on_match.is_some());
        assert!(PLAYER.get("args").unwrap().on_match.is_none());
        assert!(MAIN.triggers.iter().all(|t| t.on_match.is_none()));
    }
}
