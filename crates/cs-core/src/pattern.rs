//! Rule feed and pattern compilation
//!
//! The content side sends a [`FilterFeed`]: per-field lists of pattern
//! sources plus options. [`CompiledRules::compile`] turns it into regex
//! matchers. Sources that fail to compile are dropped one by one; the rest of
//! the batch still compiles.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_BLOCK_MESSAGE;

/// Error type for a single pattern source.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid pattern: {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("Unsupported flag: {0:?}")]
    UnsupportedFlag(char),
}

/// Error type for a rule feed document.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Malformed feed: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pattern Sources
// =============================================================================

/// Raw form of one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSource {
    /// A bare identifier or name, matched exactly and case-sensitively.
    Exact(String),
    /// A `[pattern, flags]` pair.
    Flagged(String, String),
}

impl PatternSource {
    /// Lenient conversion from JSON. Returns `None` for shapes that cannot
    /// name a pattern at all.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Exact(s.clone())),
            Value::Array(pair) => {
                let pattern = pair.first()?.as_str()?.to_string();
                let flags = match pair.get(1) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                Some(Self::Flagged(pattern, flags))
            }
            _ => None,
        }
    }
}

fn lenient_sources<'de, D>(deserializer: D) -> Result<Vec<PatternSource>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(PatternSource::from_value).collect(),
        _ => Vec::new(),
    })
}

// =============================================================================
// Feed
// =============================================================================

/// Per-field pattern sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterData {
    #[serde(default, deserialize_with = "lenient_sources")]
    pub channel_id: Vec<PatternSource>,
    #[serde(default, deserialize_with = "lenient_sources")]
    pub channel_name: Vec<PatternSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedOptions {
    #[serde(rename = "blockMessage", alias = "block_message", default = "default_block_message")]
    pub block_message: String,
}

fn default_block_message() -> String {
    DEFAULT_BLOCK_MESSAGE.to_string()
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            block_message: default_block_message(),
        }
    }
}

/// The inbound rule feed, as sent over the message channel and cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterFeed {
    #[serde(default, deserialize_with = "lenient_filter_data")]
    pub filter_data: FilterData,
    #[serde(default, deserialize_with = "lenient_options")]
    pub options: FeedOptions,
}

fn lenient_filter_data<'de, D>(deserializer: D) -> Result<FilterData, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_options<'de, D>(deserializer: D) -> Result<FeedOptions, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl FilterFeed {
    pub fn from_value(value: &Value) -> Result<Self, FeedError> {
        Ok(Self::deserialize(value)?)
    }

    pub fn from_json(text: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(text)?)
    }
}

// =============================================================================
// Compiled Patterns
// =============================================================================

/// A single-shot matcher. Holds no match state between tests.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn compile(source: &PatternSource) -> Result<Self, PatternError> {
        let regex = match source {
            PatternSource::Exact(text) => Regex::new(&format!("^(?:{})$", regex::escape(text)))?,
            PatternSource::Flagged(pattern, flags) => compile_flagged(pattern, flags)?,
        };
        Ok(Self { regex })
    }

    #[inline]
    pub fn test(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn compile_flagged(pattern: &str, flags: &str) -> Result<Regex, PatternError> {
    let (mut ignore_case, mut multi_line, mut dot_all, mut sticky) = (false, false, false, false);
    for flag in flags.chars() {
        match flag {
            // Global and index flags carry no meaning for a stateless test.
            'g' | 'd' => {}
            'i' => ignore_case = true,
            'm' => multi_line = true,
            's' => dot_all = true,
            'u' | 'v' => {}
            'y' => sticky = true,
            other => return Err(PatternError::UnsupportedFlag(other)),
        }
    }

    let source = if sticky {
        format!(r"\A(?:{pattern})")
    } else {
        pattern.to_string()
    };

    Ok(RegexBuilder::new(&source)
        .case_insensitive(ignore_case)
        .multi_line(multi_line)
        .dot_matches_new_line(dot_all)
        .build()?)
}

/// Compile a list of sources, dropping the ones that fail.
pub fn compile_patterns(sources: &[PatternSource]) -> Vec<Pattern> {
    sources
        .iter()
        .filter_map(|source| match Pattern::compile(source) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                log::debug!("dropping pattern source {:?}: {}", source, e);
                None
            }
        })
        .collect()
}

/// Executable rules derived from a feed.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub channel_id: Vec<Pattern>,
    pub channel_name: Vec<Pattern>,
    pub block_message: String,
}

impl Default for CompiledRules {
    fn default() -> Self {
        Self {
            channel_id: Vec::new(),
            channel_name: Vec::new(),
            block_message: DEFAULT_BLOCK_MESSAGE.to_string(),
        }
    }
}

impl CompiledRules {
    pub fn compile(feed: &FilterFeed) -> Self {
        let rules = Self {
            channel_id: compile_patterns(&feed.filter_data.channel_id),
            channel_name: compile_patterns(&feed.filter_data.channel_name),
            block_message: feed.options.block_message.clone(),
        };
        log::debug!(
            "compiled {} id and {} name patterns",
            rules.channel_id.len(),
            rules.channel_name.len()
        );
        rules
    }

    /// True when no field has a pattern. Every traversal checks this first.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channel_id.is_empty() && self.channel_name.is_empty()
    }

    pub fn patterns(&self, field: Field) -> &[Pattern] {
        match field {
            Field::ChannelId => &self.channel_id,
            Field::ChannelName => &self.channel_name,
        }
    }

    /// Does any pattern of `field` accept `text`?
    pub fn matches(&self, field: Field, text: &str) -> bool {
        self.patterns(field).iter().any(|p| p.test(text))
    }
}

/// Identity fields tracked by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ChannelId,
    ChannelName,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::ChannelId, Field::ChannelName];
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_string_is_anchored_exact_match() {
        let pattern = Pattern::compile(&PatternSource::Exact("UC123".into())).unwrap();
        assert!(pattern.test("UC123"));
        assert!(!pattern.test("UC1234"));
        assert!(!pattern.test("xUC123"));
        assert!(!pattern.test("uc123"));
    }

    #[test]
    fn bare_string_metacharacters_are_literal() {
        let pattern = Pattern::compile(&PatternSource::Exact("a.b".into())).unwrap();
        assert!(pattern.test("a.b"));
        assert!(!pattern.test("axb"));
    }

    #[test]
    fn flagged_pair_honours_flags_minus_global() {
        let pattern =
            Pattern::compile(&PatternSource::Flagged("^blockedchannel$".into(), "gi".into())).unwrap();
        assert!(pattern.test("BlockedChannel"));
        // Repeated tests give the same answer: no lastIndex state.
        assert!(pattern.test("BlockedChannel"));
        assert!(!pattern.test("Blocked Channel"));
    }

    #[test]
    fn sticky_flag_anchors_at_start() {
        let pattern = Pattern::compile(&PatternSource::Flagged("abc".into(), "y".into())).unwrap();
        assert!(pattern.test("abcdef"));
        assert!(!pattern.test("xabc"));
    }

    #[test]
    fn malformed_sources_are_dropped_individually() {
        let feed = FilterFeed::from_value(&json!({
            "filterData": {
                "channelId": ["UC1", 42, ["(unclosed", ""], ["ok", "q"], ["UC2"], null],
                "channelName": "not a list"
            },
            "options": {"block_message": "Nope"}
        }))
        .unwrap();

        assert_eq!(feed.filter_data.channel_id.len(), 4);
        assert!(feed.filter_data.channel_name.is_empty());
        assert_eq!(feed.options.block_message, "Nope");

        let rules = CompiledRules::compile(&feed);
        assert_eq!(rules.channel_id.len(), 2);
        assert!(rules.matches(Field::ChannelId, "UC1"));
        assert!(rules.matches(Field::ChannelId, "xUC2x"));
        assert!(!rules.is_empty());
    }

    #[test]
    fn empty_feed_compiles_to_empty_rules() {
        let rules = CompiledRules::compile(&FilterFeed::default());
        assert!(rules.is_empty());
        assert_eq!(rules.block_message, DEFAULT_BLOCK_MESSAGE);
    }

    #[test]
    fn non_object_filter_data_reads_as_empty() {
        let feed = FilterFeed::from_value(&json!({"filterData": null, "options": {"blockMessage": "Gone"}})).unwrap();
        assert_eq!(feed.filter_data, FilterData::default());
        assert_eq!(feed.options.block_message, "Gone");

        let feed = FilterFeed::from_value(&json!({"filterData": [1, 2]})).unwrap();
        assert!(CompiledRules::compile(&feed).is_empty());
    }

    #[test]
    fn feed_serializes_in_wire_shape() {
        let feed = FilterFeed {
            filter_data: FilterData {
                channel_id: vec![PatternSource::Flagged("^UC1$".into(), String::new())],
                channel_name: vec![PatternSource::Exact("Name".into())],
            },
            options: FeedOptions::default(),
        };
        let value = serde_json::to_value(&feed).unwrap();
        assert_eq!(
            value,
            json!({
                "filterData": {"channelId": [["^UC1$", ""]], "channelName": ["Name"]},
                "options": {"blockMessage": DEFAULT_BLOCK_MESSAGE}
            })
        );
        assert_eq!(FilterFeed::from_value(&value).unwrap(), feed);
    }
}
