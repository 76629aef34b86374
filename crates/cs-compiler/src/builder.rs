use cs_core::index::BlockIndex;
use cs_core::pattern::FilterFeed;
use cs_core::types::PublisherRecord;

/// Counts reported by [`build_feed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Usable records that made it into the index.
    pub records: usize,
    pub id_patterns: usize,
    pub name_patterns: usize,
}

/// Build the rule feed for a list of records.
///
/// Ids become exact, case-sensitive patterns; names become exact,
/// case-insensitive patterns. Order follows the input list.
pub fn build_feed(records: &[PublisherRecord], block_message: &str) -> (FilterFeed, CompileStats) {
    let index = BlockIndex::new(records.iter().cloned());
    let feed = index.to_feed(block_message);

    let stats = CompileStats {
        records: index.len(),
        id_patterns: feed.filter_data.channel_id.len(),
        name_patterns: feed.filter_data.channel_name.len(),
    };
    log::debug!(
        "built feed: {} records, {} id patterns, {} name patterns",
        stats.records,
        stats.id_patterns,
        stats.name_patterns
    );

    (feed, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_core::pattern::{CompiledRules, Field, PatternSource};

    #[test]
    fn test_build_feed() {
        let records = vec![
            PublisherRecord::new("UC1", "First", ""),
            PublisherRecord::new("", "Second (Official)", ""),
            PublisherRecord::new("UC3", "", ""),
            PublisherRecord::new("", "", "nobody"),
        ];

        let (feed, stats) = build_feed(&records, "Gone");

        assert_eq!(
            stats,
            CompileStats {
                records: 3,
                id_patterns: 2,
                name_patterns: 2
            }
        );
        assert_eq!(
            feed.filter_data.channel_id,
            vec![
                PatternSource::Flagged("^UC1$".into(), String::new()),
                PatternSource::Flagged("^UC3$".into(), String::new()),
            ]
        );
        assert_eq!(feed.options.block_message, "Gone");

        let rules = CompiledRules::compile(&feed);
        assert!(rules.matches(Field::ChannelName, "second (official)"));
        assert!(!rules.matches(Field::ChannelName, "Second Official"));
    }

    #[test]
    fn test_empty_blocklist() {
        let (feed, stats) = build_feed(&[], "msg");
        assert_eq!(stats, CompileStats::default());
        assert!(CompiledRules::compile(&feed).is_empty());
    }
}
