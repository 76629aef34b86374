//! In-memory lookup over the current blocklist
//!
//! A [`BlockIndex`] is an immutable snapshot. It is rebuilt wholesale on every
//! blocklist change and shared behind an `Arc`, so readers holding an old
//! snapshot keep a consistent view until they drop it.

use std::collections::{HashMap, HashSet};

use crate::pattern::{FeedOptions, FilterData, FilterFeed, PatternSource};
use crate::types::{ChannelIdentity, PublisherRecord};

/// Collapse whitespace runs, trim and lowercase.
pub fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    ids: HashSet<String>,
    names: HashSet<String>,
    by_id: HashMap<String, PublisherRecord>,
    by_name: HashMap<String, PublisherRecord>,
    list: Vec<PublisherRecord>,
}

impl BlockIndex {
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PublisherRecord>,
    {
        let mut index = Self::default();
        for record in records {
            let record = PublisherRecord::new(&record.id, &record.name, &record.owner);
            if !record.is_usable() {
                continue;
            }
            if !record.id.is_empty() {
                index.ids.insert(record.id.clone());
                index.by_id.insert(record.id.clone(), record.clone());
            }
            let key = normalize(&record.name);
            if !key.is_empty() {
                index.names.insert(key.clone());
                index.by_name.insert(key, record.clone());
            }
            index.list.push(record);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn records(&self) -> &[PublisherRecord] {
        &self.list
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(&normalize(name))
    }

    /// Identifier hit first, then normalized-name hit.
    pub fn find(&self, id: &str, name: &str) -> Option<&PublisherRecord> {
        if !id.is_empty() {
            if let Some(record) = self.by_id.get(id) {
                return Some(record);
            }
        }
        let key = normalize(name);
        if key.is_empty() {
            return None;
        }
        self.by_name.get(&key)
    }

    pub fn find_channel(&self, channel: &ChannelIdentity) -> Option<&PublisherRecord> {
        self.find(&channel.id, &channel.name)
    }

    /// Build the rule feed for the page engine, in list order: ids match
    /// exactly, names match exactly but case-insensitively.
    pub fn to_feed(&self, block_message: &str) -> FilterFeed {
        let anchored = |value: &str| format!("^{}$", regex::escape(value));

        let channel_id = self
            .list
            .iter()
            .filter(|r| !r.id.is_empty())
            .map(|r| PatternSource::Flagged(anchored(&r.id), String::new()))
            .collect();
        let channel_name = self
            .list
            .iter()
            .filter(|r| !r.name.is_empty())
            .map(|r| PatternSource::Flagged(anchored(&r.name), "i".to_string()))
            .collect();

        FilterFeed {
            filter_data: FilterData {
                channel_id,
                channel_name,
            },
            options: FeedOptions {
                block_message: block_message.to_string(),
            },
        }
    }
}
