use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use cs_compiler::{build_feed, parse_blocklist_str, CompileStats};
use cs_core::types::PublisherRecord;
use cs_core::{
    Envelope, Fetch, FilterFeed, GlobalObject, MessageType, Response, Shield, ShieldObserver,
};
use cs_core::network::Request;

#[derive(Debug, Clone)]
pub struct FeedBuild {
    pub feed: FilterFeed,
    pub stats: CompileStats,
    pub entries: usize,
    pub total_ms: f64,
}

pub fn read_records(path: &str) -> Result<Vec<PublisherRecord>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    parse_blocklist_str(&content).map_err(|e| format!("Failed to parse '{}': {}", path, e))
}

pub fn compile_feed(input: &str, message: &str, verbose: bool) -> Result<FeedBuild, String> {
    let start = Instant::now();
    let records = read_records(input)?;

    if verbose {
        println!(
            "  {} - {} usable records",
            Path::new(input).file_name().unwrap_or_default().to_string_lossy(),
            records.len()
        );
    }

    let (feed, stats) = build_feed(&records, message);

    Ok(FeedBuild {
        feed,
        stats,
        entries: records.len(),
        total_ms: start.elapsed().as_secs_f64() * 1000.0,
    })
}

pub fn write_feed(feed: &FilterFeed, output: &str) -> Result<usize, String> {
    let text = serde_json::to_string_pretty(feed).map_err(|e| format!("Failed to encode feed: {}", e))?;
    fs::write(output, &text).map_err(|e| format!("Failed to write '{}': {}", output, e))?;
    Ok(text.len())
}

pub fn read_feed(path: &str) -> Result<FilterFeed, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    FilterFeed::from_json(&content).map_err(|e| format!("Failed to parse '{}': {}", path, e))
}

/// Prints block notifications the engine would post to the content side.
struct ConsoleObserver;

impl ShieldObserver for ConsoleObserver {
    fn post_message(&self, envelope: &Envelope) {
        if envelope.kind != MessageType::PlayerBlocked {
            return;
        }
        if let Some(notification) = envelope.notification() {
            println!(
                "  Player blocked: {} ({}) - {}",
                notification.channel_name, notification.channel_id, notification.message
            );
        }
    }
}

/// A page engine armed with the feed at `path`.
pub fn load_shield(path: &str) -> Result<Shield, String> {
    let feed = read_feed(path)?;
    let value = serde_json::to_value(&feed).map_err(|e| format!("Failed to encode feed: {}", e))?;

    let shield = Shield::new(Rc::new(ConsoleObserver));
    shield.storage_received(Some(&value), &mut GlobalObject::new());
    Ok(shield)
}

/// Serves a response body from disk, standing in for the network.
pub struct FileFetch {
    pub path: String,
    pub content_type: String,
}

impl Fetch for FileFetch {
    type Error = String;

    async fn fetch(&self, _request: &Request) -> Result<Response, String> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| format!("Failed to read '{}': {}", self.path, e))?;
        let length = body.len().to_string();
        Ok(Response::new(200, body)
            .with_header("content-type", &self.content_type)
            .with_header("content-length", &length))
    }
}
