//! ChannelShield CLI
//!
//! CLI tool for compiling blocklists and running the filtering engine on
//! saved documents.

mod feed;

use std::fs;
use std::time::Instant;

use clap::{Parser, Subcommand};

use cs_core::config::DEFAULT_BLOCK_MESSAGE;
use cs_core::network::{route_for, Request};
use cs_core::rules::RuleSetKind;
use cs_core::{BlockIndex, Fetch, GlobalObject, PathKind};

#[derive(Parser)]
#[command(name = "cs-cli")]
#[command(about = "ChannelShield blocklist compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a blocklist into a rule feed
    Compile {
        /// Blocklist file (`{"blockedChannels": [...]}`)
        #[arg(short, long)]
        input: String,

        /// Output feed file
        #[arg(short, long, default_value = "feed.json")]
        output: String,

        /// Message shown in place of a blocked player
        #[arg(long, default_value = DEFAULT_BLOCK_MESSAGE)]
        message: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Filter a JSON document with a rule feed
    Filter {
        /// Rule feed file
        #[arg(short, long)]
        feed: String,

        /// Document to filter
        #[arg(short, long)]
        input: String,

        /// Rule set: main, guide or player
        #[arg(short, long, default_value = "main")]
        set: String,

        /// Write the filtered document here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Run a saved API response through the network interceptor
    Intercept {
        /// Rule feed file
        #[arg(short, long)]
        feed: String,

        /// Request URL the response belongs to
        #[arg(short, long)]
        url: String,

        /// Response body file
        #[arg(short, long)]
        input: String,

        /// Response content type
        #[arg(long, default_value = "application/json")]
        content_type: String,

        /// Write the delivered body here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Look up a channel in a blocklist
    Lookup {
        /// Blocklist file
        #[arg(short, long)]
        input: String,

        /// Channel id
        #[arg(long, default_value = "")]
        id: String,

        /// Channel name, matched after normalization
        #[arg(long, default_value = "")]
        name: String,

        /// Page path, to show how the overlay would treat it
        #[arg(long)]
        path: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            message,
            verbose,
        } => cmd_compile(&input, &output, &message, verbose),
        Commands::Filter {
            feed,
            input,
            set,
            output,
        } => cmd_filter(&feed, &input, &set, output.as_deref()),
        Commands::Intercept {
            feed,
            url,
            input,
            content_type,
            output,
        } => cmd_intercept(&feed, &url, &input, &content_type, output.as_deref()),
        Commands::Lookup { input, id, name, path } => cmd_lookup(&input, &id, &name, path.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(input: &str, output: &str, message: &str, verbose: bool) -> Result<(), String> {
    let build = feed::compile_feed(input, message, verbose)?;
    let size = feed::write_feed(&build.feed, output)?;

    println!("Compiled '{}' to '{}'", input, output);
    println!("  Records:  {}", build.stats.records);
    println!("  Patterns: {} id, {} name", build.stats.id_patterns, build.stats.name_patterns);
    println!("  Size:     {} bytes ({:.1} KB)", size, size as f64 / 1024.0);
    println!("  Time:     {:.1}ms", build.total_ms);

    if build.entries == 0 {
        println!("  Warning:  blocklist is empty, the feed blocks nothing");
    }

    Ok(())
}

fn cmd_filter(feed_path: &str, input: &str, set: &str, output: Option<&str>) -> Result<(), String> {
    let kind = RuleSetKind::from_str(set).ok_or_else(|| format!("Unknown rule set '{}'", set))?;
    let shield = feed::load_shield(feed_path)?;
    let content = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;

    let start = Instant::now();
    let (document, report) = shield
        .filter_json(kind, &content)
        .map_err(|e| format!("Failed to parse '{}': {}", input, e))?;
    let elapsed = start.elapsed();

    let text = serde_json::to_string_pretty(&document).map_err(|e| format!("Failed to encode output: {}", e))?;
    emit(&text, output)?;

    eprintln!(
        "Filtered '{}' with {} rules: {} nodes visited, {} removed, {} replaced ({:.2}ms)",
        input,
        kind.as_str(),
        report.visited,
        report.removed,
        report.replaced,
        elapsed.as_secs_f64() * 1000.0
    );

    Ok(())
}

fn cmd_intercept(
    feed_path: &str,
    url: &str,
    input: &str,
    content_type: &str,
    output: Option<&str>,
) -> Result<(), String> {
    let shield = feed::load_shield(feed_path)?;
    let fetch = shield
        .network()
        .install(
            &GlobalObject::new(),
            feed::FileFetch {
                path: input.to_string(),
                content_type: content_type.to_string(),
            },
        )
        .map_err(|_| "Request surface is locked".to_string())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    let original_len = fs::metadata(input)
        .map_err(|e| format!("Failed to read '{}': {}", input, e))?
        .len();
    let response = runtime.block_on(fetch.fetch(&Request::get(url)))?;

    let text = String::from_utf8_lossy(&response.body);
    emit(&text, output)?;

    let route = route_for(url).map_or("none", RuleSetKind::as_str);
    let rewritten = response.header("content-length").is_none();
    eprintln!(
        "Route: {} | {} | {} -> {} bytes",
        route,
        if rewritten { "rewritten" } else { "passed through" },
        original_len,
        response.body.len()
    );

    Ok(())
}

fn cmd_lookup(input: &str, id: &str, name: &str, path: Option<&str>) -> Result<(), String> {
    if id.is_empty() && name.is_empty() {
        return Err("Specify --id or --name".to_string());
    }

    let index = BlockIndex::new(feed::read_records(input)?);
    println!("Blocklist '{}': {} records", input, index.len());
    if index.is_empty() {
        println!("  Warning:  blocklist has no usable records");
    }
    if !id.is_empty() {
        println!("  Id listed:   {}", if index.contains_id(id) { "yes" } else { "no" });
    }
    if !name.is_empty() {
        println!("  Name listed: {}", if index.contains_name(name) { "yes" } else { "no" });
    }

    match index.find(id, name) {
        Some(record) => {
            println!("  Blocked:  yes");
            println!("  Id:       {}", record.id);
            println!("  Name:     {}", record.name);
            println!("  Owner:    {}", record.owner);
        }
        None => println!("  Blocked:  no"),
    }

    if let Some(path) = path {
        let kind = PathKind::classify(path);
        println!("  Page:     {:?} (overlay fallback {})", kind, if kind.shows_channel() { "applies" } else { "skipped" });
    }

    Ok(())
}

fn emit(text: &str, output: Option<&str>) -> Result<(), String> {
    match output {
        Some(path) => fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path, e)),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}
