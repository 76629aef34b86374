//! ChannelShield Blocklist Compiler
//!
//! This crate turns a raw blocklist document into publisher records and
//! compiles them into the rule feed consumed by the page engine.

pub mod parser;
pub mod builder;

pub use builder::{build_feed, CompileStats};
pub use parser::{parse_blocklist, parse_blocklist_str, CompileError};
