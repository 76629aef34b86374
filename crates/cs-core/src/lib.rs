//! ChannelShield Core Library
//!
//! This crate provides the filtering engine that removes blocklisted
//! publishers from the JSON documents a video site's page assigns to its
//! globals or receives from its API, and decides when the blocked-content
//! overlay is shown.
//!
//! # Architecture
//!
//! A blocklist of [`PublisherRecord`]s is turned into a [`BlockIndex`] and a
//! rule feed. The page engine ([`Shield`]) compiles the feed into
//! [`CompiledRules`] and runs a [`TreeFilter`] over every intercepted
//! document: property writes trapped on the [`GlobalObject`] and API
//! responses passing the [`NetworkInterceptor`]. The content side
//! ([`OverlayController`]) drives the [`OverlayStateMachine`] from block
//! notifications and navigation.
//!
//! # Modules
//!
//! - `path`: Dotted-path resolution and rich-text flattening
//! - `pattern`: Rule feed and regex compilation
//! - `index`: Blocklist lookup snapshot
//! - `rules`: Trigger tables per document kind
//! - `filter`: Recursive tree filter
//! - `intercept`: Global object model and property interceptors
//! - `url`: Request URL helpers
//! - `network`: Response interception for both request surfaces
//! - `overlay`: Overlay visibility state machine
//! - `page`: Route classification and channel identity helpers
//! - `message`: Content/page message envelopes
//! - `shield`: Page-side engine
//! - `controller`: Content-side overlay controller
//! - `config`: Protocol constants and timings
//! - `types`: Shared type definitions

pub mod config;
pub mod controller;
pub mod filter;
pub mod index;
pub mod intercept;
pub mod message;
pub mod network;
pub mod overlay;
pub mod page;
pub mod path;
pub mod pattern;
pub mod rules;
pub mod shield;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use controller::{MessagePort, OverlayController, OverlayRenderer, PageProbe};
pub use filter::{BlockObserver, FilterReport, MatchAction, TreeFilter};
pub use index::BlockIndex;
pub use intercept::{GlobalObject, InstallOutcome, PropertyInterceptor, WriteError};
pub use message::{Envelope, MessageType};
pub use network::{Fetch, InterceptedFetch, NetworkInterceptor, Response, TrackedRequest};
pub use overlay::{OverlayState, OverlayStateMachine, Transition};
pub use page::PathKind;
pub use pattern::{CompiledRules, FeedError, FilterFeed, PatternError, PatternSource};
pub use rules::RuleSetKind;
pub use shield::{Notice, PageStorage, QueuedObserver, Shield, ShieldObserver};
pub use types::{BlockNotification, ChannelIdentity, OverlayPayload, PublisherRecord};
