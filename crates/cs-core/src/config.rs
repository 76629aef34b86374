//! Fixed protocol constants and tunable timings.

use std::time::Duration;

// =============================================================================
// Message Channel
// =============================================================================

/// Origin tag of messages posted by the content side.
pub const FROM_CONTENT: &str = "CHANNELSHIELD_CONTENT";

/// Origin tag of messages posted by the page engine.
pub const FROM_PAGE: &str = "CHANNELSHIELD_PAGE";

/// Page-scoped storage key holding the last rule feed.
pub const CACHE_KEY: &str = "channelshield:feedCache:v1";

/// Message shown in place of a blocked player.
pub const DEFAULT_BLOCK_MESSAGE: &str = "Blocked by ChannelShield";

// =============================================================================
// Host API
// =============================================================================

/// Path prefix shared by every intercepted API route.
pub const API_PREFIX: &str = "/youtubei/v1";

// =============================================================================
// Overlay
// =============================================================================

/// Lifetimes of the overlay windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayTimings {
    /// How long a definitive block keeps the overlay up.
    pub forced: Duration,
    /// How long an off-view block waits for the view to arrive.
    pub pending: Duration,
}

impl OverlayTimings {
    pub fn forced_ms(&self) -> u64 {
        self.forced.as_millis() as u64
    }

    pub fn pending_ms(&self) -> u64 {
        self.pending.as_millis() as u64
    }
}

impl Default for OverlayTimings {
    fn default() -> Self {
        Self {
            forced: Duration::from_secs(10 * 60),
            pending: Duration::from_secs(2),
        }
    }
}
