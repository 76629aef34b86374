//! Overlay visibility state machine
//!
//! Decides, per evaluation, whether the "content is blocked" cover is shown
//! and with what payload. The transition function is pure: it takes the
//! current [`OverlayState`], the clock, the location path and an optional
//! block event, and returns the next state with a render decision. A block
//! seen while the user is off the watch view is held in a short pending
//! window; reaching the watch view in time promotes it into the long forced
//! window.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::config::OverlayTimings;
use crate::page::PathKind;
use crate::types::OverlayPayload;

/// A payload with the instant (ms) it stops applying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub payload: Option<OverlayPayload>,
    pub deadline: u64,
}

impl Window {
    fn open(payload: OverlayPayload, deadline: u64) -> Self {
        Self {
            payload: Some(payload),
            deadline,
        }
    }

    pub fn is_set(&self) -> bool {
        self.payload.is_some()
    }

    pub fn is_live(&self, now: u64) -> bool {
        self.is_set() && now < self.deadline
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayState {
    pub pending: Window,
    pub forced: Window,
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: OverlayState,
    /// `None` hides the overlay.
    pub render: Option<OverlayPayload>,
    /// Evaluate again on the next frame.
    pub schedule: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayStateMachine {
    timings: OverlayTimings,
}

impl OverlayStateMachine {
    pub fn new(timings: OverlayTimings) -> Self {
        Self { timings }
    }

    pub fn timings(&self) -> OverlayTimings {
        self.timings
    }

    /// Compute the next state.
    ///
    /// `fallback` supplies the payload for the page's own channel identity. It
    /// is only consulted on watch and channel paths, and only when no window
    /// decides the render.
    pub fn evaluate<F>(
        &self,
        state: &OverlayState,
        now: u64,
        path: &str,
        event: Option<&OverlayPayload>,
        fallback: F,
    ) -> Transition
    where
        F: FnOnce() -> Option<OverlayPayload>,
    {
        let kind = PathKind::classify(path);
        let watch = kind.is_watch();

        if let Some(payload) = event {
            return if watch {
                log::trace!("block event on watch view, forcing overlay");
                Transition {
                    state: OverlayState {
                        pending: Window::default(),
                        forced: Window::open(payload.clone(), now.saturating_add(self.timings.forced_ms())),
                    },
                    render: Some(payload.clone()),
                    schedule: false,
                }
            } else {
                log::trace!("block event off watch view, holding as pending");
                Transition {
                    state: OverlayState {
                        pending: Window::open(payload.clone(), now.saturating_add(self.timings.pending_ms())),
                        forced: state.forced.clone(),
                    },
                    render: None,
                    schedule: true,
                }
            };
        }

        if watch && state.pending.is_live(now) {
            if let Some(payload) = &state.pending.payload {
                return Transition {
                    state: OverlayState {
                        pending: Window::default(),
                        forced: Window::open(payload.clone(), now.saturating_add(self.timings.forced_ms())),
                    },
                    render: Some(payload.clone()),
                    schedule: false,
                };
            }
        }

        let mut next = state.clone();
        if next.pending.is_set() && now >= next.pending.deadline {
            next.pending = Window::default();
        }

        if watch && next.forced.is_live(now) {
            let render = next.forced.payload.clone();
            return Transition {
                state: next,
                render,
                schedule: false,
            };
        }

        if !watch || now >= next.forced.deadline {
            next.forced = Window::default();
        }

        let render = if kind.shows_channel() { fallback() } else { None };
        Transition {
            state: next,
            render,
            schedule: false,
        }
    }
}

/// Debounce guard for per-frame re-evaluation: at most one request is queued.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    queued: Cell<bool>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a re-evaluation. Returns false when one is already queued.
    pub fn request(&self) -> bool {
        !self.queued.replace(true)
    }

    /// Consume the queued request, if any.
    pub fn take(&self) -> bool {
        self.queued.replace(false)
    }

    pub fn is_queued(&self) -> bool {
        self.queued.get()
    }
}
