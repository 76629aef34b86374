//! Page-side engine
//!
//! [`Shield`] owns the current compiled rules and wires them into the host
//! page: it traps the page's initial-data globals, filters every write with
//! the right rule set, and feeds the same rules to the network interceptor.
//! Rules are swapped atomically; a filter pass that already loaded the old
//! rules finishes with them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::config::CACHE_KEY;
use crate::filter::{FilterReport, TreeFilter};
use crate::intercept::{GlobalObject, InstallOutcome, WriteHook};
use crate::message::{Envelope, MessageType};
use crate::network::NetworkInterceptor;
use crate::path::is_truthy;
use crate::pattern::{CompiledRules, FeedError, FilterFeed};
use crate::rules::RuleSetKind;
use crate::types::BlockNotification;

/// Global entry points the host page assigns its initial data to.
pub const PAGE_HOOKS: &[(&str, RuleSetKind)] = &[
    ("ytInitialData", RuleSetKind::Main),
    ("ytInitialGuideData", RuleSetKind::Guide),
    ("ytInitialPlayerResponse", RuleSetKind::Player),
    ("ytplayer.config", RuleSetKind::Player),
    ("yt.config_", RuleSetKind::Player),
];

/// Outbound side of the page engine.
pub trait ShieldObserver {
    /// Post a message to the content side.
    fn post_message(&self, envelope: &Envelope);

    /// Property interception is engaged. Called once.
    fn on_ready(&self) {}
}

/// An observer call waiting for delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Message(Envelope),
    Ready,
}

/// Holds observer calls until [`QueuedObserver::flush`].
///
/// Hosts that keep the engine behind a borrow flush after releasing it, so
/// callbacks are free to call back into the engine.
pub struct QueuedObserver {
    inner: Rc<dyn ShieldObserver>,
    queue: RefCell<VecDeque<Notice>>,
}

impl QueuedObserver {
    pub fn new(inner: Rc<dyn ShieldObserver>) -> Self {
        Self {
            inner,
            queue: RefCell::new(VecDeque::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Deliver queued calls in order, including any queued while
    /// delivering. Returns how many were delivered.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(notice) = next else {
                return delivered;
            };
            match notice {
                Notice::Message(envelope) => self.inner.post_message(&envelope),
                Notice::Ready => self.inner.on_ready(),
            }
            delivered += 1;
        }
    }
}

impl ShieldObserver for QueuedObserver {
    fn post_message(&self, envelope: &Envelope) {
        self.queue.borrow_mut().push_back(Notice::Message(envelope.clone()));
    }

    fn on_ready(&self) {
        self.queue.borrow_mut().push_back(Notice::Ready);
    }
}

/// Page-scoped key/value storage.
pub trait PageStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
}

#[derive(Clone)]
pub struct Shield {
    rules: Arc<ArcSwap<CompiledRules>>,
    observer: Rc<dyn ShieldObserver>,
    engaged: Rc<Cell<bool>>,
}

impl Shield {
    pub fn new(observer: Rc<dyn ShieldObserver>) -> Self {
        Self {
            rules: Arc::new(ArcSwap::from_pointee(CompiledRules::default())),
            observer,
            engaged: Rc::new(Cell::new(false)),
        }
    }

    /// Snapshot of the current rules.
    pub fn rules(&self) -> Arc<CompiledRules> {
        self.rules.load_full()
    }

    pub fn is_rules_empty(&self) -> bool {
        self.rules.load().is_empty()
    }

    pub fn set_rules(&self, rules: CompiledRules) {
        self.rules.store(Arc::new(rules));
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.get()
    }

    /// Apply an inbound feed. A falsy payload clears the rules; a feed
    /// replaces them and engages interception.
    pub fn storage_received(&self, data: Option<&Value>, global: &mut GlobalObject) {
        let Some(data) = data.filter(|d| is_truthy(d)) else {
            log::debug!("empty feed, clearing rules");
            self.set_rules(CompiledRules::default());
            return;
        };

        match FilterFeed::from_value(data) {
            Ok(feed) => {
                self.set_rules(CompiledRules::compile(&feed));
                self.engage(global);
            }
            Err(e) => {
                log::debug!("malformed feed, clearing rules: {}", e);
                self.set_rules(CompiledRules::default());
            }
        }
    }

    /// Replay the feed cached by the content side, if readable.
    pub fn load_cached(&self, storage: &dyn PageStorage, global: &mut GlobalObject) {
        let Some(raw) = storage.get_item(CACHE_KEY) else {
            return;
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(data) => self.storage_received(Some(&data), global),
            Err(e) => log::debug!("unreadable feed cache: {}", e),
        }
    }

    /// Handle a posted message. Only `storageData` from the content side
    /// is acted upon.
    pub fn on_message(&self, message: &Value, global: &mut GlobalObject) {
        let Some(envelope) = Envelope::from_value(message) else {
            return;
        };
        if !envelope.is_from_content() || envelope.kind != MessageType::StorageData {
            return;
        }
        self.storage_received(envelope.data.as_ref(), global);
    }

    /// Trap every page hook. Returns false if already engaged.
    pub fn engage(&self, global: &mut GlobalObject) -> bool {
        if self.engaged.replace(true) {
            return false;
        }

        for &(path, kind) in PAGE_HOOKS {
            let initial = global.get(path).cloned();
            match global.intercept(path, initial.as_ref(), Some(self.hook(kind))) {
                InstallOutcome::Skipped(reason) => {
                    log::debug!("not trapping '{}': {:?}", path, reason)
                }
                outcome => log::trace!("trapped '{}': {:?}", path, outcome),
            }
        }

        self.observer.on_ready();
        true
    }

    /// Tell the content side the engine is listening.
    pub fn announce(&self) {
        self.observer.post_message(&Envelope::ready());
    }

    /// Filter a document with the rules current at call time.
    pub fn filter(&self, kind: RuleSetKind, node: &mut Value) -> FilterReport {
        let rules = self.rules.load();
        let notify = |notification: BlockNotification| {
            self.observer
                .post_message(&Envelope::player_blocked(&notification));
        };
        TreeFilter::new(&rules, kind.rule_set())
            .with_observer(&notify)
            .filter(node)
    }

    /// Filter a JSON document given as text.
    pub fn filter_json(&self, kind: RuleSetKind, text: &str) -> Result<(Value, FilterReport), FeedError> {
        let mut value: Value = serde_json::from_str(text)?;
        let report = self.filter(kind, &mut value);
        Ok((value, report))
    }

    pub fn hook(&self, kind: RuleSetKind) -> WriteHook {
        let shield = self.clone();
        Rc::new(move |value: &mut Value| {
            shield.filter(kind, value);
        })
    }

    pub fn network(&self) -> NetworkInterceptor {
        NetworkInterceptor::new(self.clone())
    }
}
