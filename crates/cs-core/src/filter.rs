//! Recursive tree filter
//!
//! Walks a JSON tree and removes entries whose channel identity matches the
//! compiled rules. Removal collapses upward: a sequence element that lost an
//! entry is spliced out, and collapsible wrapper keys whose subtree lost an
//! entry are deleted too, so no empty shelves or grids are left behind.
//!
//! The filter never fails. A node whose identity cannot be resolved is simply
//! not matched.

use serde_json::{Map, Value};

use crate::path::{is_truthy, resolve_text};
use crate::pattern::{CompiledRules, Field};
use crate::rules::{is_collapsible, FilterRuleSet, TriggerRule};
use crate::types::BlockNotification;

// =============================================================================
// Match Handling
// =============================================================================

/// Outcome of handling one matched trigger key.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchAction {
    /// Remove the trigger key from its node.
    Delete,
    /// Replace the node holding the trigger key. Not counted as a removal.
    Replace(Value),
    /// Leave the node alone.
    Skip,
}

pub type MatchHook = fn(&Map<String, Value>, &str, &MatchContext<'_>) -> MatchAction;

/// Receives block notifications raised while filtering.
pub trait BlockObserver {
    fn player_blocked(&self, notification: BlockNotification);
}

impl<F> BlockObserver for F
where
    F: Fn(BlockNotification),
{
    fn player_blocked(&self, notification: BlockNotification) {
        self(notification)
    }
}

/// What a match hook may see and do.
pub struct MatchContext<'a> {
    pub block_message: &'a str,
    observer: Option<&'a dyn BlockObserver>,
}

impl MatchContext<'_> {
    pub fn notify(&self, notification: BlockNotification) {
        if let Some(observer) = self.observer {
            observer.player_blocked(notification);
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Counters from one filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    /// Container nodes examined.
    pub visited: usize,
    /// Trigger keys, sequence elements and wrappers removed.
    pub removed: usize,
    /// Nodes rewritten by a match hook.
    pub replaced: usize,
}

impl FilterReport {
    pub fn changed(&self) -> bool {
        self.removed > 0 || self.replaced > 0
    }
}

pub struct TreeFilter<'a> {
    rules: &'a CompiledRules,
    rule_set: &'a FilterRuleSet,
    observer: Option<&'a dyn BlockObserver>,
}

impl<'a> TreeFilter<'a> {
    pub fn new(rules: &'a CompiledRules, rule_set: &'a FilterRuleSet) -> Self {
        Self {
            rules,
            rule_set,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn BlockObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Filter `node` in place.
    pub fn filter(&self, node: &mut Value) -> FilterReport {
        let mut report = FilterReport::default();
        if self.rules.is_empty() {
            return report;
        }
        self.filter_node(node, &mut report);
        log::trace!(
            "{:?} pass: visited={} removed={} replaced={}",
            self.rule_set.kind,
            report.visited,
            report.removed,
            report.replaced
        );
        report
    }

    /// Returns true if this node produced a deletion.
    fn filter_node(&self, node: &mut Value, report: &mut FilterReport) -> bool {
        match node {
            Value::Object(_) => {
                report.visited += 1;
                let mut deleted = self.apply_triggers(node, report);
                if let Value::Object(map) = node {
                    deleted |= self.filter_object_children(map, report);
                }
                deleted
            }
            Value::Array(items) => {
                report.visited += 1;
                self.filter_array_children(items, report)
            }
            _ => false,
        }
    }

    fn apply_triggers(&self, node: &mut Value, report: &mut FilterReport) -> bool {
        let matched: Vec<&TriggerRule> = match node.as_object() {
            Some(map) => self
                .rule_set
                .triggers
                .iter()
                .filter(|trigger| self.is_match(map, trigger))
                .collect(),
            None => return false,
        };

        let mut deleted = false;
        for trigger in matched {
            let Value::Object(map) = node else { break };
            let action = match trigger.on_match {
                Some(hook) => {
                    let ctx = MatchContext {
                        block_message: &self.rules.block_message,
                        observer: self.observer,
                    };
                    hook(map, trigger.key, &ctx)
                }
                None => MatchAction::Delete,
            };

            match action {
                MatchAction::Delete => {
                    log::trace!("removing {}", trigger.key);
                    map.remove(trigger.key);
                    report.removed += 1;
                    deleted = true;
                }
                MatchAction::Replace(replacement) => {
                    log::trace!("replacing node holding {}", trigger.key);
                    *node = replacement;
                    report.replaced += 1;
                    break;
                }
                MatchAction::Skip => {}
            }
        }
        deleted
    }

    fn is_match(&self, map: &Map<String, Value>, trigger: &TriggerRule) -> bool {
        let Some(subtree) = map.get(trigger.key) else {
            return false;
        };
        if !is_truthy(subtree) {
            return false;
        }

        Field::ALL.iter().any(|&field| {
            if self.rules.patterns(field).is_empty() {
                return false;
            }
            resolve_text(subtree, trigger.paths.paths(field))
                .map_or(false, |text| self.rules.matches(field, &text))
        })
    }

    fn filter_array_children(&self, items: &mut Vec<Value>, report: &mut FilterReport) -> bool {
        let mut deleted = false;
        for idx in (0..items.len()).rev() {
            if self.filter_node(&mut items[idx], report) {
                items.remove(idx);
                report.removed += 1;
                deleted = true;
            }
        }
        deleted
    }

    fn filter_object_children(&self, map: &mut Map<String, Value>, report: &mut FilterReport) -> bool {
        let mut deleted = false;
        let keys: Vec<String> = map.keys().cloned().collect();
        for key in keys.iter().rev() {
            let Some(child) = map.get_mut(key) else {
                continue;
            };
            if !self.filter_node(child, report) {
                continue;
            }

            let emptied = child.as_array().map_or(false, Vec::is_empty);
            if emptied {
                deleted = true;
            } else if is_collapsible(key) {
                map.remove(key);
                report.removed += 1;
                deleted = true;
            }
        }
        deleted
    }
}
