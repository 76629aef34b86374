//! Live property interception on a shared global object
//!
//! [`GlobalObject`] models the host page's global scope: a JSON data tree
//! plus a table of property slots keyed by dotted path. A slot records
//! whether the property may be redefined and which accessor observers the
//! host attached to it. A [`PropertyInterceptor`] registered on a slot sees
//! every write before the value lands, and keeps calling the observers the
//! slot had before interception.
//!
//! Intermediate objects that do not exist yet are handled by deferring: the
//! missing segment is trapped and, once the host assigns an object there, the
//! rest of the path is installed against that object.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

/// Runs on every intercepted write, before the value is stored.
pub type WriteHook = Rc<dyn Fn(&mut Value)>;

/// Side effects the host attached to a property's reads and writes.
#[derive(Clone, Default)]
pub struct Accessor {
    pub get: Option<Rc<dyn Fn()>>,
    pub set: Option<Rc<dyn Fn(&Value)>>,
}

impl Accessor {
    pub fn is_empty(&self) -> bool {
        self.get.is_none() && self.set.is_none()
    }

    fn on_get(&self) {
        if let Some(get) = &self.get {
            get();
        }
    }

    fn on_set(&self, value: &Value) {
        if let Some(set) = &self.set {
            set(value);
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Empty property path")]
    EmptyPath,
    #[error("Cannot set '{0}': parent is not an object")]
    MissingParent(String),
    #[error("Property '{0}' is not configurable")]
    NonConfigurable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The terminal property is trapped.
    Installed,
    /// A missing intermediate segment is trapped until an object arrives.
    Deferred,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NonConfigurable,
    /// The current value's type differs from the expected initial value.
    TypeMismatch,
    AlreadyIntercepted,
    InvalidPath,
}

/// Host-side `typeof`, with null treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTag {
    Object,
    String,
    Number,
    Boolean,
}

fn type_tag(value: &Value) -> Option<TypeTag> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(TypeTag::Boolean),
        Value::Number(_) => Some(TypeTag::Number),
        Value::String(_) => Some(TypeTag::String),
        Value::Array(_) | Value::Object(_) => Some(TypeTag::Object),
    }
}

fn mismatched(original: Option<TypeTag>, value: Option<&Value>) -> bool {
    match (original, value.and_then(type_tag)) {
        (Some(expected), Some(actual)) => expected != actual,
        _ => false,
    }
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

// =============================================================================
// Interceptor
// =============================================================================

#[derive(Debug)]
enum Mode {
    Terminal { original: Option<TypeTag>, aborted: bool },
    Deferred { rest: String },
}

pub struct PropertyInterceptor {
    path: String,
    mode: Mode,
    on_write: Option<WriteHook>,
    preserved: Accessor,
}

impl PropertyInterceptor {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// False once a type-mismatched write disengaged the trap.
    pub fn is_engaged(&self) -> bool {
        !matches!(self.mode, Mode::Terminal { aborted: true, .. })
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.mode, Mode::Deferred { .. })
    }

    /// Did the slot carry host accessors that this trap keeps invoking?
    pub fn preserves_accessor(&self) -> bool {
        !self.preserved.is_empty()
    }
}

impl fmt::Debug for PropertyInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInterceptor")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("on_write", &self.on_write.is_some())
            .field("preserved", &self.preserved)
            .finish()
    }
}

struct Slot {
    configurable: bool,
    accessor: Accessor,
    interceptor: Option<PropertyInterceptor>,
}

impl Slot {
    fn observers(&self) -> &Accessor {
        match &self.interceptor {
            Some(interceptor) => &interceptor.preserved,
            None => &self.accessor,
        }
    }
}

/// Options for a host-defined property.
#[derive(Debug, Clone, Default)]
pub struct PropertyOptions {
    pub configurable: bool,
    pub accessor: Accessor,
}

// =============================================================================
// Global Object
// =============================================================================

pub struct GlobalObject {
    root: Value,
    slots: HashMap<String, Slot>,
}

impl Default for GlobalObject {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalObject {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
            slots: HashMap::new(),
        }
    }

    /// Start from an existing data tree. Non-object roots give an empty scope.
    pub fn from_value(root: Value) -> Self {
        match root {
            Value::Object(_) => Self {
                root,
                slots: HashMap::new(),
            },
            _ => Self::new(),
        }
    }

    /// Read a property, running the read observers of every slot on the way.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut node = &self.root;
        let mut end = 0;
        for segment in path.split('.') {
            end += segment.len();
            if let Some(slot) = self.slots.get(&path[..end]) {
                slot.observers().on_get();
            }
            node = child(node, segment)?;
            end += 1;
        }
        Some(node)
    }

    /// Assign a property the way host code would.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), WriteError> {
        let (parent_path, key) = split_last(path).ok_or(WriteError::EmptyPath)?;
        if !self.peek_path(parent_path).map_or(false, Value::is_object) {
            return Err(WriteError::MissingParent(path.to_string()));
        }

        let mut value = value;
        let mut reapply = None;
        if let Some(slot) = self.slots.get_mut(path) {
            match slot.interceptor.as_mut() {
                Some(interceptor) => {
                    interceptor.preserved.on_set(&value);
                    let hook = interceptor.on_write.clone();
                    match &mut interceptor.mode {
                        Mode::Terminal { aborted: true, .. } => {}
                        Mode::Terminal { original, aborted } => match hook {
                            Some(hook) => hook(&mut value),
                            None => {
                                if mismatched(*original, Some(&value)) {
                                    log::debug!("type mismatch on '{}', releasing trap", path);
                                    *aborted = true;
                                }
                            }
                        },
                        Mode::Deferred { rest } => {
                            if is_container(&value) {
                                reapply = Some((rest.clone(), hook));
                            }
                        }
                    }
                }
                None => slot.accessor.on_set(&value),
            }
        }

        self.forget_below(path);
        if let Some(Value::Object(parent)) = self.peek_path_mut(parent_path) {
            parent.insert(key.to_string(), value);
        }

        if let Some((rest, hook)) = reapply {
            let outcome = self.install_chain(path, &rest, None, hook);
            log::debug!("re-applied '{}' below '{}': {:?}", rest, path, outcome);
        }
        Ok(())
    }

    /// Define a property with explicit attributes, replacing any trap on it.
    pub fn define_property(
        &mut self,
        path: &str,
        value: Value,
        options: PropertyOptions,
    ) -> Result<(), WriteError> {
        let (parent_path, key) = split_last(path).ok_or(WriteError::EmptyPath)?;
        if self.slots.get(path).map_or(false, |slot| !slot.configurable) {
            return Err(WriteError::NonConfigurable(path.to_string()));
        }
        let Some(Value::Object(parent)) = self.peek_path_mut(parent_path) else {
            return Err(WriteError::MissingParent(path.to_string()));
        };
        parent.insert(key.to_string(), value);

        self.forget_below(path);
        self.slots.insert(
            path.to_string(),
            Slot {
                configurable: options.configurable,
                accessor: options.accessor,
                interceptor: None,
            },
        );
        Ok(())
    }

    /// Register an interceptor on `path`.
    ///
    /// `initial` is the value the caller expects to find there; when the
    /// property already holds a value of a different type, nothing is
    /// installed. Without `on_write`, writes of the initial type are trapped
    /// and the first write of another type releases the trap for good.
    pub fn intercept(
        &mut self,
        path: &str,
        initial: Option<&Value>,
        on_write: Option<WriteHook>,
    ) -> InstallOutcome {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return InstallOutcome::Skipped(SkipReason::InvalidPath);
        }
        let original = initial.and_then(type_tag);
        self.install_chain("", path, original, on_write)
    }

    /// False once `path` was defined non-configurable.
    pub fn is_configurable(&self, path: &str) -> bool {
        self.slots.get(path).map_or(true, |slot| slot.configurable)
    }

    pub fn interceptor(&self, path: &str) -> Option<&PropertyInterceptor> {
        self.slots.get(path)?.interceptor.as_ref()
    }

    /// True while a terminal trap on `path` is engaged.
    pub fn is_intercepted(&self, path: &str) -> bool {
        self.interceptor(path)
            .map_or(false, |i| !i.is_deferred() && i.is_engaged())
    }

    fn install_chain(
        &mut self,
        base: &str,
        chain: &str,
        original: Option<TypeTag>,
        on_write: Option<WriteHook>,
    ) -> InstallOutcome {
        let (head, rest) = match chain.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (chain, None),
        };
        let full = join(base, head);

        match rest {
            None => {
                if mismatched(original, self.peek_path(&full)) {
                    return InstallOutcome::Skipped(SkipReason::TypeMismatch);
                }
                let mode = Mode::Terminal {
                    original,
                    aborted: false,
                };
                let outcome = self.trap(&full, mode, on_write.clone());
                if outcome == InstallOutcome::Installed {
                    if let (Some(hook), Some(current)) = (on_write, self.peek_path_mut(&full)) {
                        if is_container(current) {
                            hook(current);
                        }
                    }
                }
                outcome
            }
            Some(rest) => {
                if self.peek_path(&full).map_or(false, is_container) {
                    return self.install_chain(&full, rest, original, on_write);
                }
                let mode = Mode::Deferred {
                    rest: rest.to_string(),
                };
                match self.trap(&full, mode, on_write) {
                    InstallOutcome::Installed => InstallOutcome::Deferred,
                    other => other,
                }
            }
        }
    }

    fn trap(&mut self, path: &str, mode: Mode, on_write: Option<WriteHook>) -> InstallOutcome {
        let preserved = match self.slots.get(path) {
            Some(slot) if !slot.configurable => {
                log::debug!("'{}' is not configurable, not intercepting", path);
                return InstallOutcome::Skipped(SkipReason::NonConfigurable);
            }
            Some(slot) if slot.interceptor.is_some() => {
                return InstallOutcome::Skipped(SkipReason::AlreadyIntercepted);
            }
            Some(slot) => slot.accessor.clone(),
            None => Accessor::default(),
        };

        self.slots.insert(
            path.to_string(),
            Slot {
                configurable: true,
                accessor: Accessor::default(),
                interceptor: Some(PropertyInterceptor {
                    path: path.to_string(),
                    mode,
                    on_write,
                    preserved,
                }),
            },
        );
        InstallOutcome::Installed
    }

    /// Slots below `path` belonged to the object being replaced.
    fn forget_below(&mut self, path: &str) {
        let prefix = format!("{path}.");
        self.slots.retain(|key, _| !key.starts_with(&prefix));
    }

    fn peek_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split('.').try_fold(&self.root, |node, segment| child(node, segment))
    }

    fn peek_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        if path.is_empty() {
            return Some(&mut self.root);
        }
        path.split('.')
            .try_fold(&mut self.root, |node, segment| child_mut(node, segment))
    }
}

fn child<'v>(node: &'v Value, segment: &str) -> Option<&'v Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn child_mut<'v>(node: &'v mut Value, segment: &str) -> Option<&'v mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn split_last(path: &str) -> Option<(&str, &str)> {
    if path.is_empty() {
        return None;
    }
    Some(match path.rsplit_once('.') {
        Some((parent, key)) => (parent, key),
        None => ("", path),
    })
}

fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use serde_json::json;

    use super::*;

    fn marking_hook(count: Rc<Cell<usize>>) -> WriteHook {
        Rc::new(move |value: &mut Value| {
            count.set(count.get() + 1);
            if let Some(map) = value.as_object_mut() {
                map.insert("filtered".into(), json!(true));
            }
        })
    }

    #[test]
    fn hook_runs_on_existing_value_and_every_write() {
        let mut global = GlobalObject::from_value(json!({"ytInitialData": {"a": 1}}));
        let count = Rc::new(Cell::new(0));
        let initial = global.get("ytInitialData").cloned();

        let outcome = global.intercept("ytInitialData", initial.as_ref(), Some(marking_hook(count.clone())));

        assert_eq!(outcome, InstallOutcome::Installed);
        assert_eq!(count.get(), 1);
        assert_eq!(global.get("ytInitialData"), Some(&json!({"a": 1, "filtered": true})));

        global.set("ytInitialData", json!({"b": 2})).unwrap();
        assert_eq!(count.get(), 2);
        assert_eq!(global.get("ytInitialData"), Some(&json!({"b": 2, "filtered": true})));
        assert!(global.is_intercepted("ytInitialData"));
    }

    #[test]
    fn mismatched_write_releases_trap_for_good() {
        let mut global = GlobalObject::from_value(json!({"flag": true}));
        let initial = json!(true);
        assert_eq!(global.intercept("flag", Some(&initial), None), InstallOutcome::Installed);

        global.set("flag", json!(false)).unwrap();
        assert!(global.is_intercepted("flag"));
        assert_eq!(global.get("flag"), Some(&json!(false)));

        global.set("flag", json!("raw")).unwrap();
        assert!(!global.is_intercepted("flag"));
        assert_eq!(global.get("flag"), Some(&json!("raw")));

        global.set("flag", json!(true)).unwrap();
        assert!(!global.is_intercepted("flag"));
        assert_eq!(global.get("flag"), Some(&json!(true)));
    }

    #[test]
    fn null_writes_do_not_release_trap() {
        let mut global = GlobalObject::from_value(json!({"count": 1}));
        global.intercept("count", Some(&json!(1)), None);
        global.set("count", Value::Null).unwrap();
        assert!(global.is_intercepted("count"));
    }

    #[test]
    fn current_value_of_other_type_skips_install() {
        let mut global = GlobalObject::from_value(json!({"x": "text"}));
        assert_eq!(
            global.intercept("x", Some(&json!(1)), None),
            InstallOutcome::Skipped(SkipReason::TypeMismatch)
        );
        assert!(global.interceptor("x").is_none());
    }

    #[test]
    fn non_configurable_property_is_skipped() {
        let mut global = GlobalObject::new();
        global
            .define_property("locked", json!({}), PropertyOptions::default())
            .unwrap();

        let outcome = global.intercept("locked", None, None);

        assert_eq!(outcome, InstallOutcome::Skipped(SkipReason::NonConfigurable));
        assert!(matches!(
            global.define_property("locked", json!(1), PropertyOptions::default()),
            Err(WriteError::NonConfigurable(_))
        ));
    }

    #[test]
    fn existing_accessor_keeps_running() {
        let reads = Rc::new(Cell::new(0));
        let writes = Rc::new(RefCell::new(Vec::new()));
        let on_get: Rc<dyn Fn()> = {
            let reads = reads.clone();
            Rc::new(move || reads.set(reads.get() + 1))
        };
        let on_set: Rc<dyn Fn(&Value)> = {
            let writes = writes.clone();
            Rc::new(move |v: &Value| writes.borrow_mut().push(v.clone()))
        };
        let accessor = Accessor {
            get: Some(on_get),
            set: Some(on_set),
        };
        let mut global = GlobalObject::new();
        global
            .define_property("cfg", json!({}), PropertyOptions { configurable: true, accessor })
            .unwrap();

        let count = Rc::new(Cell::new(0));
        global.intercept("cfg", None, Some(marking_hook(count.clone())));
        assert!(global.interceptor("cfg").unwrap().preserves_accessor());

        global.set("cfg", json!({"k": 1})).unwrap();
        let _ = global.get("cfg");

        assert_eq!(writes.borrow().as_slice(), &[json!({"k": 1})]);
        assert_eq!(reads.get(), 1);
        assert_eq!(count.get(), 2);
        assert_eq!(global.get("cfg"), Some(&json!({"k": 1, "filtered": true})));
    }

    #[test]
    fn missing_intermediate_defers_until_object_arrives() {
        let mut global = GlobalObject::new();
        let count = Rc::new(Cell::new(0));

        let outcome = global.intercept("ytplayer.config", None, Some(marking_hook(count.clone())));
        assert_eq!(outcome, InstallOutcome::Deferred);
        assert!(global.interceptor("ytplayer").unwrap().is_deferred());

        global.set("ytplayer", json!(5)).unwrap();
        assert!(global.interceptor("ytplayer.config").is_none());

        global.set("ytplayer", json!({"config": {"args": {}}})).unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(
            global.get("ytplayer.config"),
            Some(&json!({"args": {}, "filtered": true}))
        );
        assert!(global.is_intercepted("ytplayer.config"));

        global.set("ytplayer.config", json!({"fresh": 1})).unwrap();
        assert_eq!(count.get(), 2);
        assert_eq!(global.get("ytplayer.config"), Some(&json!({"fresh": 1, "filtered": true})));
    }

    #[test]
    fn existing_intermediate_is_traversed() {
        let mut global = GlobalObject::from_value(json!({"yt": {}}));
        let outcome = global.intercept("yt.config_", None, None);
        assert_eq!(outcome, InstallOutcome::Installed);
        assert!(global.interceptor("yt").is_none());

        // Replacing the owner object drops traps that lived on it.
        global.set("yt", json!({"config_": {}})).unwrap();
        assert!(!global.is_intercepted("yt.config_"));
    }

    #[test]
    fn writes_need_an_object_parent() {
        let mut global = GlobalObject::new();
        assert!(matches!(global.set("a.b", json!(1)), Err(WriteError::MissingParent(_))));
        assert!(matches!(global.set("", json!(1)), Err(WriteError::EmptyPath)));
        assert_eq!(
            global.intercept("a..b", None, None),
            InstallOutcome::Skipped(SkipReason::InvalidPath)
        );
    }

    #[test]
    fn second_interceptor_on_same_path_is_refused() {
        let mut global = GlobalObject::new();
        assert_eq!(global.intercept("x", None, None), InstallOutcome::Installed);
        assert_eq!(
            global.intercept("x", None, None),
            InstallOutcome::Skipped(SkipReason::AlreadyIntercepted)
        );
    }
}
