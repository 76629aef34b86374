//! WebAssembly bindings for ChannelShield
//!
//! The page-side shim forwards property assignments, messages and API
//! responses into the engine held here, and hands the filtered results back
//! to the page.

use std::cell::RefCell;
use std::rc::Rc;

use cs_core::{
    intercept::PropertyOptions,
    overlay::OverlayState,
    rules::RuleSetKind,
    Envelope, GlobalObject, InstallOutcome, NetworkInterceptor, OverlayPayload, OverlayStateMachine,
    QueuedObserver, Shield, ShieldObserver,
};
use serde_json::Value;
use wasm_bindgen::prelude::*;

struct PageState {
    shield: Shield,
    global: GlobalObject,
}

thread_local! {
    static PAGE_STATE: RefCell<Option<PageState>> = const { RefCell::new(None) };
    static OUTBOX: RefCell<Option<Rc<QueuedObserver>>> = const { RefCell::new(None) };
}

struct JsObserver {
    post_message: js_sys::Function,
    on_ready: Option<js_sys::Function>,
}

impl ShieldObserver for JsObserver {
    fn post_message(&self, envelope: &Envelope) {
        let message = match to_js(&envelope.to_value()) {
            Ok(message) => message,
            Err(e) => return report("Failed to encode message", &e),
        };
        if let Err(e) = self.post_message.call1(&JsValue::NULL, &message) {
            report("postMessage callback failed", &e);
        }
    }

    fn on_ready(&self) {
        if let Some(callback) = &self.on_ready {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                report("ready callback failed", &e);
            }
        }
    }
}

fn report(context: &str, error: &JsValue) {
    web_sys::console::warn_2(&JsValue::from_str(&format!("[channelshield] {context}")), error);
}

fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

fn parse_json(text: &str) -> Result<Value, JsValue> {
    serde_json::from_str(text).map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))
}

/// Run `f` against the engine, then deliver the callbacks it queued.
///
/// Returns `None` when uninitialized or when called from inside another
/// engine call.
fn with_state<T>(f: impl FnOnce(&mut PageState) -> T) -> Option<T> {
    let result = PAGE_STATE.with(|cell| {
        let mut state = cell.try_borrow_mut().ok()?;
        state.as_mut().map(f)
    });
    deliver();
    result
}

/// Flush queued observer calls. Runs with no engine borrow held.
fn deliver() {
    let Some(outbox) = OUTBOX.with(|cell| cell.try_borrow().ok().and_then(|o| o.clone())) else {
        return;
    };
    outbox.flush();
}

/// Start the engine and announce it to the content side.
#[wasm_bindgen]
pub fn init(post_message: js_sys::Function, on_ready: Option<js_sys::Function>) -> Result<(), JsValue> {
    if is_initialized() {
        return Err(JsValue::from_str("Already initialized. Reload the page to reinitialize."));
    }

    let outbox = Rc::new(QueuedObserver::new(Rc::new(JsObserver { post_message, on_ready })));
    let shield = Shield::new(outbox.clone());
    OUTBOX.with(|cell| *cell.borrow_mut() = Some(outbox));
    PAGE_STATE.with(|cell| {
        *cell.borrow_mut() = Some(PageState {
            shield: shield.clone(),
            global: GlobalObject::new(),
        });
    });

    shield.announce();
    deliver();
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    // A busy engine is an initialized one.
    PAGE_STATE.with(|cell| cell.try_borrow().map_or(true, |state| state.is_some()))
}

/// Apply a feed received from the content side or the page cache.
#[wasm_bindgen]
pub fn receive_storage(json: &str) -> Result<(), JsValue> {
    let data = parse_json(json)?;
    with_state(|state| state.shield.storage_received(Some(&data), &mut state.global))
        .ok_or_else(|| JsValue::from_str("Not initialized or engine busy"))
}

/// Handle a raw posted message.
#[wasm_bindgen]
pub fn receive_message(json: &str) {
    let Ok(message) = serde_json::from_str::<Value>(json) else {
        return;
    };
    with_state(|state| state.shield.on_message(&message, &mut state.global));
}

#[wasm_bindgen]
pub fn is_rules_empty() -> bool {
    with_state(|state| state.shield.is_rules_empty()).unwrap_or(true)
}

/// Route a page assignment to `path` through the interceptors and return
/// the value as stored.
#[wasm_bindgen]
pub fn assign_global(path: &str, json: &str) -> Result<String, JsValue> {
    let value = parse_json(json)?;
    with_state(|state| {
        state
            .global
            .set(path, value)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(state
            .global
            .get(path)
            .map(Value::to_string)
            .unwrap_or_else(|| "null".to_string()))
    })
    .unwrap_or_else(|| Err(JsValue::from_str("Not initialized or engine busy")))
}

#[wasm_bindgen]
pub fn filter_json(set: &str, json: &str) -> Result<String, JsValue> {
    let kind = RuleSetKind::from_str(set).ok_or_else(|| JsValue::from_str(&format!("Unknown rule set: {}", set)))?;
    let mut value = parse_json(json)?;
    with_state(|state| state.shield.filter(kind, &mut value));
    Ok(value.to_string())
}

#[wasm_bindgen]
pub fn should_process(url: &str) -> bool {
    with_state(|state| state.shield.network().should_process(url).is_some()).unwrap_or(false)
}

/// Whether the page's request surface at `surface` may be replaced.
#[wasm_bindgen]
pub fn can_intercept(surface: &str) -> bool {
    with_state(|state| {
        NetworkInterceptor::surface_outcome(&state.global, surface) == InstallOutcome::Installed
    })
    .unwrap_or(false)
}

/// Record that the page locked `path` as a non-configurable native property.
#[wasm_bindgen]
pub fn lock_global(path: &str) -> Result<(), JsValue> {
    with_state(|state| {
        state
            .global
            .define_property(path, Value::Null, PropertyOptions::default())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    })
    .unwrap_or_else(|| Err(JsValue::from_str("Not initialized or engine busy")))
}

/// Filtered body for a fetched response, or `undefined` to keep the original.
#[wasm_bindgen]
pub fn process_response(url: &str, content_type: &str, body: &[u8]) -> Option<Vec<u8>> {
    with_state(|state| {
        let network = state.shield.network();
        let response = cs_core::Response::new(200, body).with_header("content-type", content_type);
        let processed = network.process_response(url, response);
        (processed.body != body).then_some(processed.body)
    })
    .flatten()
}

/// Filtered response text for an event-driven request, or `undefined`.
#[wasm_bindgen]
pub fn process_text(url: &str, text: &str) -> Option<String> {
    with_state(|state| state.shield.network().process_text(url, text)).flatten()
}

/// Run one overlay evaluation. Returns `{state, render, schedule}`.
#[wasm_bindgen]
pub fn evaluate_overlay(
    state: &str,
    now: f64,
    path: &str,
    event: Option<String>,
    fallback: Option<String>,
) -> Result<JsValue, JsValue> {
    let current: OverlayState = if state.is_empty() {
        OverlayState::default()
    } else {
        serde_json::from_str(state).map_err(|e| JsValue::from_str(&format!("Invalid overlay state: {}", e)))?
    };
    let parse_payload = |text: Option<String>| -> Result<Option<OverlayPayload>, JsValue> {
        match text {
            Some(text) if !text.is_empty() => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| JsValue::from_str(&format!("Invalid payload: {}", e))),
            _ => Ok(None),
        }
    };
    let event = parse_payload(event)?;
    let fallback = parse_payload(fallback)?;

    let transition = OverlayStateMachine::default().evaluate(&current, now.max(0.0) as u64, path, event.as_ref(), || fallback);

    let encode = |value: Result<Value, serde_json::Error>| -> Result<JsValue, JsValue> {
        let value = value.map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&value)
    };
    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"state".into(), &encode(serde_json::to_value(&transition.state))?);
    let _ = js_sys::Reflect::set(&js_result, &"render".into(), &encode(serde_json::to_value(&transition.render))?);
    let _ = js_sys::Reflect::set(&js_result, &"schedule".into(), &JsValue::from(transition.schedule));

    Ok(js_result.into())
}
