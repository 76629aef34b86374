//! Network response interception
//!
//! Responses from a fixed set of API routes are parsed, filtered with the
//! route's rule set and re-serialized before the page sees them. Every
//! failure along the way hands back the original response untouched.
//!
//! Two request surfaces are covered: the promise-style [`Fetch`] call,
//! wrapped by [`InterceptedFetch`], and the event-driven [`TrackedRequest`].

use std::future::Future;

use serde_json::Value;

use crate::config::API_PREFIX;
use crate::intercept::{GlobalObject, InstallOutcome, SkipReason};
use crate::rules::RuleSetKind;
use crate::shield::Shield;
use crate::url::extract_path;

/// Page global holding the promise-style request call.
pub const FETCH_SURFACE: &str = "fetch";
/// Page global holding the event-driven request constructor.
pub const EVENT_SURFACE: &str = "XMLHttpRequest";

/// Intercepted routes below [`API_PREFIX`], matched exactly.
pub const ROUTES: &[(&str, RuleSetKind)] = &[
    ("/search", RuleSetKind::Main),
    ("/browse", RuleSetKind::Main),
    ("/next", RuleSetKind::Main),
    ("/guide", RuleSetKind::Guide),
    ("/player", RuleSetKind::Player),
];

/// Rule set for a request URL, if its path is an intercepted route.
pub fn route_for(url: &str) -> Option<RuleSetKind> {
    let route = extract_path(url).strip_prefix(API_PREFIX)?;
    ROUTES
        .iter()
        .find(|(suffix, _)| *suffix == route)
        .map(|&(_, kind)| kind)
}

// =============================================================================
// Request / Response
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn get(url: &str) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
            body: None,
        }
    }

    pub fn post(url: &str, body: Vec<u8>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.to_string(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    /// Header names keep their original case; lookups ignore it.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .map_or(false, |ct| ct.to_ascii_lowercase().contains("json"))
    }
}

// =============================================================================
// Interceptor
// =============================================================================

#[derive(Clone)]
pub struct NetworkInterceptor {
    shield: Shield,
}

impl NetworkInterceptor {
    pub fn new(shield: Shield) -> Self {
        Self { shield }
    }

    /// Rule set to apply to `url`, or `None` when the response passes through.
    pub fn should_process(&self, url: &str) -> Option<RuleSetKind> {
        if self.shield.is_rules_empty() {
            return None;
        }
        route_for(url)
    }

    /// Filter a JSON body. `None` means leave the original as it is.
    pub fn rewrite_body(&self, kind: RuleSetKind, body: &[u8]) -> Option<Vec<u8>> {
        let mut value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("passing through unparsable {} body: {}", kind.as_str(), e);
                return None;
            }
        };
        let report = self.shield.filter(kind, &mut value);
        if !report.changed() {
            return None;
        }
        serde_json::to_vec(&value).ok()
    }

    /// Filter a fetched response. Anything that is not a successful rewrite
    /// returns `response` unmodified.
    pub fn process_response(&self, url: &str, response: Response) -> Response {
        let Some(kind) = self.should_process(url) else {
            return response;
        };
        if !response.is_json() {
            log::trace!("{}: not JSON, passing through", url);
            return response;
        }

        match self.rewrite_body(kind, &response.body) {
            Some(body) => {
                let mut response = response;
                response.body = body;
                response.remove_header("content-length");
                response
            }
            None => response,
        }
    }

    /// Filter a response body received as text.
    pub fn process_text(&self, url: &str, text: &str) -> Option<String> {
        let kind = self.should_process(url)?;
        if text.is_empty() {
            return None;
        }
        let body = self.rewrite_body(kind, text.as_bytes())?;
        String::from_utf8(body).ok()
    }

    /// Whether the request surface at `surface` can be replaced. A surface
    /// the page locked as non-configurable is left alone.
    pub fn surface_outcome(global: &GlobalObject, surface: &str) -> InstallOutcome {
        if global.is_configurable(surface) {
            InstallOutcome::Installed
        } else {
            log::debug!("'{}' is not configurable, not intercepting requests", surface);
            InstallOutcome::Skipped(SkipReason::NonConfigurable)
        }
    }

    /// Wrap the page's fetch call. A locked surface hands `inner` back
    /// unwrapped.
    pub fn install<F: Fetch>(&self, global: &GlobalObject, inner: F) -> Result<InterceptedFetch<F>, F> {
        match Self::surface_outcome(global, FETCH_SURFACE) {
            InstallOutcome::Installed => Ok(self.wrap(inner)),
            _ => Err(inner),
        }
    }

    /// A new tracked request, or `None` when the event surface is locked.
    pub fn track(&self, global: &GlobalObject) -> Option<TrackedRequest> {
        match Self::surface_outcome(global, EVENT_SURFACE) {
            InstallOutcome::Installed => Some(TrackedRequest::new(self.clone())),
            _ => None,
        }
    }

    pub fn wrap<F: Fetch>(&self, inner: F) -> InterceptedFetch<F> {
        InterceptedFetch {
            inner,
            interceptor: self.clone(),
        }
    }
}

// =============================================================================
// Promise Surface
// =============================================================================

/// The page's promise-based request call.
pub trait Fetch {
    type Error;

    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response, Self::Error>>;
}

/// A [`Fetch`] whose responses are filtered on the way back.
pub struct InterceptedFetch<F> {
    inner: F,
    interceptor: NetworkInterceptor,
}

impl<F> InterceptedFetch<F> {
    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: Fetch> Fetch for InterceptedFetch<F> {
    type Error = F::Error;

    async fn fetch(&self, request: &Request) -> Result<Response, Self::Error> {
        let response = self.inner.fetch(request).await?;
        Ok(self.interceptor.process_response(&request.url, response))
    }
}

// =============================================================================
// Event Surface
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

/// Declared response type of an event-driven request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    #[default]
    Default,
    Text,
    Json,
    ArrayBuffer,
    Blob,
    Document,
}

impl ResponseType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "text" => Self::Text,
            "json" => Self::Json,
            "arraybuffer" => Self::ArrayBuffer,
            "blob" => Self::Blob,
            "document" => Self::Document,
            _ => Self::Default,
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(self, Self::Default | Self::Text)
    }
}

/// An event-driven request. The URL is captured at open time; once the
/// request completes successfully its response text is replaced by the
/// filtered text.
pub struct TrackedRequest {
    interceptor: NetworkInterceptor,
    url: String,
    ready_state: ReadyState,
    status: u16,
    response_type: ResponseType,
    response_text: String,
    replaced: Option<String>,
}

impl TrackedRequest {
    pub fn new(interceptor: NetworkInterceptor) -> Self {
        Self {
            interceptor,
            url: String::new(),
            ready_state: ReadyState::Unsent,
            status: 0,
            response_type: ResponseType::Default,
            response_text: String::new(),
            replaced: None,
        }
    }

    pub fn open(&mut self, _method: &str, url: &str) {
        self.url = url.to_string();
        self.ready_state = ReadyState::Opened;
        self.replaced = None;
    }

    pub fn set_response_type(&mut self, response_type: ResponseType) {
        self.response_type = response_type;
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Feed a ready-state change from the underlying request.
    pub fn on_ready_state_change(&mut self, state: ReadyState, status: u16, text: &str) {
        self.ready_state = state;
        self.status = status;
        self.response_text = text.to_string();

        if state != ReadyState::Done || !(200..300).contains(&status) || !self.response_type.is_textual() {
            return;
        }
        self.replaced = self.interceptor.process_text(&self.url, &self.response_text);
    }

    /// Response text as the page reads it.
    pub fn response_text(&self) -> &str {
        self.replaced.as_deref().unwrap_or(&self.response_text)
    }

    pub fn is_rewritten(&self) -> bool {
        self.replaced.is_some()
    }
}
