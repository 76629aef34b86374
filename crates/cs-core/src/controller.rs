//! Content-side overlay controller
//!
//! Holds the current blocklist snapshot, keeps the page engine supplied with
//! the matching rule feed, and drives the overlay state machine from page
//! notifications, navigation and animation frames.
//!
//! Scheduling is cooperative: methods that want a re-evaluation return
//! `true` when the host must request a frame, and the host calls
//! [`OverlayController::on_frame`] from that frame.

use std::sync::Arc;

use serde_json::Value;

use crate::config::{OverlayTimings, CACHE_KEY, DEFAULT_BLOCK_MESSAGE};
use crate::index::BlockIndex;
use crate::message::{Envelope, MessageType};
use crate::overlay::{FrameScheduler, OverlayState, OverlayStateMachine};
use crate::pattern::FilterFeed;
use crate::shield::PageStorage;
use crate::types::{ChannelIdentity, OverlayPayload, PublisherRecord};

/// Shows or hides the blocked-content cover.
pub trait OverlayRenderer {
    fn render(&self, payload: Option<&OverlayPayload>);
}

/// Posts messages to the page engine.
pub trait MessagePort {
    fn post(&self, envelope: &Envelope);
}

/// What the controller reads from the live page at evaluation time.
pub trait PageProbe {
    fn path(&self) -> String;
    /// Channel identity shown by the page. Only queried on watch and
    /// channel pages.
    fn channel(&self) -> ChannelIdentity;
}

pub struct OverlayController {
    index: Arc<BlockIndex>,
    feed: Option<FilterFeed>,
    block_message: String,
    state: OverlayState,
    machine: OverlayStateMachine,
    scheduler: FrameScheduler,
    renderer: Box<dyn OverlayRenderer>,
    port: Box<dyn MessagePort>,
    storage: Box<dyn PageStorage>,
}

impl OverlayController {
    pub fn new(
        renderer: Box<dyn OverlayRenderer>,
        port: Box<dyn MessagePort>,
        storage: Box<dyn PageStorage>,
    ) -> Self {
        Self {
            index: Arc::new(BlockIndex::default()),
            feed: None,
            block_message: DEFAULT_BLOCK_MESSAGE.to_string(),
            state: OverlayState::default(),
            machine: OverlayStateMachine::default(),
            scheduler: FrameScheduler::new(),
            renderer,
            port,
            storage,
        }
    }

    pub fn with_timings(mut self, timings: OverlayTimings) -> Self {
        self.machine = OverlayStateMachine::new(timings);
        self
    }

    pub fn with_block_message(mut self, message: &str) -> Self {
        self.block_message = message.to_string();
        self
    }

    pub fn index(&self) -> Arc<BlockIndex> {
        Arc::clone(&self.index)
    }

    pub fn feed(&self) -> Option<&FilterFeed> {
        self.feed.as_ref()
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    /// Replace the blocklist: rebuild the index and feed, cache the feed for
    /// the next page load and send it to the page.
    pub fn refresh<I>(&mut self, records: I) -> bool
    where
        I: IntoIterator<Item = PublisherRecord>,
    {
        let index = Arc::new(BlockIndex::new(records));
        let feed = index.to_feed(&self.block_message);
        log::debug!("blocklist refreshed: {} records", index.len());

        match serde_json::to_string(&feed) {
            Ok(raw) => self.storage.set_item(CACHE_KEY, &raw),
            Err(e) => log::debug!("not caching feed: {}", e),
        }

        self.index = index;
        self.feed = Some(feed);
        self.send_feed();
        self.schedule()
    }

    fn send_feed(&self) {
        if let Some(feed) = &self.feed {
            self.port.post(&Envelope::storage_data(Some(feed)));
        }
    }

    /// Handle a message posted by the page engine.
    pub fn on_page_message(&mut self, message: &Value, now: u64, path: &str) -> bool {
        let Some(envelope) = Envelope::from_value(message) else {
            return false;
        };
        if !envelope.is_from_page() {
            return false;
        }

        match envelope.kind {
            MessageType::Ready => {
                self.send_feed();
                false
            }
            MessageType::PlayerBlocked => {
                let Some(notification) = envelope.notification() else {
                    return false;
                };
                let payload = self
                    .index
                    .find(&notification.channel_id, &notification.channel_name)
                    .map(OverlayPayload::from)
                    .unwrap_or_else(|| OverlayPayload {
                        name: notification.channel_name.clone(),
                        owner: String::new(),
                    });

                let transition = self.machine.evaluate(&self.state, now, path, Some(&payload), || None);
                self.state = transition.state;
                if let Some(render) = &transition.render {
                    self.renderer.render(Some(render));
                }
                transition.schedule && self.schedule()
            }
            MessageType::StorageData => false,
        }
    }

    /// Route change, history navigation or hash change.
    pub fn on_navigation(&self) -> bool {
        self.schedule()
    }

    /// Queue a re-evaluation. True when the host must request a frame.
    pub fn schedule(&self) -> bool {
        self.scheduler.request()
    }

    /// Run the queued re-evaluation, if any.
    pub fn on_frame(&mut self, now: u64, page: &dyn PageProbe) {
        if self.scheduler.take() {
            self.update(now, page);
        }
    }

    /// Evaluate and render now.
    pub fn update(&mut self, now: u64, page: &dyn PageProbe) {
        let path = page.path();
        let index = Arc::clone(&self.index);
        let transition = self.machine.evaluate(&self.state, now, &path, None, || {
            index.find_channel(&page.channel()).map(OverlayPayload::from)
        });
        self.state = transition.state;
        self.renderer.render(transition.render.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::config::FROM_PAGE;

    #[derive(Default)]
    struct Host {
        rendered: RefCell<Vec<Option<OverlayPayload>>>,
        posted: RefCell<Vec<Envelope>>,
        stored: RefCell<HashMap<String, String>>,
        channel_queries: Cell<usize>,
    }

    struct Handle(Rc<Host>);

    impl OverlayRenderer for Handle {
        fn render(&self, payload: Option<&OverlayPayload>) {
            self.0.rendered.borrow_mut().push(payload.cloned());
        }
    }

    impl MessagePort for Handle {
        fn post(&self, envelope: &Envelope) {
            self.0.posted.borrow_mut().push(envelope.clone());
        }
    }

    impl PageStorage for Handle {
        fn get_item(&self, key: &str) -> Option<String> {
            self.0.stored.borrow().get(key).cloned()
        }

        fn set_item(&self, key: &str, value: &str) {
            self.0.stored.borrow_mut().insert(key.to_string(), value.to_string());
        }
    }

    struct Page<'a> {
        path: &'a str,
        channel: ChannelIdentity,
        host: &'a Host,
    }

    impl PageProbe for Page<'_> {
        fn path(&self) -> String {
            self.path.to_string()
        }

        fn channel(&self) -> ChannelIdentity {
            self.host.channel_queries.set(self.host.channel_queries.get() + 1);
            self.channel.clone()
        }
    }

    fn controller() -> (OverlayController, Rc<Host>) {
        let host = Rc::new(Host::default());
        let mut controller = OverlayController::new(
            Box::new(Handle(host.clone())),
            Box::new(Handle(host.clone())),
            Box::new(Handle(host.clone())),
        );
        controller.refresh(vec![PublisherRecord::new("UC1", "Blocked Chan", "Big Owner")]);
        (controller, host)
    }

    fn blocked_message(id: &str, name: &str) -> Value {
        json!({"from": FROM_PAGE, "type": "playerBlocked", "data": {"channelId": id, "channelName": name}})
    }

    #[test]
    fn refresh_caches_and_posts_feed() {
        let (controller, host) = controller();

        let cached = host.stored.borrow().get(CACHE_KEY).cloned().unwrap();
        let feed = FilterFeed::from_json(&cached).unwrap();
        assert_eq!(Some(&feed), controller.feed());
        assert_eq!(host.posted.borrow().len(), 1);
        assert_eq!(controller.index().len(), 1);
    }

    #[test]
    fn ready_reposts_feed() {
        let (mut controller, host) = controller();
        let ready = Envelope::ready().to_value();
        assert!(!controller.on_page_message(&ready, 0, "/"));
        assert_eq!(host.posted.borrow().len(), 2);
    }

    #[test]
    fn player_blocked_on_watch_renders_record() {
        let (mut controller, host) = controller();

        controller.on_page_message(&blocked_message("UC1", "whatever"), 0, "/watch");

        let expected = OverlayPayload {
            name: "Blocked Chan".into(),
            owner: "Big Owner".into(),
        };
        assert_eq!(host.rendered.borrow().last(), Some(&Some(expected)));
        assert!(controller.state().forced.is_set());
    }

    #[test]
    fn player_blocked_elsewhere_waits_for_frame() {
        let (mut controller, host) = controller();
        // Drain the refresh request.
        controller.on_frame(0, &Page { path: "/", channel: ChannelIdentity::default(), host: &host });
        host.rendered.borrow_mut().clear();

        let wants_frame = controller.on_page_message(&blocked_message("UCx", "Someone"), 0, "/results");
        assert!(wants_frame);
        assert!(host.rendered.borrow().is_empty());

        let page = Page {
            path: "/watch",
            channel: ChannelIdentity::default(),
            host: &host,
        };
        controller.on_frame(500, &page);

        let expected = OverlayPayload {
            name: "Someone".into(),
            owner: String::new(),
        };
        assert_eq!(host.rendered.borrow().as_slice(), &[Some(expected)]);
    }

    #[test]
    fn navigation_is_debounced() {
        let (mut controller, host) = controller();
        assert!(!controller.on_navigation());

        let page = Page {
            path: "/@blocked",
            channel: ChannelIdentity::new("UC1", ""),
            host: &host,
        };
        controller.on_frame(0, &page);
        controller.on_frame(1, &page);

        assert_eq!(host.rendered.borrow().len(), 1);
        assert_eq!(host.channel_queries.get(), 1);
        assert_eq!(host.rendered.borrow()[0].as_ref().unwrap().owner, "Big Owner");
    }

    #[test]
    fn channel_identity_not_read_off_channel_pages() {
        let (mut controller, host) = controller();
        let page = Page {
            path: "/results",
            channel: ChannelIdentity::new("UC1", ""),
            host: &host,
        };
        controller.update(0, &page);
        assert_eq!(host.channel_queries.get(), 0);
        assert_eq!(host.rendered.borrow().as_slice(), &[None]);
    }

    #[test]
    fn foreign_messages_are_ignored() {
        let (mut controller, host) = controller();
        let message = json!({"from": "ELSEWHERE", "type": "ready"});
        controller.on_page_message(&message, 0, "/");
        assert_eq!(host.posted.borrow().len(), 1);
    }
}
