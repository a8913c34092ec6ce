//! Change event router
//!
//! Holds one open feed per [`TopicBinding`] and yields the binding of every
//! event that arrives, payload unread. It does not batch or deduplicate;
//! that is the coalescer's job.

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_stream::StreamMap;
use tracing::{debug, warn};

use super::controller::ControllerCounters;
use crate::bus::{ChangeBus, TopicBinding};

enum FeedItem {
    Changed,
    Ended,
}

pub struct ChangeEventRouter {
    bus: Arc<dyn ChangeBus>,
    feeds: StreamMap<TopicBinding, BoxStream<'static, FeedItem>>,
    counters: Arc<ControllerCounters>,
}

impl ChangeEventRouter {
    pub fn new(bus: Arc<dyn ChangeBus>, counters: Arc<ControllerCounters>) -> Self {
        Self {
            bus,
            feeds: StreamMap::new(),
            counters,
        }
    }

    /// Open a feed for each binding not already open.
    ///
    /// A binding that fails to open is logged and skipped; the rest still open.
    /// Returns how many feeds were opened.
    pub async fn open_all(&mut self, bindings: &[TopicBinding]) -> usize {
        let mut opened = 0;
        for binding in bindings {
            if self.open(binding).await {
                opened += 1;
            }
        }
        opened
    }

    /// Open one feed. Returns false if it was already open or failed.
    pub async fn open(&mut self, binding: &TopicBinding) -> bool {
        if self.feeds.contains_key(binding) {
            return false;
        }

        match self.bus.subscribe(binding).await {
            Ok(feed) => {
                let feed = feed
                    .map(|_event| FeedItem::Changed)
                    .chain(stream::once(async { FeedItem::Ended }))
                    .boxed();
                self.feeds.insert(binding.clone(), feed);
                debug!(binding = %binding, bus = self.bus.name(), "Subscription opened");
                true
            }
            Err(e) => {
                self.counters
                    .subscribe_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!(binding = %binding, error = %e, "Failed to open subscription");
                false
            }
        }
    }

    /// Close one feed. Dropping the feed unsubscribes before this returns.
    pub fn close(&mut self, binding: &TopicBinding) -> bool {
        let closed = self.feeds.remove(binding).is_some();
        if closed {
            debug!(binding = %binding, "Subscription closed");
        }
        closed
    }

    /// Close every feed. Idempotent. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let count = self.feeds.len();
        self.feeds.clear();
        count
    }

    pub fn is_open(&self, binding: &TopicBinding) -> bool {
        self.feeds.contains_key(binding)
    }

    pub fn open_count(&self) -> usize {
        self.feeds.len()
    }

    pub fn open_bindings(&self) -> Vec<TopicBinding> {
        self.feeds.keys().cloned().collect()
    }

    /// Wait for the next change on any open feed.
    ///
    /// Returns `None` immediately when nothing is open.
    pub async fn next_change(&mut self) -> Option<TopicBinding> {
        loop {
            match self.feeds.next().await? {
                (binding, FeedItem::Changed) => return Some(binding),
                (binding, FeedItem::Ended) => {
                    warn!(binding = %binding, "Change feed ended; it will reopen on next activation");
                    self.feeds.remove(&binding);
                }
            }
        }
    }
}
