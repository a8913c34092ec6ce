//! In-process change bus
//!
//! Every publish goes to one broadcast channel; each feed filters it down to
//! its own binding. Used in development mode and by tests.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

use super::{ChangeBus, ChangeEvent, ChangeFeed, TopicBinding};
use crate::types::SubscribeError;

/// Default broadcast capacity
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Published {
    binding: TopicBinding,
    payload: Bytes,
}

/// Broadcast-backed [`ChangeBus`]
#[derive(Clone)]
pub struct MemoryChangeBus {
    sender: broadcast::Sender<Published>,
}

impl MemoryChangeBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change for `topic` rows where `column = value`.
    ///
    /// Returns the number of open feeds that saw it (matching or not).
    pub fn publish(
        &self,
        topic: &str,
        column: &str,
        value: &str,
        payload: impl Into<Bytes>,
    ) -> usize {
        let message = Published {
            binding: TopicBinding::new(topic, column, value),
            payload: payload.into(),
        };
        self.sender.send(message).unwrap_or(0)
    }

    /// Number of open feeds
    pub fn feed_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeBus for MemoryChangeBus {
    async fn subscribe(&self, binding: &TopicBinding) -> Result<ChangeFeed, SubscribeError> {
        let wanted = binding.clone();
        let feed = BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            match item {
                Ok(message) if message.binding == wanted => Some(ChangeEvent {
                    topic: message.binding.topic,
                    payload: message.payload,
                }),
                Ok(_) => None,
                // Missed events still mean something changed
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    debug!(binding = %wanted, skipped, "Memory bus feed lagged");
                    Some(ChangeEvent {
                        topic: wanted.topic.clone(),
                        payload: Bytes::new(),
                    })
                }
            }
        });

        Ok(Box::pin(feed))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
