//! Change-notification bus
//!
//! A bus delivers opaque change events for `(topic, column = value)`
//! filters. Subscribing returns a [`ChangeFeed`]; dropping the feed is the
//! unsubscribe.
//!
//! - [`memory`]: in-process fan-out over `tokio::sync::broadcast`
//! - [`nats`]: NATS subjects `{prefix}.{topic}.{column}.{value}`

pub mod memory;
pub mod nats;

pub use memory::MemoryChangeBus;
pub use nats::NatsChangeBus;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;

use crate::types::SubscribeError;

/// One topic with an equality filter bound to a concrete value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicBinding {
    pub topic: String,
    pub filter_column: String,
    pub filter_value: String,
}

impl TopicBinding {
    pub fn new(
        topic: impl Into<String>,
        filter_column: impl Into<String>,
        filter_value: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            filter_column: filter_column.into(),
            filter_value: filter_value.into(),
        }
    }
}

impl fmt::Display for TopicBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}=eq.{}]",
            self.topic, self.filter_column, self.filter_value
        )
    }
}

/// A change notification. The payload is never interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub topic: String,
    pub payload: Bytes,
}

/// Stream of change events for one binding
pub type ChangeFeed = BoxStream<'static, ChangeEvent>;

/// Subscribe/unsubscribe keyed by (topic, equality filter)
#[async_trait]
pub trait ChangeBus: Send + Sync {
    /// Open a feed for one binding
    async fn subscribe(&self, binding: &TopicBinding) -> Result<ChangeFeed, SubscribeError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
