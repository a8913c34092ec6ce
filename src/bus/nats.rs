//! NATS change bus
//!
//! Change events are published by the database change capture on subjects
//! shaped `{prefix}.{topic}.{column}.{value}`. Each binding maps to exactly
//! one subject; dropping the feed drops the `Subscriber`, which unsubscribes.

use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, info};

use super::{ChangeBus, ChangeEvent, ChangeFeed, TopicBinding};
use crate::config::NatsArgs;
use crate::types::{SidelineError, SubscribeError};

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// Connect timeout; startup falls back quickly in dev mode
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// [`ChangeBus`] over core NATS subscriptions
#[derive(Clone)]
pub struct NatsChangeBus {
    client: Client,
    prefix: String,
}

impl NatsChangeBus {
    /// Connect to NATS
    pub async fn connect(args: &NatsArgs, name: &str) -> Result<Self, SidelineError> {
        info!("Connecting to NATS at {}", args.nats_url);

        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(CONNECT_TIMEOUT);

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| SidelineError::Bus(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self::from_client(client, &args.subject_prefix))
    }

    /// Wrap an existing client
    pub fn from_client(client: Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: sanitize_token(prefix),
        }
    }

    /// Subject a binding listens on
    pub fn subject_for(&self, binding: &TopicBinding) -> String {
        subject_for(&self.prefix, binding)
    }
}

#[async_trait]
impl ChangeBus for NatsChangeBus {
    async fn subscribe(&self, binding: &TopicBinding) -> Result<ChangeFeed, SubscribeError> {
        let subject = self.subject_for(binding);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| SubscribeError::Rejected {
                topic: binding.topic.clone(),
                reason: e.to_string(),
            })?;

        debug!(subject = %subject, "NATS change subscription opened");

        let topic = binding.topic.clone();
        let feed = subscriber.map(move |message| ChangeEvent {
            topic: topic.clone(),
            payload: message.payload,
        });

        Ok(Box::pin(feed))
    }

    fn name(&self) -> &'static str {
        "nats"
    }
}

/// `{prefix}.{topic}.{column}.{value}` with every token sanitized
pub fn subject_for(prefix: &str, binding: &TopicBinding) -> String {
    format!(
        "{}.{}.{}.{}",
        sanitize_token(prefix),
        sanitize_token(&binding.topic),
        sanitize_token(&binding.filter_column),
        sanitize_token(&binding.filter_value)
    )
}

/// Replace characters NATS treats specially in a single subject token
fn sanitize_token(token: &str) -> String {
    let cleaned: String = token
        .trim()
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' | ' ' | '\t' | '\r' | '\n' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
