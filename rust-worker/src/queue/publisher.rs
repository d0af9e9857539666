//! Async RabbitMQ publisher for enqueueing messages.
//!
//! The publisher keeps one connection and channel alive and can be shared
//! across tasks. The poller and router only see it through the [`EmailSink`]
//! and [`RoutedSink`] traits.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{ParsedEmail, RoutedEmail};
use crate::error::PublishError;

/// Destination for freshly extracted emails.
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn publish_email(&self, key: &str, email: &ParsedEmail) -> Result<(), PublishError>;
}

/// Destination for forward decisions.
#[async_trait]
pub trait RoutedSink: Send + Sync {
    async fn publish_routed(&self, routed: &RoutedEmail) -> Result<(), PublishError>;
}

/// Async RabbitMQ publisher with connection management.
///
/// Reconnects lazily when the channel is found closed.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    email_queue: String,
    routed_queue: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    /// Create a new publisher for the given RabbitMQ URL and queue names.
    pub fn new(url: String, email_queue: String, routed_queue: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                email_queue,
                routed_queue,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        info!("rabbitmq_publisher_connected");

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        // Publisher confirms, so a returned Ok means the broker took the message
        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        for queue in [&self.inner.email_queue, &self.inner.routed_queue] {
            ch.queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to declare queue {}", queue))?;
        }

        info!(
            email_queue = %self.inner.email_queue,
            routed_queue = %self.inner.routed_queue,
            "rabbitmq_queues_declared"
        );

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a JSON body to a queue as a persistent message.
    async fn publish_json(&self, queue: &str, message_id: &str, body: &[u8]) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let confirmation = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_message_id(message_id.to_string().into()),
            )
            .await
            .with_context(|| format!("Failed to publish to {}", queue))?
            .await
            .context("Failed to confirm publish")?;

        if confirmation.is_nack() {
            anyhow::bail!("Broker nacked publish to {}", queue);
        }

        info!(
            queue = %queue,
            message_id = %message_id,
            body_length = body.len(),
            "rabbitmq_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

#[async_trait]
impl EmailSink for Publisher {
    async fn publish_email(&self, key: &str, email: &ParsedEmail) -> Result<(), PublishError> {
        let body = serde_json::to_vec(email).map_err(|e| PublishError(e.to_string()))?;
        self.publish_json(&self.inner.email_queue, key, &body)
            .await
            .map_err(|e| PublishError(format!("{:#}", e)))
    }
}

#[async_trait]
impl RoutedSink for Publisher {
    async fn publish_routed(&self, routed: &RoutedEmail) -> Result<(), PublishError> {
        let body = serde_json::to_vec(routed).map_err(|e| PublishError(e.to_string()))?;
        let key = message_key(None, &routed.email.subject, &routed.forward_to);
        self.publish_json(&self.inner.routed_queue, &key, &body)
            .await
            .map_err(|e| PublishError(format!("{:#}", e)))
    }
}

/// Build the publish key for a message.
///
/// Uses the Message-Id header without angle brackets when present, otherwise
/// a SHA-256 digest of subject and sender.
pub fn message_key(message_id: Option<&str>, subject: &str, sender: &str) -> String {
    if let Some(id) = message_id {
        let clean = id.trim().trim_matches(|c| c == '<' || c == '>');
        if !clean.is_empty() {
            return clean.to_string();
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}", subject, sender).as_bytes());
    hex::encode(hasher.finalize())
}
