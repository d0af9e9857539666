//! RabbitMQ consumer module using lapin.
//!
//! This module handles connecting to RabbitMQ, consuming extracted emails from
//! the incoming queue, and spawning async tasks to route each one
//! concurrently.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tracing::{error, info, warn};

use mailroute::routing::{handle_delivery, Settlement};
use mailroute::{
    shutdown_signal, AllowList, AnalysisClient, Config, Publisher, RoutingDecider,
    RoutingOrchestrator, Strictness,
};

/// Run the RabbitMQ consumer.
///
/// This function:
/// 1. Builds the routing pipeline (allow-list, analysis client, publisher)
/// 2. Connects to RabbitMQ and sets QoS so prefetch bounds concurrency
/// 3. Declares the incoming queue (idempotent operation)
/// 4. Consumes deliveries, spawning a task for each
/// 5. Handles graceful shutdown on SIGINT/SIGTERM
pub async fn run(config: Config) -> Result<()> {
    let allow_list = Arc::new(AllowList::from_iter(config.allowed_recipients.iter().cloned()));
    if allow_list.is_empty() {
        warn!("allow_list_empty_every_email_rejected");
    }
    info!(recipients = allow_list.len(), "allow_list_loaded");

    let decider = RoutingDecider::new(
        allow_list,
        Strictness::from_strict_flag(config.analysis_strict),
    );
    let analyzer = AnalysisClient::from_config(&config)?;

    info!(endpoint = %analyzer.endpoint(), "analysis_client_created");

    let orchestrator = Arc::new(RoutingOrchestrator::new(analyzer, decider));

    let publisher = Publisher::new(
        config.amqp_url.clone(),
        config.email_queue.clone(),
        config.routed_queue.clone(),
    );

    // Connect to RabbitMQ
    info!(url_length = config.amqp_url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(&config.amqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    let channel = conn.create_channel().await.context("Failed to create channel")?;

    info!("rabbitmq_channel_created");

    let prefetch_count = u16::try_from(config.worker_concurrency).unwrap_or(u16::MAX);
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    channel
        .queue_declare(
            &config.email_queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

    info!(queue = %config.email_queue, "rabbitmq_queue_declared");

    let mut consumer = channel
        .basic_consume(
            &config.email_queue,
            "mailroute-router",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = %config.email_queue, "rabbitmq_consumer_started");
    info!("router_ready");

    let channel = Arc::new(channel);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("router_stopping");
                break;
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let delivery_tag = delivery.delivery_tag;
                        let message_id = delivery
                            .properties
                            .message_id()
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "unknown".to_string());

                        info!(
                            queue = %config.email_queue,
                            message_id = %message_id,
                            delivery_tag = delivery_tag,
                            "rabbitmq_email_received"
                        );

                        let orchestrator = Arc::clone(&orchestrator);
                        let publisher = publisher.clone();
                        let channel = Arc::clone(&channel);

                        tokio::spawn(async move {
                            let settlement =
                                handle_delivery(&*orchestrator, &publisher, &delivery.data).await;
                            settle(&channel, delivery_tag, &message_id, settlement).await;
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    publisher.close().await;

    info!("router_shutdown_complete");
    Ok(())
}

/// Ack or nack a delivery according to its settlement.
async fn settle(channel: &Channel, delivery_tag: u64, message_id: &str, settlement: Settlement) {
    let result = match settlement {
        Settlement::Ack => channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await,
        Settlement::Requeue | Settlement::Drop => {
            channel
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        requeue: settlement == Settlement::Requeue,
                        ..Default::default()
                    },
                )
                .await
        }
    };

    match result {
        Ok(()) => info!(
            message_id = %message_id,
            settlement = ?settlement,
            "rabbitmq_email_settled"
        ),
        Err(e) => error!(
            delivery_tag = delivery_tag,
            settlement = ?settlement,
            error = %e,
            "rabbitmq_settle_failed"
        ),
    }
}
