//! Mailroute Router - async RabbitMQ consumer for routing extracted emails.
//!
//! This binary consumes emails from the incoming_emails queue, sends each one
//! to the analysis service, and publishes allow-listed forward decisions to
//! the routed_emails queue.

mod consumer;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailroute::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("router_starting");

    let config = Config::from_env();
    tracing::info!(
        amqp_url_set = !config.amqp_url.is_empty(),
        email_queue = %config.email_queue,
        routed_queue = %config.routed_queue,
        analysis_endpoint = %config.analysis_endpoint,
        analysis_timeout_ms = config.analysis_timeout_ms,
        analysis_strict = config.analysis_strict,
        allowed_recipients = config.allowed_recipients.len(),
        concurrency = config.worker_concurrency,
        "config_loaded"
    );

    consumer::run(config).await?;

    Ok(())
}
