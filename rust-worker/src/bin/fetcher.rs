//! Mailroute Fetcher - scheduled IMAP poller.
//!
//! This binary:
//! - Polls the configured mailbox on a fixed delay
//! - Publishes each unseen message to the incoming_emails queue
//! - Marks a message seen only after its publish succeeded
//! - Serves `/health` and `/stats` for operators

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailroute::mailbox::run_scheduled;
use mailroute::web::{self, AppState};
use mailroute::{
    shutdown_signal, Config, ImapSettings, ImapStore, MailboxPoller, PollStats, Publisher,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("fetcher_starting");

    let config = Config::from_env();
    info!(
        imap_host = %config.imap_host,
        imap_port = config.imap_port,
        imap_mailbox = %config.imap_mailbox,
        imap_username_set = !config.imap_username.is_empty(),
        email_queue = %config.email_queue,
        poll_interval_ms = config.poll_interval_ms,
        poll_deadline_ms = config.poll_deadline_ms,
        port = config.port,
        "config_loaded"
    );

    let store = ImapStore::new(ImapSettings::from_config(&config))
        .context("Failed to set up IMAP store")?;

    let publisher = Publisher::new(
        config.amqp_url.clone(),
        config.email_queue.clone(),
        config.routed_queue.clone(),
    );
    info!("rabbitmq_publisher_created");

    let stats = Arc::new(PollStats::new());
    let poller = MailboxPoller::new(store, publisher.clone(), Arc::clone(&stats));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    // Health and stats server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    let server = tokio::spawn(
        axum::serve(listener, web::router(AppState::new(stats)))
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future(),
    );

    run_scheduled(
        &poller,
        Duration::from_millis(config.poll_interval_ms),
        Duration::from_millis(config.poll_deadline_ms),
        shutdown.cancelled(),
    )
    .await;

    server
        .await
        .context("Server task failed")?
        .context("Server error")?;

    publisher.close().await;

    info!("fetcher_shutdown_complete");

    Ok(())
}
