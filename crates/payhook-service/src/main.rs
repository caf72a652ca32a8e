//! # Payhook Service
//!
//! Binary entry point for the payment webhook reconciliation service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes structured logging
//! - Wires the idempotency, order and failed-webhook stores
//! - Spawns the retention sweeper
//! - Starts the HTTP server from payhook-api

mod settings;

use anyhow::Context;
use payhook_api::{
    start_server, AppState, LoggingConfig, PrometheusMetricsSink, ServiceConfig, ServiceError,
    StorageConfig,
};
use payhook_core::{
    BestEffortMetrics, FilesystemIdempotencyStore, Gateway, HandlerRegistry, IdempotencyStore,
    InMemoryFailedWebhookStore, MemoryDocumentStore, MissingSecretPolicy, RetentionSweeper,
    WebhookService,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let service_config = settings::load().context("Failed to load service configuration")?;

    init_tracing(&service_config.logging);

    info!(
        environment = service_config.environment.as_str(),
        "Starting Payhook Service"
    );

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    report_signature_setup(&service_config);

    let metrics =
        Arc::new(PrometheusMetricsSink::new().context("Failed to register Prometheus counters")?);

    let (service, idempotency) = build_service(&service_config, metrics.clone()).await?;

    info!(
        processing_mode = %service.processing_mode(),
        "Webhook service ready"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = RetentionSweeper::new(idempotency, service_config.idempotency.sweep_interval())
        .spawn(shutdown_rx);

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    let state = AppState::new(service_config, Arc::new(service), metrics);
    let served = start_server(state).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Retention sweeper task ended abnormally");
    }

    if let Err(e) = served {
        error!("Server terminated: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},payhook_core={},payhook_api={},tower_http=info",
            logging.level, logging.level, logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Log, once at startup, which gateways will accept unsigned webhooks.
fn report_signature_setup(config: &ServiceConfig) {
    let policy = config.effective_missing_secret_policy();

    for gateway in Gateway::ALL {
        if config
            .signatures
            .secret_for(gateway)
            .is_some_and(|secret| !secret.is_blank())
        {
            continue;
        }

        match policy {
            MissingSecretPolicy::Allow => warn!(
                gateway = %gateway,
                "No webhook secret configured; unsigned webhooks will be accepted"
            ),
            MissingSecretPolicy::Reject => warn!(
                gateway = %gateway,
                "No webhook secret configured; all webhooks for this gateway will be rejected"
            ),
        }
    }
}

/// Wire stores and handlers into a [`WebhookService`].
///
/// Orders always live in the in-memory document store. Processed-webhook
/// records share that store (combined transactions available) unless
/// `idempotency.storage` selects the filesystem, which only supports the
/// two-step path.
async fn build_service(
    config: &ServiceConfig,
    metrics: Arc<PrometheusMetricsSink>,
) -> anyhow::Result<(WebhookService, Arc<dyn IdempotencyStore>)> {
    let retention_days = config.idempotency.retention_days;
    let documents = MemoryDocumentStore::new().with_retention_days(retention_days);

    let idempotency: Arc<dyn IdempotencyStore> = match &config.idempotency.storage {
        StorageConfig::Memory => Arc::new(documents.clone()),
        StorageConfig::Filesystem { path } => {
            let store = FilesystemIdempotencyStore::new(path)
                .await
                .with_context(|| {
                    format!("Failed to open idempotency store at {}", path.display())
                })?
                .with_retention_days(retention_days);
            info!(path = %path.display(), "Using filesystem idempotency store");
            Arc::new(store)
        }
    };

    let service = WebhookService::new(
        Arc::new(config.build_verifier()),
        HandlerRegistry::with_defaults(),
        idempotency.clone(),
        Arc::new(documents),
        Arc::new(InMemoryFailedWebhookStore::new()),
        BestEffortMetrics::new(metrics),
    )
    .with_processing_mode(config.idempotency.processing_mode);

    Ok((service, idempotency))
}
