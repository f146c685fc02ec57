//! Server initialization and routing: builds the connection pool, wires the
//! concrete repository/provisioning graph, and starts the admin HTTP surface
//! alongside the delivery scheduler.

use crate::api;
use crate::config::Config;
use crate::provisioning::http_client::ReqwestScimClient;
use crate::provisioning::token::{JwtTokenSigner, TokenMinter};
use crate::provisioning::{DestinationService, EventIntake, EventProcessor, ScheduledProcessor, ScopePolicy};
use crate::provisioning::RepositoryDeliveryContextLoader;
use crate::repository::{
    ClientApplicationRepositoryImpl, DeliveryRepositoryImpl, DestinationRepositoryImpl, EventLogRepositoryImpl,
    InMemoryScopeStore, ResourceMappingRepositoryImpl,
};
use crate::state::AppState;
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    let destinations = Arc::new(DestinationRepositoryImpl::new(pool.clone()));
    let deliveries = Arc::new(DeliveryRepositoryImpl::new(pool.clone()));
    let mappings = Arc::new(ResourceMappingRepositoryImpl::new(pool.clone()));
    let applications = Arc::new(ClientApplicationRepositoryImpl::new(pool.clone()));
    let event_log = Arc::new(EventLogRepositoryImpl::new(pool.clone()));
    let scopes = Arc::new(InMemoryScopeStore::new());

    let scope_policy = Arc::new(ScopePolicy::new(applications.clone(), scopes));
    let destination_service = Arc::new(DestinationService::new(
        destinations.clone(),
        mappings.clone(),
        applications,
        scope_policy,
    ));

    let state = AppState {
        destinations: destinations.clone(),
        deliveries: deliveries.clone(),
        destination_service,
    };

    let app = api::router(state)
        .merge(api::metrics_router(Arc::new(prometheus_handle)))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.scim.http_timeout)),
        );

    let http_client = Arc::new(ReqwestScimClient::new(config.scim.http_timeout)?);
    let token_minter = Arc::new(TokenMinter::new(
        JwtTokenSigner::new(&config.signing),
        config.signing.issuer_base_url.clone(),
        config.scim.token_lifetime,
    ));
    let worker = Arc::new(crate::provisioning::DeliveryWorker::new(
        deliveries.clone(),
        mappings.clone(),
        http_client,
        token_minter,
    ));
    let intake = Arc::new(EventIntake::new(destinations.clone(), deliveries.clone(), event_log.clone()));
    let loader = Arc::new(RepositoryDeliveryContextLoader::new(destinations, event_log));

    let scheduler_enabled = config.scim.enabled;
    let scheduler = Arc::new(ScheduledProcessor::new(
        config.scim.clone(),
        deliveries,
        worker,
        intake,
        loader,
    ));

    if scheduler_enabled {
        let scheduler_handle = scheduler.clone();
        tokio::spawn(async move {
            scheduler_handle.start().await;
        });
    } else {
        info!("SCIM_ENABLED=false, scheduler will not run");
    }

    let listener = TcpListener::bind(config.http_addr()).await?;
    info!(addr = %config.http_addr(), "admin HTTP surface listening");

    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        scheduler.stop().await;
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
