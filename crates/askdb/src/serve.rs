// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `askdb serve` command implementation.
//!
//! Wires the cache, connector, schema catalog, LM client, conversation
//! memory, agent, dispatcher, and scheduler together, then runs until a
//! shutdown signal. The HTTP layer is a thin collaborator that consumes
//! [`CoreServices`]; it is not part of this crate.

use std::sync::Arc;

use tracing::{info, warn};

use askdb_agent::{AgentSettings, SqlAgent, VisualizationAdvisor};
use askdb_cache::{Cache, SqliteCache};
use askdb_config::AskdbConfig;
use askdb_connector::SqliteConnector;
use askdb_core::{AskdbError, LmProvider};
use askdb_dispatch::{shutdown, Dispatcher, PoolRouter, ResultStore, Scheduler};
use askdb_lm::LmClient;
use askdb_memory::ConversationMemory;
use askdb_schema::SchemaCatalog;

/// The boundary surface handed to the submission layer: `submit`/`poll`/
/// `cancel` via the dispatcher, plus the stateless visualization call.
pub struct CoreServices {
    pub dispatcher: Arc<Dispatcher>,
    pub advisor: VisualizationAdvisor,
}

/// Builds every component from configuration and starts the worker pools.
pub async fn build_services(
    config: &AskdbConfig,
    shutdown: tokio_util::sync::CancellationToken,
) -> Result<(CoreServices, Scheduler), AskdbError> {
    let store = SqliteCache::open(&config.cache.url, config.cache.capacity).await?;
    let cache = Cache::new(Arc::new(store));

    let connector = Arc::new(
        SqliteConnector::open(&config.connector.url)
            .await
            .map_err(AskdbError::Connector)?,
    );

    let catalog = SchemaCatalog::new(connector.clone(), cache.clone(), config.cache.schema_ttl());
    // Warm the snapshots so the first questions skip introspection.
    // Best-effort: a cold catalog still fills lazily.
    if let Err(e) = catalog.refresh().await {
        warn!(error = %e, "initial schema refresh failed");
    }

    let lm = Arc::new(LmClient::from_config(&config.lm, cache.clone())?);

    let memory = ConversationMemory::new(
        cache.clone(),
        config.memory.session_ttl(),
        config.memory.history_limit,
    );

    let agent = Arc::new(SqlAgent::new(
        lm.clone(),
        connector,
        catalog.clone(),
        memory,
        cache.clone(),
        AgentSettings::from_config(config),
    ));

    let results = ResultStore::new(cache.clone(), config.dispatch.result_ttl());
    let routing_lm = if config.routing.use_lm {
        Some(lm.clone() as Arc<dyn LmProvider>)
    } else {
        None
    };
    let router = PoolRouter::new(config.routing.enabled, routing_lm);

    let dispatcher = Dispatcher::start(agent, results, router, config, shutdown);
    let scheduler = Scheduler::new(cache, catalog, config);
    let advisor = VisualizationAdvisor::new(lm);

    Ok((
        CoreServices {
            dispatcher,
            advisor,
        },
        scheduler,
    ))
}

/// Runs the engine until SIGINT/SIGTERM.
pub async fn run_serve(config: AskdbConfig) -> Result<(), AskdbError> {
    init_tracing(&config.agent.log_level);
    askdb_prometheus::register_metrics();

    info!(
        model = config.lm.model.as_str(),
        cache = config.cache.url.as_str(),
        connector = config.connector.url.as_str(),
        "starting askdb serve"
    );

    let cancel = shutdown::install_signal_handler();
    let (services, scheduler) = build_services(&config, cancel.clone()).await?;

    if config.scheduler.enabled {
        scheduler.spawn(cancel.clone());
    } else {
        info!("scheduler disabled by configuration");
    }

    let _services = services;
    info!("askdb serve ready");
    cancel.cancelled().await;
    info!("askdb serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("askdb={log_level},warn")));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .is_err()
    {
        warn!("tracing subscriber was already initialized");
    }
}
