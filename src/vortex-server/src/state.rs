//! Application state management.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use vortex_cart::{
    CartExporter, CartLinkService, Clock, FileSnapshotStore, MemorySnapshotStore, SnapshotStore,
    SystemClock, TokenGenerator,
};

use crate::carts::CartRegistry;
use crate::catalog::Catalog;
use crate::config::{ServerConfig, StoreBackend};
use crate::error::{AppError, AppResult};
use crate::nonce::NonceIssuer;

/// Application state shared across request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Cart link service.
    pub links: CartLinkService,
    /// Shopper carts; `None` when the cart subsystem is disabled.
    pub carts: Option<CartRegistry>,
    /// CSRF nonces for the create-link action.
    pub nonces: NonceIssuer,
    /// Metrics collector.
    metrics: RwLock<MetricsState>,
    /// Start time.
    start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("links", &self.links)
            .field("carts_enabled", &self.carts.is_some())
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    /// Create application state driven by `clock`.
    ///
    /// The clock decides snapshot expiry and nonce ticks.
    pub async fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let store = build_store(&config, Arc::clone(&clock))?;

        let links = CartLinkService::new(store)
            .with_ttl(config.links.ttl())
            .with_token_generator(TokenGenerator::new(config.links.token_length))
            .with_exporter(
                CartExporter::new().with_extra_denied_keys(config.links.extra_denied_keys.clone()),
            );

        let carts = if config.cart.enabled {
            let catalog = build_catalog(&config)?;
            info!("Catalog ready with {} products", catalog.len());
            Some(CartRegistry::new(Arc::new(catalog)))
        } else {
            warn!("Cart subsystem disabled; cart links cannot be created or opened");
            None
        };

        let lifetime = Duration::from_secs(config.nonce.lifetime_secs);
        let nonces = match &config.nonce.secret {
            Some(secret) => NonceIssuer::new(secret.as_bytes(), lifetime, clock),
            None => NonceIssuer::with_random_secret(lifetime, clock),
        };

        Ok(Self {
            config,
            links,
            carts,
            nonces,
            metrics: RwLock::new(MetricsState::default()),
            start_time: Instant::now(),
        })
    }

    /// Start background cleanup task that runs periodically.
    /// Call this after wrapping AppState in Arc to start the cleanup loop.
    pub fn start_cleanup_task(self: &Arc<Self>) {
        let state = Arc::clone(self);
        let cleanup_interval = state.config.cleanup_interval_duration();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                state.cleanup().await;
            }
        });
    }

    /// Purge expired snapshots and idle carts once.
    pub async fn cleanup(&self) {
        match self.links.purge_expired().await {
            Ok(purged) if purged > 0 => debug!("Purged {} expired cart snapshots", purged),
            Ok(_) => {}
            Err(e) => warn!("Failed to purge expired snapshots: {}", e),
        }

        if let Some(carts) = &self.carts {
            let idle = carts
                .cleanup_idle(self.config.cart.idle_timeout_duration())
                .await;
            if idle > 0 {
                debug!("Dropped {} idle carts", idle);
            }
        }
    }

    /// Get uptime duration.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Increment a counter metric.
    pub async fn increment_counter(&self, name: &str) {
        self.add_to_counter(name, 1).await;
    }

    /// Add `by` to a counter metric.
    pub async fn add_to_counter(&self, name: &str, by: u64) {
        if by == 0 {
            return;
        }
        let mut metrics = self.metrics.write().await;
        *metrics.counters.entry(name.to_string()).or_insert(0) += by;
    }

    /// Get metrics snapshot.
    pub async fn get_metrics(&self) -> MetricsSnapshot {
        let metrics = self.metrics.read().await;
        let counter = |name: &str| *metrics.counters.get(name).unwrap_or(&0);

        let active_carts = match &self.carts {
            Some(carts) => carts.count().await,
            None => 0,
        };
        let stored_snapshots = self.links.store().count().await.unwrap_or(0);

        MetricsSnapshot {
            uptime_seconds: self.uptime().as_secs(),
            active_carts,
            stored_snapshots,
            links_created: counter(counters::LINKS_CREATED),
            links_resolved: counter(counters::LINKS_RESOLVED),
            links_not_found: counter(counters::LINKS_NOT_FOUND),
            import_failures: counter(counters::IMPORT_FAILURES),
            errors: counter(counters::ERRORS),
        }
    }
}

/// Counter names.
pub mod counters {
    pub const LINKS_CREATED: &str = "links_created";
    pub const LINKS_RESOLVED: &str = "links_resolved";
    pub const LINKS_NOT_FOUND: &str = "links_not_found";
    pub const IMPORT_FAILURES: &str = "import_failures";
    pub const ERRORS: &str = "errors";
}

fn build_store(config: &ServerConfig, clock: Arc<dyn Clock>) -> AppResult<Arc<dyn SnapshotStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemorySnapshotStore::with_clock(clock))),
        StoreBackend::File => {
            let path = config.store.path.as_ref().ok_or_else(|| {
                AppError::Internal("store.path is required for the file backend".to_string())
            })?;
            let store = FileSnapshotStore::with_clock(path, clock).map_err(|e| {
                AppError::Internal(format!("Failed to open snapshot store {path:?}: {e}"))
            })?;
            info!("Storing cart snapshots in {:?}", path);
            Ok(Arc::new(store))
        }
    }
}

fn build_catalog(config: &ServerConfig) -> AppResult<Catalog> {
    let mut products = config.catalog.products.clone();
    if let Some(path) = &config.catalog.path {
        products.extend(Catalog::load(path)?);
    }
    Ok(Catalog::new(products))
}

/// Metrics state.
#[derive(Debug, Default)]
struct MetricsState {
    /// Counter metrics.
    counters: HashMap<String, u64>,
}

/// Metrics snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Server uptime in seconds.
    pub uptime_seconds: u64,
    /// Carts held in memory.
    pub active_carts: usize,
    /// Snapshots in the store, including expired ones not yet purged.
    pub stored_snapshots: usize,
    pub links_created: u64,
    pub links_resolved: u64,
    pub links_not_found: u64,
    /// Snapshot lines the cart refused during import.
    pub import_failures: u64,
    /// Errors.
    pub errors: u64,
}
