//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use saleflow_core::{Clock, SystemClock};

use crate::config::ApiConfig;
use crate::db::{PriceRepository, SaleRepository, SessionRepository};
use crate::services::idempotency::{ExpiringCache, IdempotencyGuard};
use crate::services::pricing::PricingService;
use crate::services::sales::SaleService;

/// Sale service wired to `PostgreSQL`.
pub type PgSaleService = SaleService<SessionRepository, SaleRepository>;

/// Pricing service wired to `PostgreSQL`.
pub type PgPricingService = PricingService<PriceRepository>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    sales: PgSaleService,
    pricing: PgPricingService,
    idempotency: IdempotencyGuard,
}

impl AppState {
    /// Create a new application state using the system clock.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        Self::with_clock(config, pool, Arc::new(SystemClock))
    }

    /// Create a new application state with an explicit clock.
    #[must_use]
    pub fn with_clock(config: ApiConfig, pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        let sales = SaleService::new(
            SessionRepository::new(pool.clone()),
            SaleRepository::new(pool.clone()),
        );
        let pricing = PricingService::new(PriceRepository::new(pool.clone()), Arc::clone(&clock));
        let cache = ExpiringCache::new(clock);
        let idempotency = IdempotencyGuard::new(cache, config.idempotency.ttl_secs);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                sales,
                pricing,
                idempotency,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn sales(&self) -> &PgSaleService {
        &self.inner.sales
    }

    #[must_use]
    pub fn pricing(&self) -> &PgPricingService {
        &self.inner.pricing
    }

    /// Get the process-wide idempotency guard.
    #[must_use]
    pub fn idempotency(&self) -> &IdempotencyGuard {
        &self.inner.idempotency
    }
}
