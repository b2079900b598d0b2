use crate::billing::SubscriptionReconciler;
use crate::core::Config;
use crate::db::DbService;
use crate::exchange::ExchangeEngine;
use crate::invites::InviteService;
use crate::rewards::StreakEngine;
use crate::utils::SlidingWindowLimiter;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared server state: the pool, configuration and the per-endpoint rate
/// limiters. Cheap to clone; the engines are constructed on demand from it.
#[derive(Clone)]
pub struct ServerState {
    pub pool: SqlitePool,
    pub config: Config,
    exchange_limiter: Arc<SlidingWindowLimiter>,
    login_limiter: Arc<SlidingWindowLimiter>,
}

impl ServerState {
    pub fn new(db: DbService, config: Config) -> Self {
        let exchange_limiter = Arc::new(SlidingWindowLimiter::new(config.exchange_limit));
        let login_limiter = Arc::new(SlidingWindowLimiter::new(config.login_bonus_limit));
        Self {
            pool: db.pool,
            config,
            exchange_limiter,
            login_limiter,
        }
    }

    pub fn invite_service(&self) -> InviteService {
        InviteService::new(self.pool.clone())
    }

    pub fn exchange_engine(&self) -> ExchangeEngine {
        ExchangeEngine::new(self.pool.clone(), self.exchange_limiter.clone())
    }

    pub fn streak_engine(&self) -> StreakEngine {
        StreakEngine::new(self.pool.clone(), self.login_limiter.clone())
    }

    pub fn subscription_reconciler(&self) -> SubscriptionReconciler {
        SubscriptionReconciler::new(
            self.pool.clone(),
            self.config.webhook_secret.clone(),
            self.config.webhook_tolerance_secs,
        )
    }
}
