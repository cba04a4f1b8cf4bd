use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    payments::PaymentGateway,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub payments: PaymentGateway,
}

impl AppState {
    pub fn new(orm: OrmConn, config: AppConfig) -> Self {
        let pool = orm.get_postgres_connection_pool().clone();
        let payments = PaymentGateway::new(config.payment.clone());
        Self {
            pool,
            orm,
            config: Arc::new(config),
            payments,
        }
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
