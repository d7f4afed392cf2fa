pub mod agents;
pub mod checkout;
pub mod common;
pub mod health;
pub mod orders;
pub mod products;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    gateway::PaymentProvider,
    services::{
        agents::AgentService, catalog::CatalogService, checkout::CheckoutService,
        orders::OrderService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub catalog: Arc<CatalogService>,
    pub agents: Arc<AgentService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        payment_provider: Arc<dyn PaymentProvider>,
        config: &AppConfig,
    ) -> Self {
        let orders = Arc::new(OrderService::new(db_pool.clone(), event_sender));
        let catalog = Arc::new(CatalogService::new(db_pool.clone()));
        let agents = Arc::new(AgentService::new(db_pool));
        let checkout = Arc::new(CheckoutService::new(
            orders.clone(),
            catalog.clone(),
            agents.clone(),
            payment_provider,
            config.default_currency.clone(),
        ));

        Self {
            orders,
            catalog,
            agents,
            checkout,
        }
    }
}
