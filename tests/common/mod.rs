use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use salonpro_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{agent, product},
    events::{self, EventSender},
    gateway::{mock::MockProvider, GatewayError, GatewayOrder, PaymentProvider},
    handlers::AppServices,
    AppState,
};

/// Secrets baked into every test app. The JWT secret satisfies the 64-char
/// config minimum; the gateway secret is what signatures are minted against.
pub const TEST_JWT_SECRET: &str =
    "integration_test_jwt_secret_long_enough_for_hs256_keys_0123456789abcdef";
pub const TEST_GATEWAY_SECRET: &str = "integration_test_gateway_secret_7f3a9c1e";

/// Mock gateway wrapper for tests. Counts provider-side order creations and
/// signature verifications (so tests can assert the gateway was never
/// touched) and can be flipped into a failing state to exercise outage
/// handling.
pub struct TestProvider {
    inner: MockProvider,
    create_calls: AtomicU32,
    verify_calls: AtomicU32,
    failing: AtomicBool,
}

impl TestProvider {
    pub fn new() -> Self {
        Self {
            inner: MockProvider::new(TEST_GATEWAY_SECRET.to_string()),
            create_calls: AtomicU32::new(0),
            verify_calls: AtomicU32::new(0),
            failing: AtomicBool::new(false),
        }
    }

    #[allow(dead_code)]
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn verify_calls(&self) -> u32 {
        self.verify_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Produce the payment id and valid signature a buyer's completed hosted
    /// payment would report back.
    #[allow(dead_code)]
    pub fn simulate_payment(&self, gateway_order_id: &str) -> (String, String) {
        self.inner.simulate_payment(gateway_order_id)
    }
}

#[async_trait]
impl PaymentProvider for TestProvider {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable(
                "simulated gateway outage".to_string(),
            ));
        }
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_order(amount, currency, receipt).await
    }

    async fn verify_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .verify_payment(gateway_order_id, gateway_payment_id, signature)
            .await
    }

    fn name(&self) -> &'static str {
        "test"
    }
}

/// Helper harness for spinning up application state backed by a throwaway
/// SQLite database file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub buyer_id: Uuid,
    pub provider: Arc<TestProvider>,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test db");
        let db_path = db_dir.path().join("salonpro_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            TEST_GATEWAY_SECRET.to_string(),
            "127.0.0.1".to_string(),
            0,
            "development".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let provider = Arc::new(TestProvider::new());
        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let services = AppServices::new(
            db_arc.clone(),
            event_sender,
            provider.clone() as Arc<dyn PaymentProvider>,
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: Arc::new(cfg),
            services,
            auth_service: auth_service.clone(),
        };
        let router = salonpro_api::build_router(state.clone());

        let buyer_id = Uuid::new_v4();
        let token = auth_service
            .issue_token(
                buyer_id,
                Some("Test Buyer".to_string()),
                Some("buyer@test.example".to_string()),
            )
            .expect("mint bearer token for tests");

        Self {
            router,
            state,
            buyer_id,
            provider,
            token,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Access the bearer token for the default buyer.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Mint a bearer token for a different buyer.
    #[allow(dead_code)]
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .auth_service
            .issue_token(user_id, None, None)
            .expect("mint bearer token for tests")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for JSON requests as the default buyer.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Insert an active catalog product priced in minor units.
    pub async fn seed_product(&self, sku: &str, name: &str, unit_price: i64) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            sku: Set(sku.to_string()),
            description: Set(None),
            unit_price: Set(unit_price),
            currency: Set("INR".to_string()),
            stock_quantity: Set(500),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed product for tests")
    }

    /// Insert a sales agent available for order attribution.
    #[allow(dead_code)]
    pub async fn seed_agent(&self, name: &str, commission_rate: Decimal, active: bool) -> agent::Model {
        let now = Utc::now();
        agent::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(format!(
                "{}@salonpro.example",
                name.to_lowercase().replace(' ', ".")
            )),
            phone: Set(None),
            region: Set(Some("South".to_string())),
            commission_rate: Set(commission_rate),
            is_active: Set(active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed agent for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
