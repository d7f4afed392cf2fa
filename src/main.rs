use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::routing::get;
use http::HeaderValue;
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use salonpro_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    if cfg.seed_demo_data {
        api::services::catalog::seed_demo_data(&db_pool).await?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Auth service for the bearer-token middleware
    let auth_service = Arc::new(api::auth::AuthService::new(api::auth::AuthConfig::from(
        &cfg,
    )));

    // Payment provider selection; config validation has already checked
    // that the combination is usable for this environment
    let payment_provider: Arc<dyn api::gateway::PaymentProvider> =
        match cfg.payment_provider.to_ascii_lowercase().as_str() {
            "razorpay" => {
                let key_id = cfg
                    .gateway_key_id
                    .clone()
                    .ok_or("gateway_key_id is required for the razorpay provider")?;
                info!("Payment provider: razorpay ({})", cfg.gateway_endpoint);
                Arc::new(api::gateway::razorpay::RazorpayProvider::new(
                    cfg.gateway_endpoint.clone(),
                    key_id,
                    cfg.gateway_key_secret.clone(),
                    Duration::from_secs(cfg.gateway_timeout_secs),
                ))
            }
            _ => {
                info!("Payment provider: mock (development only)");
                Arc::new(api::gateway::mock::MockProvider::new(
                    cfg.gateway_key_secret.clone(),
                ))
            }
        };

    // Aggregate app services used by HTTP handlers
    let services = api::handlers::AppServices::new(
        db_arc.clone(),
        event_sender,
        payment_provider,
        &cfg,
    );

    // Compose shared app state
    let app_state = api::AppState {
        db: db_arc,
        config: Arc::new(cfg.clone()),
        services,
        auth_service,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(cfg.cors_allow_credentials)
    } else if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration detected; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        return Err("Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into());
    };

    // Build router: root banner + health + full v1 API + Swagger UI.
    // Request-id propagation must stay outermost so the trace span and
    // error bodies see the id.
    let app = api::build_router(app_state)
        .route("/", get(|| async { "salonpro-api up" }))
        .layer(
            TraceLayer::new_for_http().make_span_with(api::request_id::RequestSpanMaker::default()),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(axum::middleware::from_fn(api::request_id::propagate));

    // Bind and serve
    let host: std::net::IpAddr = cfg
        .host
        .parse()
        .map_err(|e| format!("invalid host address {:?}: {}", cfg.host, e))?;
    let addr = SocketAddr::new(host, cfg.port);
    info!("🚀 salonpro-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
