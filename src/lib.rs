//! SalonPro Storefront API Library
//!
//! This crate provides the order and payment flow for the SalonPro
//! wholesale storefront: catalog and agent lookups, server-side cart
//! pricing, order placement, and gateway payment verification.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod pricing;
pub mod request_id;
pub mod services;

use std::sync::Arc;

use axum::{Extension, Router};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
    pub auth_service: Arc<auth::AuthService>,
}

/// Builds the versioned API router.
///
/// Catalog and agent listings are public so the storefront can render
/// before sign-in. Orders and checkout require a bearer token; the auth
/// middleware reads the `AuthService` injected by [`build_router`].
pub fn api_v1_routes() -> Router<AppState> {
    let public = Router::new()
        .nest("/products", handlers::products::products_routes())
        .nest("/agents", handlers::agents::agents_routes());

    let authed = Router::new()
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
        .layer(axum::middleware::from_fn(auth::auth_middleware));

    public.merge(authed)
}

/// Assembles the application router with state and the inner middleware
/// the handlers rely on. Transport-level layers (tracing, request-id
/// propagation, CORS, compression) are applied by the binary on top of
/// this.
pub fn build_router(state: AppState) -> Router {
    let auth_service = state.auth_service.clone();

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .nest("/health", handlers::health::health_routes())
        .merge(openapi::swagger_ui())
        .layer(Extension(auth_service))
        .with_state(state)
}
