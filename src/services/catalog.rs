use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{agent, product::{self, Entity as ProductEntity}},
    errors::ServiceError,
    services::orders::DraftItem,
};

/// Public catalog entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    /// Minor currency units
    pub unit_price: i64,
    pub currency: String,
    pub stock_quantity: i32,
}

/// A cart line as submitted by the client: which product, how many. The
/// catalog decides what it costs.
#[derive(Debug, Clone, Copy)]
pub struct RequestedLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Read access to the product catalog, plus the authoritative pricing of
/// submitted cart lines.
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Lists active products for cart building.
    #[instrument(skip(self))]
    pub async fn list_active_products(&self) -> Result<Vec<ProductResponse>, ServiceError> {
        let db = &*self.db_pool;
        let products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(products
            .into_iter()
            .map(|p| ProductResponse {
                id: p.id,
                name: p.name,
                sku: p.sku,
                description: p.description,
                unit_price: p.unit_price,
                currency: p.currency,
                stock_quantity: p.stock_quantity,
            })
            .collect())
    }

    /// Prices submitted cart lines from the catalog. Names and unit prices
    /// in the result come from the product rows, never from the client, so
    /// a tampered cart cannot move the totals.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn price_lines(
        &self,
        lines: &[RequestedLine],
    ) -> Result<Vec<DraftItem>, ServiceError> {
        let db = &*self.db_pool;

        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<Uuid, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = products.get(&line.product_id).filter(|p| p.is_active).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Product {} is not available",
                    line.product_id
                ))
            })?;

            items.push(DraftItem {
                product_id: Some(product.id),
                name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.unit_price,
            });
        }

        Ok(items)
    }
}

/// Populate an empty database with a handful of salon products and sales
/// agents so the storefront is usable straight after first boot. A no-op
/// once any product exists.
pub async fn seed_demo_data(db: &DbPool) -> Result<(), ServiceError> {
    let existing = ProductEntity::find()
        .count(db)
        .await
        .map_err(ServiceError::DatabaseError)?;
    if existing > 0 {
        return Ok(());
    }

    let now = Utc::now();

    let products_data = vec![
        (
            "Professional Argan Oil 100ml",
            "SAL-ARG-100",
            4200i64,
            "Cold-pressed argan oil for post-treatment shine and frizz control.",
        ),
        (
            "Deep Hydration Mask 500ml",
            "SAL-MSK-500",
            6850,
            "Salon-strength conditioning mask for chemically treated hair.",
        ),
        (
            "Keratin Smoothing Shampoo 1L",
            "SAL-SHM-1L",
            5400,
            "Sulphate-free backwash shampoo, salon size.",
        ),
        (
            "Ammonia-Free Color Kit - Ash Brown",
            "SAL-CLR-AB",
            3150,
            "Single-application professional color kit with developer.",
        ),
        (
            "Ceramic Round Brush 43mm",
            "SAL-BRS-43",
            1890,
            "Heat-retaining ceramic barrel for blowout styling.",
        ),
    ];

    for (name, sku, unit_price, description) in products_data {
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            sku: Set(sku.to_string()),
            description: Set(Some(description.to_string())),
            unit_price: Set(unit_price),
            currency: Set("INR".to_string()),
            stock_quantity: Set(250),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(db).await.map_err(ServiceError::DatabaseError)?;
    }

    let agents_data = vec![
        ("Priya Sharma", "priya.sharma@salonpro.example", "South", dec!(7.50)),
        ("Rahul Mehta", "rahul.mehta@salonpro.example", "West", dec!(5.00)),
        ("Deepa Nair", "deepa.nair@salonpro.example", "South", dec!(6.25)),
    ];

    for (name, email, region, commission_rate) in agents_data {
        let model = agent::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            phone: Set(None),
            region: Set(Some(region.to_string())),
            commission_rate: Set(commission_rate),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(db).await.map_err(ServiceError::DatabaseError)?;
    }

    info!("Seeded demo catalog and agent directory");
    Ok(())
}
