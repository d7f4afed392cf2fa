use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::agent::{self, Entity as AgentEntity},
    errors::ServiceError,
};

/// Public directory entry for an active sales agent. Contact details stay
/// internal; buyers only need enough to pick who gets the attribution.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentResponse {
    pub id: Uuid,
    pub name: String,
    pub region: Option<String>,
    pub commission_rate: Decimal,
}

/// Read-only access to the sales agent directory.
pub struct AgentService {
    db_pool: Arc<DbPool>,
}

impl AgentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Lists active agents for the checkout attribution dropdown.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<AgentResponse>, ServiceError> {
        let db = &*self.db_pool;
        let agents = AgentEntity::find()
            .filter(agent::Column::IsActive.eq(true))
            .order_by_asc(agent::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(agents
            .into_iter()
            .map(|a| AgentResponse {
                id: a.id,
                name: a.name,
                region: a.region,
                commission_rate: a.commission_rate,
            })
            .collect())
    }

    /// Resolves an agent reference submitted with an order. Unknown or
    /// deactivated agents are a validation failure of the submitted field,
    /// not a 404.
    #[instrument(skip(self), fields(agent_id = %agent_id))]
    pub async fn get_active_agent(&self, agent_id: Uuid) -> Result<agent::Model, ServiceError> {
        let db = &*self.db_pool;
        let found = AgentEntity::find_by_id(agent_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match found {
            Some(agent) if agent.is_active => Ok(agent),
            Some(_) => {
                warn!("Order submitted against a deactivated agent");
                Err(ServiceError::ValidationError(
                    "agent_id does not reference an active agent".to_string(),
                ))
            }
            None => Err(ServiceError::ValidationError(
                "agent_id does not reference an active agent".to_string(),
            )),
        }
    }
}
