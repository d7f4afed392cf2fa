use axum::{extract::State, response::Json, routing::get, Router};

use crate::{errors::ServiceError, services::agents::AgentResponse, AppState};

/// Creates the router for the public agent directory
pub fn agents_routes() -> Router<AppState> {
    Router::new().route("/", get(list_agents))
}

/// List active sales agents
#[utoipa::path(
    get,
    path = "/api/v1/agents",
    summary = "List agents",
    description = "Active sales agents a buyer can attribute an order to. Public; contact details are not exposed.",
    responses(
        (status = 200, description = "Agents retrieved", body = [AgentResponse]),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Agents"
)]
pub async fn list_agents(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentResponse>>, ServiceError> {
    let agents = state.services.agents.list_active().await?;
    Ok(Json(agents))
}
