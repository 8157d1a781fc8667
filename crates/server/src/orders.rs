//! Public storefront routes: direct order submission and store locations.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use model::{parse_address, OrderSubmission, StoreLocation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// `POST /api/orders` — submission without an attached payment.
pub async fn handle_submit_order(
    State(state): State<AppState>,
    Json(submission): Json<OrderSubmission>,
) -> Result<Response, ApiError> {
    let submitted = state.workflow.submit_order(submission).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order received",
            "order": submitted.order,
            "notifications": submitted.notifications,
        })),
    )
        .into_response())
}

/// Store location enriched with the address split into display parts.
#[derive(Debug, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: StoreLocation,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl From<StoreLocation> for LocationView {
    fn from(location: StoreLocation) -> Self {
        let parsed = parse_address(&location.address);
        Self {
            location,
            city: parsed.city,
            state: parsed.state,
            zip: parsed.zip,
        }
    }
}

/// `GET /api/locations`
pub async fn handle_list_locations(
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let locations: Vec<LocationView> = state
        .locations
        .list()
        .await?
        .into_iter()
        .map(LocationView::from)
        .collect();
    Ok(Json(json!({ "success": true, "locations": locations })).into_response())
}

/// `GET /api/locations/{id}`
pub async fn handle_get_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let location = state.locations.get_by_id(id).await?;
    Ok(Json(json!({ "success": true, "location": LocationView::from(location) })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/locations/search?q=...`
pub async fn handle_search_locations(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let term = query.q.trim();
    if term.is_empty() {
        return Err(ApiError::Validation("q must not be empty".into()));
    }
    let locations: Vec<LocationView> = state
        .locations
        .search(term)
        .await?
        .into_iter()
        .map(LocationView::from)
        .collect();
    Ok(Json(json!({ "success": true, "locations": locations })).into_response())
}
