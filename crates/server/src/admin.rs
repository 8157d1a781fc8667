//! Admin back-office routes. Everything here sits behind the
//! [`crate::auth::require_admin`] middleware.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use model::{Order, OrderChanges, OrderFilter};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// Confirmation token the client must echo back to wipe the orders table.
const CLEAR_ALL_CONFIRMATION: &str = "DELETE_ALL_ORDERS";

/// `GET /api/admin/dashboard-stats`
pub async fn handle_dashboard_stats(State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state.orders.stats().await?;
    Ok(Json(json!({ "success": true, "stats": stats })).into_response())
}

/// `GET /api/admin/orders`
pub async fn handle_list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Response, ApiError> {
    let page = state.orders.list(&filter).await?;
    Ok(Json(json!({
        "success": true,
        "orders": page.orders,
        "total": page.total,
        "page": page.page,
        "per_page": page.per_page,
    }))
    .into_response())
}

/// `GET /api/admin/orders/{id}`
pub async fn handle_get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let order = state.orders.get_by_id(id).await?;
    Ok(Json(json!({ "success": true, "order": order })).into_response())
}

/// `PUT /api/admin/orders/{id}/status`
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<OrderChanges>,
) -> Result<Response, ApiError> {
    if changes.is_empty() {
        return Err(ApiError::Validation(
            "at least one of status, payment_status, payment_method or payment_transaction_id is required".into(),
        ));
    }
    let order = state.orders.update(id, &changes).await?;
    info!(order_id = %id, "Updated order from back-office");
    Ok(Json(json!({ "success": true, "order": order })).into_response())
}

/// `DELETE /api/admin/orders/{id}`
pub async fn handle_delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.orders.delete(id).await?;
    info!(order_id = %id, "Deleted order from back-office");
    Ok(Json(json!({ "success": true })).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearAllRequest {
    #[serde(default)]
    pub confirm: Option<String>,
}

/// `DELETE /api/admin/orders/clear-all`
///
/// Destructive bulk delete; requires the exact confirmation token in the
/// request body so a stray client call cannot wipe the table.
pub async fn handle_clear_all(
    State(state): State<AppState>,
    Json(request): Json<ClearAllRequest>,
) -> Result<Response, ApiError> {
    if request.confirm.as_deref() != Some(CLEAR_ALL_CONFIRMATION) {
        return Err(ApiError::Validation(format!(
            "confirmation required: send {{\"confirm\": \"{CLEAR_ALL_CONFIRMATION}\"}}"
        )));
    }
    let deleted = state.orders.delete_all().await?;
    info!(deleted, "Cleared all orders from back-office");
    Ok(Json(json!({ "success": true, "deleted": deleted })).into_response())
}

/// `GET /api/admin/orders/export`
pub async fn handle_export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let orders = state.orders.list_all().await?;
    let csv = orders_to_csv(&orders)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"orders.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

/// Renders orders as CSV with a fixed header row.
fn orders_to_csv(orders: &[Order]) -> Result<String, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "ID",
            "Customer Name",
            "Email",
            "Phone",
            "Phone Model",
            "Case Type",
            "Amount",
            "Status",
            "Payment Status",
            "Fulfillment Method",
            "Created At",
        ])
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    for order in orders {
        writer
            .write_record([
                order.id.to_string(),
                order.contact_name.clone(),
                order.contact_email.clone(),
                order.contact_phone.clone().unwrap_or_default(),
                order.phone_model.clone().unwrap_or_default(),
                order.case_type.to_string(),
                format!("{:.2}", order.amount),
                order.status.to_string(),
                order.payment_status.to_string(),
                order.fulfillment_method.to_string(),
                order.created_at.to_rfc3339(),
            ])
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ApiError::Internal(e.to_string()))
}
