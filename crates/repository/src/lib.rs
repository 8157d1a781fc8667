//! # Data Repository Layer
//!
//! This module provides repository traits and PostgreSQL implementations
//! for the persisted entities: orders and store locations.
//! Datastore errors are surfaced untranslated except for the normalized
//! not-found case on by-id lookups.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use model::{
    FulfillmentMethod, NewOrder, Order, OrderChanges, OrderFilter, OrderPage, OrderStats,
    StoreLocation,
};
use std::str::FromStr;
use thiserror::Error;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use uuid::Uuid;

mod memory;

pub use memory::{MemoryOrdersRepository, MemoryStoreLocationsRepository};

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// No result found.
    #[error("Not found")]
    NotFound,
    /// A stored value could not be mapped back to a domain type.
    #[error("Invalid stored value: {0}")]
    Invalid(String),
}

/// # OrdersRepository
///
/// Repository interface for managing orders: insertion at checkout,
/// by-id lookup, filtered/paginated listing, partial update, deletion,
/// guarded bulk deletion, and dashboard aggregates.
///
/// Implementations of this trait provide specific storage mechanisms,
/// such as PostgreSQL database access.
#[async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Insert a normalized order record; the datastore assigns the id.
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Get an order by its id.
    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError>;

    /// List orders, newest first, honoring the filter's pagination.
    async fn list(&self, filter: &OrderFilter) -> Result<OrderPage, RepositoryError>;

    /// List every order, newest first. Backs the CSV export.
    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError>;

    /// Apply a partial update and return the updated order.
    async fn update(&self, id: Uuid, changes: &OrderChanges) -> Result<Order, RepositoryError>;

    /// Delete a single order.
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Delete every order, returning the number of rows removed.
    /// The confirmation guard lives at the HTTP boundary, not here.
    async fn delete_all(&self) -> Result<u64, RepositoryError>;

    /// Aggregate counts and revenue for the admin dashboard.
    async fn stats(&self) -> Result<OrderStats, RepositoryError>;
}

/// # StoreLocationsRepository
///
/// Repository interface for read-mostly pickup point reference data.
#[async_trait]
pub trait StoreLocationsRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<StoreLocation>, RepositoryError>;
    async fn get_by_id(&self, id: Uuid) -> Result<StoreLocation, RepositoryError>;
    async fn search(&self, text: &str) -> Result<Vec<StoreLocation>, RepositoryError>;
}

const ORDER_COLUMNS: &str = "id, order_number, phone_model, case_type, design_image, \
     original_image, brightness, contrast, saturation, blur, fulfillment_method, \
     delivery_address, contact_name, contact_email, contact_phone, store_location_id, \
     amount, status, payment_status, payment_method, payment_transaction_id, \
     created_at, updated_at";

fn order_from_row(row: &Row) -> Result<Order, RepositoryError> {
    let case_type: String = row.get("case_type");
    let fulfillment: String = row.get("fulfillment_method");
    let status: String = row.get("status");
    let payment_status: String = row.get("payment_status");

    Ok(Order {
        id: row.get("id"),
        order_number: row.get("order_number"),
        phone_model: row.get("phone_model"),
        case_type: model::CaseType::from_str(&case_type).map_err(RepositoryError::Invalid)?,
        design_image: row.get("design_image"),
        original_image: row.get("original_image"),
        adjustments: model::ImageAdjustments {
            brightness: row.get("brightness"),
            contrast: row.get("contrast"),
            saturation: row.get("saturation"),
            blur: row.get("blur"),
        },
        fulfillment_method: FulfillmentMethod::from_str(&fulfillment)
            .map_err(RepositoryError::Invalid)?,
        delivery_address: row.get("delivery_address"),
        contact_name: row.get("contact_name"),
        contact_email: row.get("contact_email"),
        contact_phone: row.get("contact_phone"),
        store_location_id: row.get("store_location_id"),
        amount: row.get("amount"),
        status: model::OrderStatus::from_str(&status).map_err(RepositoryError::Invalid)?,
        payment_status: model::PaymentStatus::from_str(&payment_status)
            .map_err(RepositoryError::Invalid)?,
        payment_method: row.get("payment_method"),
        payment_transaction_id: row.get("payment_transaction_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// PostgreSQL implementation of the OrdersRepository trait.
///
/// Holds a shared connection pool; safe to clone across request handlers.
#[derive(Clone)]
pub struct PgOrdersRepository {
    pool: Pool,
}

impl PgOrdersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrdersRepository for PgOrdersRepository {
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            r#"
            INSERT INTO orders (
                order_number, phone_model, case_type, design_image, original_image,
                brightness, contrast, saturation, blur, fulfillment_method,
                delivery_address, contact_name, contact_email, contact_phone,
                store_location_id, amount, status, payment_status, payment_method,
                payment_transaction_id
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20)
            RETURNING {ORDER_COLUMNS}
        "#
        );
        let row = client
            .query_one(
                &query,
                &[
                    &order.order_number,
                    &order.phone_model,
                    &order.case_type.as_str(),
                    &order.design_image,
                    &order.original_image,
                    &order.adjustments.brightness,
                    &order.adjustments.contrast,
                    &order.adjustments.saturation,
                    &order.adjustments.blur,
                    &order.fulfillment_method.as_str(),
                    &order.delivery_address,
                    &order.contact_name,
                    &order.contact_email,
                    &order.contact_phone,
                    &order.store_location_id,
                    &order.amount,
                    &order.status.as_str(),
                    &order.payment_status.as_str(),
                    &order.payment_method,
                    &order.payment_transaction_id,
                ],
            )
            .await?;
        order_from_row(&row)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        match client.query_opt(&query, &[&id]).await? {
            Some(row) => order_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list(&self, filter: &OrderFilter) -> Result<OrderPage, RepositoryError> {
        let client = self.pool.get().await?;

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

        let status;
        if let Some(s) = filter.status {
            status = s.as_str();
            clauses.push(format!("status = ${}", params.len() + 1));
            params.push(&status);
        }
        let payment_status;
        if let Some(s) = filter.payment_status {
            payment_status = s.as_str();
            clauses.push(format!("payment_status = ${}", params.len() + 1));
            params.push(&payment_status);
        }
        let fulfillment;
        if let Some(f) = filter.fulfillment_method {
            fulfillment = f.as_str();
            clauses.push(format!("fulfillment_method = ${}", params.len() + 1));
            params.push(&fulfillment);
        }
        let pattern;
        if let Some(q) = filter.search.as_deref().filter(|q| !q.trim().is_empty()) {
            pattern = format!("%{}%", q.trim());
            let n = params.len() + 1;
            clauses.push(format!(
                "(contact_name ILIKE ${n} OR contact_email ILIKE ${n} OR phone_model ILIKE ${n})"
            ));
            params.push(&pattern);
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let count_query = format!("SELECT count(*) FROM orders{where_sql}");
        let total: i64 = client.query_one(&count_query, &params).await?.get(0);

        let limit = filter.per_page() as i64;
        let offset = filter.offset() as i64;
        let page_query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{where_sql} ORDER BY created_at DESC \
             LIMIT ${} OFFSET ${}",
            params.len() + 1,
            params.len() + 2
        );
        params.push(&limit);
        params.push(&offset);

        let rows = client.query(&page_query, &params).await?;
        let orders = rows
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderPage {
            orders,
            total: total as u64,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        let rows = client.query(&query, &[]).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn update(&self, id: Uuid, changes: &OrderChanges) -> Result<Order, RepositoryError> {
        let client = self.pool.get().await?;

        let mut sets = vec!["updated_at = now()".to_string()];
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

        let status;
        if let Some(s) = changes.status {
            status = s.as_str();
            params.push(&status);
            sets.push(format!("status = ${}", params.len()));
        }
        let payment_status;
        if let Some(s) = changes.payment_status {
            payment_status = s.as_str();
            params.push(&payment_status);
            sets.push(format!("payment_status = ${}", params.len()));
        }
        if let Some(method) = &changes.payment_method {
            params.push(method);
            sets.push(format!("payment_method = ${}", params.len()));
        }
        if let Some(txn) = &changes.payment_transaction_id {
            params.push(txn);
            sets.push(format!("payment_transaction_id = ${}", params.len()));
        }

        params.push(&id);
        let query = format!(
            "UPDATE orders SET {} WHERE id = ${} RETURNING {ORDER_COLUMNS}",
            sets.join(", "),
            params.len()
        );

        match client.query_opt(&query, &params).await? {
            Some(row) => order_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM orders WHERE id = $1", &[&id])
            .await?;
        if deleted == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let client = self.pool.get().await?;
        let deleted = client.execute("DELETE FROM orders", &[]).await?;
        Ok(deleted)
    }

    async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                SELECT
                    count(*) AS total_orders,
                    count(*) FILTER (WHERE status = 'pending') AS pending_orders,
                    coalesce(sum(amount) FILTER (WHERE payment_status = 'completed'), 0)
                        AS revenue,
                    count(*) FILTER (WHERE created_at >= date_trunc('day', now()))
                        AS orders_today
                FROM orders
            "#,
                &[],
            )
            .await?;

        let total: i64 = row.get("total_orders");
        let pending: i64 = row.get("pending_orders");
        let today: i64 = row.get("orders_today");
        Ok(OrderStats {
            total_orders: total as u64,
            pending_orders: pending as u64,
            revenue: row.get("revenue"),
            orders_today: today as u64,
        })
    }
}

fn location_from_row(row: &Row) -> StoreLocation {
    StoreLocation {
        id: row.get("id"),
        name: row.get("name"),
        address: row.get("address"),
        phone: row.get("phone"),
        hours: row.get("hours"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
    }
}

/// PostgreSQL implementation of the StoreLocationsRepository trait.
#[derive(Clone)]
pub struct PgStoreLocationsRepository {
    pool: Pool,
}

impl PgStoreLocationsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoreLocationsRepository for PgStoreLocationsRepository {
    async fn list(&self) -> Result<Vec<StoreLocation>, RepositoryError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, name, address, phone, hours, latitude, longitude \
                 FROM store_locations ORDER BY name",
                &[],
            )
            .await?;
        Ok(rows.iter().map(location_from_row).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<StoreLocation, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, name, address, phone, hours, latitude, longitude \
                 FROM store_locations WHERE id = $1",
                &[&id],
            )
            .await?;
        match row {
            Some(row) => Ok(location_from_row(&row)),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn search(&self, text: &str) -> Result<Vec<StoreLocation>, RepositoryError> {
        let client = self.pool.get().await?;
        let pattern = format!("%{}%", text.trim());
        let rows = client
            .query(
                "SELECT id, name, address, phone, hours, latitude, longitude \
                 FROM store_locations \
                 WHERE name ILIKE $1 OR address ILIKE $1 ORDER BY name",
                &[&pattern],
            )
            .await?;
        Ok(rows.iter().map(location_from_row).collect())
    }
}
