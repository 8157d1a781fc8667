//! In-memory repository implementations.
//!
//! These back the workflow and handler tests, and make it possible to run
//! the stack without Postgres. They honor the same contract as the Postgres
//! implementations, including the normalized not-found case.

use crate::{OrdersRepository, RepositoryError, StoreLocationsRepository};
use async_trait::async_trait;
use chrono::Utc;
use model::{NewOrder, Order, OrderChanges, OrderFilter, OrderPage, OrderStats, StoreLocation};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe in-memory order store.
///
/// Tracks insert attempts and can be switched into a failing mode so tests
/// can observe that validation failures never reach the store and that
/// persistence failures abort the workflow.
#[derive(Debug, Default)]
pub struct MemoryOrdersRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
    insert_attempts: AtomicUsize,
    fail_inserts: AtomicBool,
}

impl MemoryOrdersRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of insert calls made so far, including failed ones.
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    /// Make subsequent inserts fail with a not-found-shaped storage error.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    /// Seed an already-materialized order, e.g. a test fixture.
    pub async fn put(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }
}

fn matches(order: &Order, filter: &OrderFilter) -> bool {
    if filter.status.is_some_and(|s| s != order.status) {
        return false;
    }
    if filter
        .payment_status
        .is_some_and(|s| s != order.payment_status)
    {
        return false;
    }
    if filter
        .fulfillment_method
        .is_some_and(|f| f != order.fulfillment_method)
    {
        return false;
    }
    if let Some(q) = filter.search.as_deref().filter(|q| !q.trim().is_empty()) {
        let q = q.trim().to_lowercase();
        let hit = order.contact_name.to_lowercase().contains(&q)
            || order.contact_email.to_lowercase().contains(&q)
            || order
                .phone_model
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains(&q));
        if !hit {
            return false;
        }
    }
    true
}

#[async_trait]
impl OrdersRepository for MemoryOrdersRepository {
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::Invalid(
                "insert rejected by test configuration".into(),
            ));
        }

        let now = Utc::now();
        let persisted = Order {
            id: Uuid::new_v4(),
            order_number: order.order_number.clone(),
            phone_model: order.phone_model.clone(),
            case_type: order.case_type,
            design_image: order.design_image.clone(),
            original_image: order.original_image.clone(),
            adjustments: order.adjustments,
            fulfillment_method: order.fulfillment_method,
            delivery_address: order.delivery_address.clone(),
            contact_name: order.contact_name.clone(),
            contact_email: order.contact_email.clone(),
            contact_phone: order.contact_phone.clone(),
            store_location_id: order.store_location_id,
            amount: order.amount,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method.clone(),
            payment_transaction_id: order.payment_transaction_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.orders
            .write()
            .await
            .insert(persisted.id, persisted.clone());
        Ok(persisted)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError> {
        self.orders
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list(&self, filter: &OrderFilter) -> Result<OrderPage, RepositoryError> {
        let map = self.orders.read().await;
        let mut orders: Vec<Order> = map
            .values()
            .filter(|o| matches(o, filter))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = orders.len() as u64;
        let page: Vec<Order> = orders
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page() as usize)
            .collect();

        Ok(OrderPage {
            orders: page,
            total,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let map = self.orders.read().await;
        let mut orders: Vec<Order> = map.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update(&self, id: Uuid, changes: &OrderChanges) -> Result<Order, RepositoryError> {
        let mut map = self.orders.write().await;
        let order = map.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(status) = changes.status {
            order.status = status;
        }
        if let Some(payment_status) = changes.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(method) = &changes.payment_method {
            order.payment_method = Some(method.clone());
        }
        if let Some(txn) = &changes.payment_transaction_id {
            order.payment_transaction_id = Some(txn.clone());
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.orders
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let mut map = self.orders.write().await;
        let removed = map.len() as u64;
        map.clear();
        Ok(removed)
    }

    async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let map = self.orders.read().await;
        let today = Utc::now().date_naive();
        let mut stats = OrderStats::default();
        for order in map.values() {
            stats.total_orders += 1;
            if order.status == model::OrderStatus::Pending {
                stats.pending_orders += 1;
            }
            if order.payment_status == model::PaymentStatus::Completed {
                stats.revenue += order.amount;
            }
            if order.created_at.date_naive() == today {
                stats.orders_today += 1;
            }
        }
        Ok(stats)
    }
}

/// In-memory store location list, fixed at construction.
#[derive(Debug, Default)]
pub struct MemoryStoreLocationsRepository {
    locations: Vec<StoreLocation>,
}

impl MemoryStoreLocationsRepository {
    pub fn new(locations: Vec<StoreLocation>) -> Self {
        Self { locations }
    }
}

#[async_trait]
impl StoreLocationsRepository for MemoryStoreLocationsRepository {
    async fn list(&self) -> Result<Vec<StoreLocation>, RepositoryError> {
        Ok(self.locations.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<StoreLocation, RepositoryError> {
        self.locations
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn search(&self, text: &str) -> Result<Vec<StoreLocation>, RepositoryError> {
        let q = text.trim().to_lowercase();
        Ok(self
            .locations
            .iter()
            .filter(|l| {
                l.name.to_lowercase().contains(&q) || l.address.to_lowercase().contains(&q)
            })
            .cloned()
            .collect())
    }
}
