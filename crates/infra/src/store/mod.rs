//! Repository traits, one per collection, and the bundle services hold.
//!
//! Collections are independent: nothing here spans two repositories in one
//! transaction. The only multi-step atomicity offered is per-row (stock
//! reservation) and the bill-number sequence.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use flame_auth::User;
use flame_catalog::{Product, Review};
use flame_core::{NotificationId, OrderId, PaymentId, ProductId, ReviewId, UserId};
use flame_notifications::Notification;
use flame_sales::{Order, Payment};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed (connection, query, IO).
    #[error("store backend error in {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
    /// A stored row could not be turned back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// A unique key is already taken.
    #[error("{0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Reserved,
    Insufficient { available: i64 },
    Missing,
}

/// Outcome of adding units to a product.
#[derive(Debug, Clone, PartialEq)]
pub enum Restock {
    Restocked(Product),
    /// The new count would not fit; nothing was changed.
    Overflow { stock: i64 },
    Missing,
}

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn insert(&self, product: &Product) -> StoreResult<()>;
    async fn get(&self, id: ProductId) -> StoreResult<Option<Product>>;
    async fn list(&self) -> StoreResult<Vec<Product>>;
    /// Replace the stored row; `false` if it no longer exists.
    async fn update(&self, product: &Product) -> StoreResult<bool>;
    async fn delete(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// `stock -= qty, total_sold += qty` only if `stock >= qty`.
    async fn reserve_stock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<Reservation>;
    /// Undo a reservation made by [`ProductRepo::reserve_stock`].
    async fn release_stock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<()>;
    /// `stock -= qty, total_sold += qty` with no guard.
    async fn record_sale(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<()>;
    /// `stock += qty` unless the sum overflows.
    async fn restock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<Restock>;
}

#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Next value of the bill-number sequence (starts at 1).
    async fn next_bill_seq(&self) -> StoreResult<u64>;
    async fn insert(&self, order: &Order) -> StoreResult<()>;
    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>>;
    async fn get_by_bill(&self, bill_number: &str) -> StoreResult<Option<Order>>;
    async fn list(&self) -> StoreResult<Vec<Order>>;
    async fn update(&self, order: &Order) -> StoreResult<bool>;
    async fn delete(&self, id: OrderId) -> StoreResult<Option<Order>>;
}

#[async_trait]
pub trait PaymentRepo: Send + Sync {
    async fn insert(&self, payment: &Payment) -> StoreResult<()>;
    async fn get(&self, id: PaymentId) -> StoreResult<Option<Payment>>;
    /// The oldest payment recorded for `order`.
    async fn find_by_order(&self, order: OrderId) -> StoreResult<Option<Payment>>;
    async fn list(&self) -> StoreResult<Vec<Payment>>;
    async fn update(&self, payment: &Payment) -> StoreResult<bool>;
    async fn delete(&self, id: PaymentId) -> StoreResult<Option<Payment>>;
}

#[async_trait]
pub trait ReviewRepo: Send + Sync {
    async fn insert(&self, review: &Review) -> StoreResult<()>;
    async fn get(&self, id: ReviewId) -> StoreResult<Option<Review>>;
    async fn list(&self) -> StoreResult<Vec<Review>>;
    async fn list_for_product(&self, product: ProductId) -> StoreResult<Vec<Review>>;
    async fn update(&self, review: &Review) -> StoreResult<bool>;
    async fn delete(&self, id: ReviewId) -> StoreResult<Option<Review>>;
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn insert(&self, notification: &Notification) -> StoreResult<()>;
    async fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>>;
    async fn list(&self) -> StoreResult<Vec<Notification>>;
    async fn update(&self, notification: &Notification) -> StoreResult<bool>;
    async fn delete(&self, id: NotificationId) -> StoreResult<Option<Notification>>;
    /// Mark every unread notification read; returns how many changed.
    async fn mark_all_read(&self, now: DateTime<Utc>) -> StoreResult<u64>;
    async fn unread_count(&self) -> StoreResult<u64>;
    async fn has_open_low_stock_alert(&self, product: ProductId) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn insert(&self, user: &User) -> StoreResult<()>;
    async fn get(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list(&self) -> StoreResult<Vec<User>>;
    async fn update(&self, user: &User) -> StoreResult<bool>;
    async fn delete(&self, id: UserId) -> StoreResult<Option<User>>;
}

/// Every repository the services need, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepo>,
    pub orders: Arc<dyn OrderRepo>,
    pub payments: Arc<dyn PaymentRepo>,
    pub reviews: Arc<dyn ReviewRepo>,
    pub notifications: Arc<dyn NotificationRepo>,
    pub users: Arc<dyn UserRepo>,
}

impl Repositories {
    /// All six repositories served by one backend.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ProductRepo + OrderRepo + PaymentRepo + ReviewRepo + NotificationRepo + UserRepo + 'static,
    {
        Self {
            products: store.clone(),
            orders: store.clone(),
            payments: store.clone(),
            reviews: store.clone(),
            notifications: store.clone(),
            users: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }
}
