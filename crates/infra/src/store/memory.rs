use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use flame_auth::User;
use flame_catalog::{Product, Review};
use flame_core::{NotificationId, OrderId, PaymentId, ProductId, ReviewId, UserId};
use flame_notifications::Notification;
use flame_sales::{Order, Payment};

use super::{
    NotificationRepo, OrderRepo, PaymentRepo, ProductRepo, Reservation, Restock, ReviewRepo, StoreError,
    StoreResult, UserRepo,
};

/// In-memory store for tests and dev runs. Data lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: RwLock<HashMap<ProductId, Product>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    payments: RwLock<HashMap<PaymentId, Payment>>,
    reviews: RwLock<HashMap<ReviewId, Review>>,
    notifications: RwLock<HashMap<NotificationId, Notification>>,
    users: RwLock<HashMap<UserId, User>>,
    bill_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lists come back in creation order, like the Postgres store's.
fn oldest_first<'a, V: Clone + 'a, K: Ord>(values: impl Iterator<Item = &'a V>, key: impl Fn(&V) -> K) -> Vec<V> {
    let mut all: Vec<V> = values.cloned().collect();
    all.sort_by_key(|v| key(v));
    all
}

fn replace<K: Eq + std::hash::Hash, V: Clone>(map: &mut HashMap<K, V>, key: K, value: &V) -> bool {
    match map.get_mut(&key) {
        Some(slot) => {
            *slot = value.clone();
            true
        }
        None => false,
    }
}

#[async_trait]
impl ProductRepo for MemoryStore {
    async fn insert(&self, product: &Product) -> StoreResult<()> {
        self.products.write().await.insert(product.id, product.clone());
        Ok(())
    }

    async fn get(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Product>> {
        Ok(oldest_first(self.products.read().await.values(), |v| (v.created_at, v.id)))
    }

    async fn update(&self, product: &Product) -> StoreResult<bool> {
        Ok(replace(&mut *self.products.write().await, product.id, product))
    }

    async fn delete(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.products.write().await.remove(&id))
    }

    async fn reserve_stock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<Reservation> {
        let mut products = self.products.write().await;
        let Some(p) = products.get_mut(&id) else {
            return Ok(Reservation::Missing);
        };
        if p.stock < qty {
            return Ok(Reservation::Insufficient { available: p.stock });
        }
        p.stock -= qty;
        p.total_sold = p.total_sold.saturating_add(qty);
        p.updated_at = now;
        Ok(Reservation::Reserved)
    }

    async fn release_stock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(p) = self.products.write().await.get_mut(&id) {
            p.stock += qty;
            p.total_sold -= qty;
            p.updated_at = now;
        }
        Ok(())
    }

    async fn record_sale(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(p) = self.products.write().await.get_mut(&id) {
            p.stock -= qty;
            p.total_sold = p.total_sold.saturating_add(qty);
            p.updated_at = now;
        }
        Ok(())
    }

    async fn restock(&self, id: ProductId, qty: i64, now: DateTime<Utc>) -> StoreResult<Restock> {
        let mut products = self.products.write().await;
        let Some(p) = products.get_mut(&id) else {
            return Ok(Restock::Missing);
        };
        let Some(stock) = p.stock.checked_add(qty) else {
            return Ok(Restock::Overflow { stock: p.stock });
        };
        p.stock = stock;
        p.updated_at = now;
        Ok(Restock::Restocked(p.clone()))
    }
}

#[async_trait]
impl OrderRepo for MemoryStore {
    async fn next_bill_seq(&self) -> StoreResult<u64> {
        Ok(self.bill_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.values().any(|o| o.bill_number == order.bill_number) {
            return Err(StoreError::Duplicate(format!(
                "Bill number {} already exists",
                order.bill_number
            )));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn get_by_bill(&self, bill_number: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.bill_number.as_str() == bill_number)
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Order>> {
        Ok(oldest_first(self.orders.read().await.values(), |v| (v.created_at, v.id)))
    }

    async fn update(&self, order: &Order) -> StoreResult<bool> {
        Ok(replace(&mut *self.orders.write().await, order.id, order))
    }

    async fn delete(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.orders.write().await.remove(&id))
    }
}

#[async_trait]
impl PaymentRepo for MemoryStore {
    async fn insert(&self, payment: &Payment) -> StoreResult<()> {
        self.payments.write().await.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn find_by_order(&self, order: OrderId) -> StoreResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .filter(|p| p.order_id == order)
            .min_by_key(|p| (p.created_at, p.id))
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Payment>> {
        Ok(oldest_first(self.payments.read().await.values(), |v| (v.created_at, v.id)))
    }

    async fn update(&self, payment: &Payment) -> StoreResult<bool> {
        Ok(replace(&mut *self.payments.write().await, payment.id, payment))
    }

    async fn delete(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        Ok(self.payments.write().await.remove(&id))
    }
}

#[async_trait]
impl ReviewRepo for MemoryStore {
    async fn insert(&self, review: &Review) -> StoreResult<()> {
        self.reviews.write().await.insert(review.id, review.clone());
        Ok(())
    }

    async fn get(&self, id: ReviewId) -> StoreResult<Option<Review>> {
        Ok(self.reviews.read().await.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Review>> {
        Ok(oldest_first(self.reviews.read().await.values(), |v| (v.created_at, v.id)))
    }

    async fn list_for_product(&self, product: ProductId) -> StoreResult<Vec<Review>> {
        Ok(oldest_first(
            self.reviews.read().await.values().filter(|r| r.product_id == product),
            |r| (r.created_at, r.id),
        ))
    }

    async fn update(&self, review: &Review) -> StoreResult<bool> {
        Ok(replace(&mut *self.reviews.write().await, review.id, review))
    }

    async fn delete(&self, id: ReviewId) -> StoreResult<Option<Review>> {
        Ok(self.reviews.write().await.remove(&id))
    }
}

#[async_trait]
impl NotificationRepo for MemoryStore {
    async fn insert(&self, notification: &Notification) -> StoreResult<()> {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        Ok(self.notifications.read().await.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Notification>> {
        Ok(oldest_first(self.notifications.read().await.values(), |v| (v.created_at, v.id)))
    }

    async fn update(&self, notification: &Notification) -> StoreResult<bool> {
        Ok(replace(
            &mut *self.notifications.write().await,
            notification.id,
            notification,
        ))
    }

    async fn delete(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        Ok(self.notifications.write().await.remove(&id))
    }

    async fn mark_all_read(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut changed = 0;
        for n in self.notifications.write().await.values_mut().filter(|n| !n.is_read) {
            n.mark_read(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn unread_count(&self) -> StoreResult<u64> {
        Ok(self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| !n.is_read)
            .count() as u64)
    }

    async fn has_open_low_stock_alert(&self, product: ProductId) -> StoreResult<bool> {
        Ok(self
            .notifications
            .read()
            .await
            .values()
            .any(|n| n.is_open_low_stock_alert(product)))
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("Email already registered".into()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(oldest_first(self.users.read().await.values(), |v| (v.created_at, v.id)))
    }

    async fn update(&self, user: &User) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(StoreError::Duplicate("Email already registered".into()));
        }
        Ok(replace(&mut *users, user.id, user))
    }

    async fn delete(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.write().await.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_catalog::NewProduct;

    fn product(stock: i64) -> Product {
        Product::create(
            NewProduct {
                name: Some("Ruslan".into()),
                category: Some("vodka".into()),
                price: Some(12.0),
                stock: Some(stock),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn reservation_is_conditional() {
        let store = MemoryStore::new();
        let p = product(3);
        ProductRepo::insert(&store, &p).await.unwrap();

        let now = Utc::now();
        assert_eq!(
            store.reserve_stock(p.id, 5, now).await.unwrap(),
            Reservation::Insufficient { available: 3 }
        );
        assert_eq!(store.reserve_stock(p.id, 2, now).await.unwrap(), Reservation::Reserved);
        assert_eq!(
            store.reserve_stock(ProductId::new(), 1, now).await.unwrap(),
            Reservation::Missing
        );

        let after = ProductRepo::get(&store, p.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 1);
        assert_eq!(after.total_sold, 2);

        store.release_stock(p.id, 2, now).await.unwrap();
        let restored = ProductRepo::get(&store, p.id).await.unwrap().unwrap();
        assert_eq!((restored.stock, restored.total_sold), (3, 0));
    }

    #[tokio::test]
    async fn restock_refuses_to_overflow() {
        let store = MemoryStore::new();
        let p = product(5);
        ProductRepo::insert(&store, &p).await.unwrap();

        let now = Utc::now();
        assert_eq!(
            store.restock(p.id, i64::MAX, now).await.unwrap(),
            Restock::Overflow { stock: 5 }
        );
        assert_eq!(ProductRepo::get(&store, p.id).await.unwrap().unwrap().stock, 5);

        match store.restock(p.id, 10, now).await.unwrap() {
            Restock::Restocked(updated) => assert_eq!(updated.stock, 15),
            other => panic!("expected a restock, got {other:?}"),
        }
        assert_eq!(store.restock(ProductId::new(), 1, now).await.unwrap(), Restock::Missing);
    }

    #[tokio::test]
    async fn bill_sequence_is_monotonic() {
        let store = MemoryStore::new();
        assert_eq!(store.next_bill_seq().await.unwrap(), 1);
        assert_eq!(store.next_bill_seq().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_reservations_never_oversell() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let p = product(10);
        ProductRepo::insert(&*store, &p).await.unwrap();

        let id = p.id;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.reserve_stock(id, 3, Utc::now()).await.unwrap()
            }));
        }
        let mut reserved = 0;
        for h in handles {
            if h.await.unwrap() == Reservation::Reserved {
                reserved += 1;
            }
        }
        assert_eq!(reserved, 3);
        assert_eq!(ProductRepo::get(&*store, id).await.unwrap().unwrap().stock, 1);
    }
}
