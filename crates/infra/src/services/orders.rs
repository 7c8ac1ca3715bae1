//! Order placement and the side effects that hang off it.
//!
//! Placement checks every line before touching anything, so a shortfall on
//! any line leaves the store untouched. After that the chain is
//! reserve stock, allocate a bill number, persist the order, record its
//! payment, emit the "New Order" notification. Collections are separate, so
//! a store failure after the order row is written leaves the earlier steps
//! in place; that case is logged at `warn`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use flame_catalog::Product;
use flame_core::{DomainError, OrderId, Page, PageRequest, ProductId, SortOrder};
use flame_notifications::Notification;
use flame_sales::{
    price_line, BillNumber, Customer, NewOrder, Order, OrderFilter, OrderItem, OrderStatus, Payment,
    PaymentMethod, PaymentStatus,
};

use super::{sort_records, ProductSummary, ServiceResult, SortKey};
use crate::config::StockReservation;
use crate::store::{Repositories, Reservation};

/// An order line with the product it refers to, when that still exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub bill_number: BillNumber,
    pub customer: Customer,
    pub items: Vec<OrderItemView>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    fn new(order: Order, products: &HashMap<ProductId, ProductSummary>) -> Self {
        let items = order
            .items
            .into_iter()
            .map(|item| OrderItemView {
                product: products.get(&item.product_id).cloned(),
                item,
            })
            .collect();
        Self {
            id: order.id,
            bill_number: order.bill_number,
            customer: order.customer,
            items,
            total_amount: order.total_amount,
            status: order.status,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

fn order_sort_key(o: &Order, field: &str) -> Option<SortKey> {
    Some(match field {
        "createdAt" => o.created_at.into(),
        "updatedAt" => o.updated_at.into(),
        "billNumber" => o.bill_number.as_str().into(),
        "totalAmount" => o.total_amount.into(),
        "status" => o.status.as_str().into(),
        "paymentMethod" => o.payment_method.as_str().into(),
        "paymentStatus" => o.payment_status.as_str().into(),
        _ => return None,
    })
}

#[derive(Clone)]
pub struct OrderService {
    repos: Repositories,
    reservation: StockReservation,
}

impl OrderService {
    pub fn new(repos: Repositories, reservation: StockReservation) -> Self {
        Self { repos, reservation }
    }

    pub async fn list(&self, filter: &OrderFilter, page: &PageRequest) -> ServiceResult<Page<OrderView>> {
        let mut orders: Vec<Order> = self
            .repos
            .orders
            .list()
            .await?
            .into_iter()
            .filter(|o| filter.matches(o))
            .collect();
        sort_records(&mut orders, page, ("createdAt", SortOrder::Desc), order_sort_key);
        let page = Page::from_sorted(orders, page);
        let items = self.populate(page.items).await?;
        Ok(Page {
            items,
            pagination: page.pagination,
        })
    }

    pub async fn get(&self, id: OrderId) -> ServiceResult<OrderView> {
        let order = self.load(id).await?;
        self.populate_one(order).await
    }

    pub async fn get_by_bill(&self, bill_number: &str) -> ServiceResult<OrderView> {
        let order = self
            .repos
            .orders
            .get_by_bill(bill_number)
            .await?
            .ok_or_else(|| DomainError::not_found("Order"))?;
        self.populate_one(order).await
    }

    #[instrument(skip(self, input), err)]
    pub async fn place(&self, input: NewOrder) -> ServiceResult<OrderView> {
        let now = Utc::now();
        let order = input.validate()?;
        let demand = order.demand()?;

        // First appearance order, so errors name the earliest failing line.
        let mut seen = HashSet::new();
        let mut wanted: Vec<(ProductId, i64)> = Vec::new();
        for line in &order.lines {
            if seen.insert(line.product_id) {
                wanted.push((line.product_id, demand[&line.product_id]));
            }
        }

        let mut products: HashMap<ProductId, Product> = HashMap::new();
        for &(id, qty) in &wanted {
            let product = self
                .repos
                .products
                .get(id)
                .await?
                .ok_or_else(|| DomainError::not_found("Product"))?;
            if product.stock < qty {
                return Err(DomainError::insufficient_stock(&product.name, product.stock, qty).into());
            }
            products.insert(id, product);
        }

        let items: Vec<OrderItem> = order
            .lines
            .iter()
            .map(|line| {
                let p = &products[&line.product_id];
                price_line(p.id, p.name.clone(), p.unit_price(), line.quantity)
            })
            .collect();

        match self.reservation {
            StockReservation::Atomic => self.reserve_all(&wanted, &products, now).await?,
            StockReservation::Legacy => {}
        }

        let seq = self.repos.orders.next_bill_seq().await?;
        let placed = Order::place(order.customer, items, order.payment_method, BillNumber::for_time(now, seq), now)?;
        if let Err(err) = self.repos.orders.insert(&placed).await {
            if self.reservation == StockReservation::Atomic {
                self.release_all(&wanted, now).await;
            }
            return Err(err.into());
        }
        info!(order_id = %placed.id, bill_number = %placed.bill_number, total = placed.total_amount, "order created");

        if self.reservation == StockReservation::Legacy {
            for &(id, qty) in &wanted {
                if let Err(err) = self.repos.products.record_sale(id, qty, now).await {
                    warn!(order_id = %placed.id, product_id = %id, error = %err, "order persisted but stock decrement failed");
                    return Err(err.into());
                }
            }
        }

        let payment = Payment::for_order(&placed, now);
        if let Err(err) = self.repos.payments.insert(&payment).await {
            warn!(order_id = %placed.id, error = %err, "order persisted without its payment");
            return Err(err.into());
        }
        info!(payment_id = %payment.id, status = payment.status.as_str(), "payment created");

        let notice = Notification::new_order(&placed, now);
        if let Err(err) = self.repos.notifications.insert(&notice).await {
            warn!(order_id = %placed.id, error = %err, "order persisted without its notification");
            return Err(err.into());
        }
        info!(notification_id = %notice.id, "new order notification emitted");

        let summaries = products.values().map(|p| (p.id, ProductSummary::from(p))).collect();
        Ok(OrderView::new(placed, &summaries))
    }

    /// Any status may follow any other. Moving to `completed` forces the
    /// order's payment to completed as well.
    #[instrument(skip(self), err)]
    pub async fn update_status(&self, id: OrderId, status: Option<String>) -> ServiceResult<OrderView> {
        let status: OrderStatus = status
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DomainError::validation("Status is required"))?
            .parse()?;
        let now = Utc::now();
        let mut order = self.load(id).await?;
        order.status = status;
        order.updated_at = now;
        if !self.repos.orders.update(&order).await? {
            return Err(DomainError::not_found("Order").into());
        }
        info!(order_id = %id, status = status.as_str(), "order status updated");

        if status == OrderStatus::Completed {
            match self.repos.payments.find_by_order(id).await? {
                Some(mut payment) => {
                    let previous = payment.set_status(PaymentStatus::Completed, now);
                    self.repos.payments.update(&payment).await?;
                    info!(payment_id = %payment.id, previous = previous.as_str(), "payment completed with its order");
                }
                None => warn!(order_id = %id, "completed order has no payment"),
            }
        }
        self.populate_one(order).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: OrderId) -> ServiceResult<Order> {
        let order = self
            .repos
            .orders
            .delete(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order"))?;
        info!(order_id = %id, "order deleted");
        Ok(order)
    }

    async fn reserve_all(
        &self,
        wanted: &[(ProductId, i64)],
        products: &HashMap<ProductId, Product>,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        for (done, &(id, qty)) in wanted.iter().enumerate() {
            let outcome = self.repos.products.reserve_stock(id, qty, now).await;
            let err: super::ServiceError = match outcome {
                Ok(Reservation::Reserved) => {
                    info!(product_id = %id, quantity = qty, "stock reserved");
                    continue;
                }
                Ok(Reservation::Insufficient { available }) => {
                    let name = products.get(&id).map(|p| p.name.as_str()).unwrap_or_default();
                    DomainError::insufficient_stock(name, available, qty).into()
                }
                Ok(Reservation::Missing) => DomainError::not_found("Product").into(),
                Err(e) => e.into(),
            };
            self.release_all(&wanted[..done], now).await;
            return Err(err);
        }
        Ok(())
    }

    async fn release_all(&self, reserved: &[(ProductId, i64)], now: DateTime<Utc>) {
        for &(id, qty) in reserved {
            if let Err(err) = self.repos.products.release_stock(id, qty, now).await {
                warn!(product_id = %id, quantity = qty, error = %err, "failed to release reserved stock");
            }
        }
    }

    async fn load(&self, id: OrderId) -> ServiceResult<Order> {
        Ok(self
            .repos
            .orders
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order"))?)
    }

    async fn populate_one(&self, order: Order) -> ServiceResult<OrderView> {
        let mut views = self.populate(vec![order]).await?;
        views.pop().ok_or_else(|| DomainError::not_found("Order").into())
    }

    async fn populate(&self, orders: Vec<Order>) -> ServiceResult<Vec<OrderView>> {
        let mut summaries: HashMap<ProductId, ProductSummary> = HashMap::new();
        let mut missing: HashSet<ProductId> = HashSet::new();
        for item in orders.iter().flat_map(|o| o.items.iter()) {
            let id = item.product_id;
            if summaries.contains_key(&id) || missing.contains(&id) {
                continue;
            }
            match self.repos.products.get(id).await? {
                Some(p) => {
                    summaries.insert(id, ProductSummary::from(&p));
                }
                None => {
                    missing.insert(id);
                }
            }
        }
        Ok(orders.into_iter().map(|o| OrderView::new(o, &summaries)).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use chrono::Datelike;
    use flame_catalog::NewProduct;
    use flame_notifications::NotificationKind;
    use flame_sales::{NewCustomer, NewOrderLine};

    use crate::services::ErrorClass;

    async fn stocked(repos: &Repositories, name: &str, price: f64, stock: i64) -> Product {
        let p = Product::create(
            NewProduct {
                name: Some(name.into()),
                category: Some("beer".into()),
                price: Some(price),
                stock: Some(stock),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        repos.products.insert(&p).await.unwrap();
        p
    }

    fn request(lines: &[(ProductId, i64)], method: &str) -> NewOrder {
        NewOrder {
            customer: Some(NewCustomer {
                full_name: Some("Sita Sharma".into()),
                mobile: Some("9800000000".into()),
                pan_number: None,
                location: Some("Lalitpur".into()),
            }),
            items: lines
                .iter()
                .map(|(id, qty)| NewOrderLine {
                    product_id: Some(id.to_string()),
                    quantity: Some(*qty),
                })
                .collect(),
            payment_method: Some(method.into()),
        }
    }

    async fn product(repos: &Repositories, id: ProductId) -> Product {
        repos.products.get(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn totals_are_sums_of_line_totals() {
        let repos = Repositories::in_memory();
        let svc = OrderService::new(repos.clone(), StockReservation::Atomic);
        let beer = stocked(&repos, "Gorkha", 250.0, 50).await;
        let rum = stocked(&repos, "Khukri", 900.0, 50).await;

        let view = svc.place(request(&[(beer.id, 3), (rum.id, 2)], "COD")).await.unwrap();
        assert_eq!(view.items[0].item.total, 750.0);
        assert_eq!(view.items[1].item.total, 1800.0);
        assert_eq!(view.total_amount, 2550.0);
        assert_eq!(view.items[0].product.as_ref().unwrap().name, "Gorkha");
    }

    #[tokio::test]
    async fn shortfall_fails_without_mutating_anything() {
        for mode in [StockReservation::Atomic, StockReservation::Legacy] {
            let repos = Repositories::in_memory();
            let svc = OrderService::new(repos.clone(), mode);
            let p = stocked(&repos, "Tuborg", 300.0, 3).await;

            let err = svc.place(request(&[(p.id, 5)], "COD")).await.unwrap_err();
            assert_eq!(err.to_string(), "Insufficient stock for Tuborg. Available: 3, Requested: 5");
            assert_eq!(product(&repos, p.id).await.stock, 3);
            assert!(repos.orders.list().await.unwrap().is_empty());
            assert!(repos.payments.list().await.unwrap().is_empty());
            assert!(repos.notifications.list().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn repeated_lines_are_checked_against_their_sum() {
        let repos = Repositories::in_memory();
        let svc = OrderService::new(repos.clone(), StockReservation::Atomic);
        let p = stocked(&repos, "Barahsinghe", 300.0, 5).await;
        let err = svc.place(request(&[(p.id, 3), (p.id, 3)], "COD")).await.unwrap_err();
        assert!(err.to_string().ends_with("Available: 5, Requested: 6"));
        assert_eq!(product(&repos, p.id).await.stock, 5);
    }

    #[tokio::test]
    async fn valid_order_decrements_stock_and_records_one_payment_and_notice() {
        for mode in [StockReservation::Atomic, StockReservation::Legacy] {
            let repos = Repositories::in_memory();
            let svc = OrderService::new(repos.clone(), mode);
            let p = stocked(&repos, "Arna", 280.0, 10).await;

            let view = svc.place(request(&[(p.id, 2)], "COD")).await.unwrap();
            let after = product(&repos, p.id).await;
            assert_eq!(after.stock, 8);
            assert_eq!(after.total_sold, 2);

            let payments = repos.payments.list().await.unwrap();
            assert_eq!(payments.len(), 1);
            assert_eq!(payments[0].order_id, view.id);
            assert_eq!(payments[0].status, PaymentStatus::Pending);

            let notes = repos.notifications.list().await.unwrap();
            assert_eq!(notes.len(), 1);
            assert_eq!(notes[0].kind, NotificationKind::NewOrder);
        }
    }

    #[tokio::test]
    async fn qr_orders_record_a_settled_payment_but_stay_pending() {
        let repos = Repositories::in_memory();
        let svc = OrderService::new(repos.clone(), StockReservation::Atomic);
        let p = stocked(&repos, "Ruslan", 1500.0, 10).await;
        let view = svc.place(request(&[(p.id, 1)], "QR Payment")).await.unwrap();
        assert_eq!(view.payment_status, PaymentStatus::Pending);
        let payment = repos.payments.find_by_order(view.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn overflowing_quantities_are_rejected_without_side_effects() {
        for reservation in [StockReservation::Atomic, StockReservation::Legacy] {
            let repos = Repositories::in_memory();
            let svc = OrderService::new(repos.clone(), reservation);
            let p = stocked(&repos, "Khukri", 900.0, 5).await;

            let err = svc
                .place(request(&[(p.id, i64::MAX), (p.id, i64::MAX)], "COD"))
                .await
                .unwrap_err();
            assert_eq!(err.class(), ErrorClass::BadRequest);

            let after = repos.products.get(p.id).await.unwrap().unwrap();
            assert_eq!(after.stock, 5);
            assert_eq!(after.total_sold, 0);
            assert!(repos.orders.list().await.unwrap().is_empty());
            assert!(repos.payments.list().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn bill_numbers_count_up_within_the_year() {
        let repos = Repositories::in_memory();
        let svc = OrderService::new(repos.clone(), StockReservation::Atomic);
        let p = stocked(&repos, "Nepal Ice", 280.0, 10).await;
        let a = svc.place(request(&[(p.id, 1)], "COD")).await.unwrap();
        let b = svc.place(request(&[(p.id, 1)], "COD")).await.unwrap();
        let year = Utc::now().year();
        assert_eq!(a.bill_number.as_str(), format!("FB-{year}-001"));
        assert_eq!(b.bill_number.as_str(), format!("FB-{year}-002"));

        let found = svc.get_by_bill(b.bill_number.as_str()).await.unwrap();
        assert_eq!(found.id, b.id);
    }

    #[tokio::test]
    async fn completing_an_order_forces_its_payment_completed() {
        let repos = Repositories::in_memory();
        let svc = OrderService::new(repos.clone(), StockReservation::Atomic);
        let p = stocked(&repos, "Carlsberg", 350.0, 10).await;
        let view = svc.place(request(&[(p.id, 1)], "COD")).await.unwrap();

        svc.update_status(view.id, Some("delivered".into())).await.unwrap();
        let payment = repos.payments.find_by_order(view.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);

        let done = svc.update_status(view.id, Some("completed".into())).await.unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        let payment = repos.payments.find_by_order(view.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn status_updates_are_validated() {
        let repos = Repositories::in_memory();
        let svc = OrderService::new(repos.clone(), StockReservation::Atomic);
        let p = stocked(&repos, "Tuborg", 300.0, 10).await;
        let view = svc.place(request(&[(p.id, 1)], "COD")).await.unwrap();

        let err = svc.update_status(view.id, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Status is required");
        let err = svc.update_status(view.id, Some("shipped".into())).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid status"));
        let err = svc.update_status(OrderId::new(), Some("placed".into())).await.unwrap_err();
        assert_eq!(err.to_string(), "Order not found");
    }

    #[tokio::test]
    async fn deleted_products_leave_the_snapshot_unpopulated() {
        let repos = Repositories::in_memory();
        let svc = OrderService::new(repos.clone(), StockReservation::Atomic);
        let p = stocked(&repos, "Old Durbar", 2200.0, 10).await;
        let view = svc.place(request(&[(p.id, 1)], "COD")).await.unwrap();
        repos.products.delete(p.id).await.unwrap();

        let again = svc.get(view.id).await.unwrap();
        assert_eq!(again.items[0].item.name, "Old Durbar");
        assert_eq!(again.items[0].product, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_orders_never_oversell() {
        let repos = Repositories::in_memory();
        let svc = Arc::new(OrderService::new(repos.clone(), StockReservation::Atomic));
        let p = stocked(&repos, "Gorkha", 250.0, 5).await;
        let id = p.id;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.place(request(&[(id, 1)], "COD")).await.is_ok() })
            })
            .collect();
        let mut placed = 0;
        for t in tasks {
            if t.await.unwrap() {
                placed += 1;
            }
        }
        assert_eq!(placed, 5);
        assert_eq!(product(&repos, id).await.stock, 0);
        assert_eq!(repos.orders.list().await.unwrap().len(), 5);
    }
}
