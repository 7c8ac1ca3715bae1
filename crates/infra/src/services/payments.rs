use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use flame_core::{DomainError, OrderId, Page, PageRequest, PaymentId, SortOrder};
use flame_notifications::Notification;
use flame_sales::{
    BillNumber, Customer, NewPayment, OrderItem, Payment, PaymentFilter, PaymentStatus, PaymentSummary,
};

use super::{sort_records, ServiceResult, SortKey};
use crate::store::Repositories;

/// The order fields shown next to a payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub id: OrderId,
    pub bill_number: BillNumber,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: Payment,
    pub order: Option<PaymentOrder>,
}

fn payment_sort_key(p: &Payment, field: &str) -> Option<SortKey> {
    Some(match field {
        "createdAt" => p.created_at.into(),
        "updatedAt" => p.updated_at.into(),
        "amount" => p.amount.into(),
        "billNumber" => p.bill_number.as_str().into(),
        "method" => p.method.as_str().into(),
        "status" => p.status.as_str().into(),
        _ => return None,
    })
}

#[derive(Clone)]
pub struct PaymentService {
    repos: Repositories,
}

impl PaymentService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn list(&self, filter: &PaymentFilter, page: &PageRequest) -> ServiceResult<Page<Payment>> {
        let mut payments: Vec<Payment> = self
            .repos
            .payments
            .list()
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        sort_records(&mut payments, page, ("createdAt", SortOrder::Desc), payment_sort_key);
        Ok(Page::from_sorted(payments, page))
    }

    pub async fn summary(&self) -> ServiceResult<PaymentSummary> {
        let payments = self.repos.payments.list().await?;
        Ok(PaymentSummary::of(&payments))
    }

    pub async fn get(&self, id: PaymentId) -> ServiceResult<PaymentView> {
        let payment = self.load(id).await?;
        let order = self.repos.orders.get(payment.order_id).await?.map(|o| PaymentOrder {
            id: o.id,
            bill_number: o.bill_number,
            customer: o.customer,
            items: o.items,
            total_amount: o.total_amount,
        });
        Ok(PaymentView { payment, order })
    }

    /// Record a payment by hand against an existing order.
    #[instrument(skip(self, input), err)]
    pub async fn create(&self, input: NewPayment) -> ServiceResult<Payment> {
        let order_id = input.order_id()?;
        let order = self
            .repos
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order"))?;
        let now = Utc::now();
        let payment = Payment::record(&order, input, now)?;
        self.repos.payments.insert(&payment).await?;
        info!(payment_id = %payment.id, order_id = %order_id, status = payment.status.as_str(), "payment created");

        if payment.status == PaymentStatus::Completed {
            self.settle_order(order_id, now).await?;
            self.notify(Notification::payment_received(&payment, now)).await?;
        }
        Ok(payment)
    }

    #[instrument(skip(self), err)]
    pub async fn update_status(&self, id: PaymentId, status: Option<String>) -> ServiceResult<Payment> {
        let status: PaymentStatus = status
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DomainError::validation("Status is required"))?
            .parse()?;
        let now = Utc::now();
        let mut payment = self.load(id).await?;
        let previous = payment.set_status(status, now);
        if !self.repos.payments.update(&payment).await? {
            return Err(DomainError::not_found("Payment").into());
        }

        // Every update to completed re-settles the order and notifies, so a
        // QR payment recorded at placement can still settle its order.
        match (previous, status) {
            (_, PaymentStatus::Completed) => {
                info!(payment_id = %id, ?previous, "payment completed");
                self.settle_order(payment.order_id, now).await?;
                self.notify(Notification::payment_completed(&payment, now)).await?;
            }
            (PaymentStatus::Completed, PaymentStatus::Pending) => {
                warn!(
                    payment_id = %id,
                    order_id = %payment.order_id,
                    "payment moved back to pending; order keeps its completed payment status"
                );
            }
            _ => {}
        }
        Ok(payment)
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: PaymentId) -> ServiceResult<Payment> {
        let payment = self
            .repos
            .payments
            .delete(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment"))?;
        info!(payment_id = %id, "payment deleted");
        Ok(payment)
    }

    async fn settle_order(&self, order_id: OrderId, now: DateTime<Utc>) -> ServiceResult<()> {
        let Some(mut order) = self.repos.orders.get(order_id).await? else {
            warn!(order_id = %order_id, "payment completed for an order that no longer exists");
            return Ok(());
        };
        order.payment_status = PaymentStatus::Completed;
        order.updated_at = now;
        self.repos.orders.update(&order).await?;
        info!(order_id = %order_id, "order payment status set to completed");
        Ok(())
    }

    async fn notify(&self, notice: Notification) -> ServiceResult<()> {
        self.repos.notifications.insert(&notice).await?;
        info!(notification_id = %notice.id, title = %notice.title, "payment notification emitted");
        Ok(())
    }

    async fn load(&self, id: PaymentId) -> ServiceResult<Payment> {
        Ok(self
            .repos
            .payments
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_core::ProductId;
    use flame_notifications::NotificationKind;
    use flame_sales::{price_line, Order, PaymentMethod};

    async fn placed(repos: &Repositories, method: PaymentMethod, seq: u64) -> Order {
        let order = Order::place(
            Customer {
                full_name: "Ram Thapa".into(),
                mobile: "9812345678".into(),
                pan_number: None,
                location: "Pokhara".into(),
            },
            vec![price_line(ProductId::new(), "Gorkha", 250.0, 4)],
            method,
            BillNumber::new(2024, seq),
            Utc::now(),
        )
        .unwrap();
        repos.orders.insert(&order).await.unwrap();
        repos.payments.insert(&Payment::for_order(&order, Utc::now())).await.unwrap();
        order
    }

    async fn titles(repos: &Repositories) -> Vec<String> {
        repos
            .notifications
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::NewPayment)
            .map(|n| n.title)
            .collect()
    }

    #[tokio::test]
    async fn completing_a_pending_payment_settles_the_order() {
        let repos = Repositories::in_memory();
        let svc = PaymentService::new(repos.clone());
        let order = placed(&repos, PaymentMethod::Cod, 1).await;
        let payment = repos.payments.find_by_order(order.id).await.unwrap().unwrap();

        svc.update_status(payment.id, Some("completed".into())).await.unwrap();
        let order = repos.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(titles(&repos).await, ["Payment Completed"]);

        // A repeated completion settles again and notifies again.
        svc.update_status(payment.id, Some("completed".into())).await.unwrap();
        assert_eq!(titles(&repos).await, ["Payment Completed", "Payment Completed"]);
    }

    #[tokio::test]
    async fn confirming_a_qr_payment_settles_its_order() {
        let repos = Repositories::in_memory();
        let svc = PaymentService::new(repos.clone());
        let order = placed(&repos, PaymentMethod::QrPayment, 1).await;
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        let payment = repos.payments.find_by_order(order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);

        svc.update_status(payment.id, Some("completed".into())).await.unwrap();
        let order = repos.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(titles(&repos).await, ["Payment Completed"]);
    }

    #[tokio::test]
    async fn reverting_to_pending_leaves_the_order_alone() {
        let repos = Repositories::in_memory();
        let svc = PaymentService::new(repos.clone());
        let order = placed(&repos, PaymentMethod::Cod, 1).await;
        let payment = repos.payments.find_by_order(order.id).await.unwrap().unwrap();
        svc.update_status(payment.id, Some("completed".into())).await.unwrap();

        let reverted = svc.update_status(payment.id, Some("pending".into())).await.unwrap();
        assert_eq!(reverted.status, PaymentStatus::Pending);
        let order = repos.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(titles(&repos).await, ["Payment Completed"]);
    }

    #[tokio::test]
    async fn manual_completed_payment_notifies_receipt() {
        let repos = Repositories::in_memory();
        let svc = PaymentService::new(repos.clone());
        let order = placed(&repos, PaymentMethod::Cod, 1).await;

        let payment = svc
            .create(NewPayment {
                order_id: Some(order.id.to_string()),
                status: Some("completed".into()),
                transaction_id: Some("TX-1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(payment.amount, 1000.0);
        assert_eq!(payment.bill_number, order.bill_number);
        assert_eq!(titles(&repos).await, ["Payment Received"]);

        let view = svc.get(payment.id).await.unwrap();
        assert_eq!(view.order.unwrap().total_amount, 1000.0);
    }

    #[tokio::test]
    async fn manual_payment_needs_an_existing_order() {
        let svc = PaymentService::new(Repositories::in_memory());
        let err = svc
            .create(NewPayment {
                order_id: Some(OrderId::new().to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Order not found");

        let err = svc.create(NewPayment::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Order ID is required");
    }

    #[tokio::test]
    async fn summary_sums_amounts_by_status() {
        let repos = Repositories::in_memory();
        let svc = PaymentService::new(repos.clone());
        placed(&repos, PaymentMethod::Cod, 1).await;
        placed(&repos, PaymentMethod::QrPayment, 2).await;
        let s = svc.summary().await.unwrap();
        assert_eq!(s.total_payments, 2000.0);
        assert_eq!(s.completed, 1000.0);
        assert_eq!(s.pending, 1000.0);
    }
}
