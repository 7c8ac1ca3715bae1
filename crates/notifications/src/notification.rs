use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flame_catalog::Product;
use flame_core::{DomainError, DomainResult, NotificationId, OrderId, PaymentId, ProductId};
use flame_sales::{Order, Payment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "New Payment")]
    NewPayment,
    #[serde(rename = "New Order")]
    NewOrder,
    #[serde(rename = "Low Stock Alert")]
    LowStockAlert,
    #[serde(rename = "Super Admin Update")]
    SuperAdminUpdate,
    #[serde(rename = "System Update")]
    SystemUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewPayment => "New Payment",
            NotificationKind::NewOrder => "New Order",
            NotificationKind::LowStockAlert => "Low Stock Alert",
            NotificationKind::SuperAdminUpdate => "Super Admin Update",
            NotificationKind::SystemUpdate => "System Update",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            NotificationKind::NewPayment,
            NotificationKind::NewOrder,
            NotificationKind::LowStockAlert,
            NotificationKind::SuperAdminUpdate,
            NotificationKind::SystemUpdate,
        ]
        .into_iter()
        .find(|k| k.as_str() == s)
        .ok_or_else(|| {
            DomainError::validation(
                "Invalid type. Must be one of: New Payment, New Order, Low Stock Alert, Super Admin Update, System Update",
            )
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(DomainError::validation("Invalid priority. Must be one of: low, medium, high")),
        }
    }
}

/// Which collection a [`RelatedRef`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelatedKind {
    Product,
    Order,
    Payment,
}

impl RelatedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelatedKind::Product => "Product",
            RelatedKind::Order => "Order",
            RelatedKind::Payment => "Payment",
        }
    }
}

impl FromStr for RelatedKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Product" => Ok(RelatedKind::Product),
            "Order" => Ok(RelatedKind::Order),
            "Payment" => Ok(RelatedKind::Payment),
            _ => Err(DomainError::validation(
                "Invalid related model. Must be one of: Product, Order, Payment",
            )),
        }
    }
}

/// Typed reference from a notification to the record it is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum RelatedRef {
    Product(ProductId),
    Order(OrderId),
    Payment(PaymentId),
}

impl RelatedRef {
    pub fn kind(&self) -> RelatedKind {
        match self {
            RelatedRef::Product(_) => RelatedKind::Product,
            RelatedRef::Order(_) => RelatedKind::Order,
            RelatedRef::Payment(_) => RelatedKind::Payment,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        match self {
            RelatedRef::Product(id) => *id.as_uuid(),
            RelatedRef::Order(id) => *id.as_uuid(),
            RelatedRef::Payment(id) => *id.as_uuid(),
        }
    }

    pub fn parse(kind: &str, id: &str) -> DomainResult<Self> {
        Ok(match kind.parse::<RelatedKind>()? {
            RelatedKind::Product => RelatedRef::Product(id.parse()?),
            RelatedKind::Order => RelatedRef::Order(id.parse()?),
            RelatedKind::Payment => RelatedRef::Payment(id.parse()?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related: Option<RelatedRef>,
    pub is_read: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Manually posted notification as received from the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub related_id: Option<String>,
    pub related_model: Option<String>,
    pub priority: Option<String>,
}

impl Notification {
    fn build(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        related: Option<RelatedRef>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            kind,
            title: title.into(),
            message: message.into(),
            related,
            is_read: false,
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_order(order: &Order, now: DateTime<Utc>) -> Self {
        Self::build(
            NotificationKind::NewOrder,
            "New Order Received",
            format!("New order {} from {}", order.bill_number, order.customer.full_name),
            Some(RelatedRef::Order(order.id)),
            Priority::High,
            now,
        )
    }

    /// A payment that was recorded already settled.
    pub fn payment_received(payment: &Payment, now: DateTime<Utc>) -> Self {
        Self::build(
            NotificationKind::NewPayment,
            "Payment Received",
            format!("Payment of ${} received for order {}", payment.amount, payment.bill_number),
            Some(RelatedRef::Payment(payment.id)),
            Priority::Medium,
            now,
        )
    }

    /// A pending payment that moved to completed.
    pub fn payment_completed(payment: &Payment, now: DateTime<Utc>) -> Self {
        Self::build(
            NotificationKind::NewPayment,
            "Payment Completed",
            format!("Payment of ${} completed for order {}", payment.amount, payment.bill_number),
            Some(RelatedRef::Payment(payment.id)),
            Priority::Medium,
            now,
        )
    }

    pub fn low_stock(product: &Product, now: DateTime<Utc>) -> Self {
        Self::build(
            NotificationKind::LowStockAlert,
            "Low Stock Alert",
            format!(
                "{} is running low. Only {} units remaining.",
                product.name, product.stock
            ),
            Some(RelatedRef::Product(product.id)),
            Priority::High,
            now,
        )
    }

    pub fn create(input: NewNotification, now: DateTime<Utc>) -> DomainResult<Self> {
        let kind = input
            .kind
            .ok_or_else(|| DomainError::validation("Notification type is required"))?
            .parse()?;
        let title = required(input.title, "Title is required")?;
        let message = required(input.message, "Message is required")?;
        let related = match (input.related_model, input.related_id) {
            (Some(model), Some(id)) => Some(RelatedRef::parse(&model, &id)?),
            (None, None) => None,
            _ => {
                return Err(DomainError::validation(
                    "relatedId and relatedModel must be provided together",
                ));
            }
        };
        let priority = match input.priority {
            Some(p) => p.parse()?,
            None => Priority::default(),
        };
        Ok(Self::build(kind, title, message, related, priority, now))
    }

    /// Whether this is an unread low-stock alert for `product`.
    pub fn is_open_low_stock_alert(&self, product: ProductId) -> bool {
        !self.is_read
            && self.kind == NotificationKind::LowStockAlert
            && self.related == Some(RelatedRef::Product(product))
    }

    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        if !self.is_read {
            self.is_read = true;
            self.updated_at = now;
        }
    }
}

/// Filters for the notification feed.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub kind: Option<NotificationKind>,
    pub is_read: Option<bool>,
}

impl NotificationFilter {
    pub fn matches(&self, n: &Notification) -> bool {
        self.kind.is_none_or(|k| k == n.kind) && self.is_read.is_none_or(|r| r == n.is_read)
    }
}

fn required(value: Option<String>, msg: &str) -> DomainResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::validation(msg))
}
