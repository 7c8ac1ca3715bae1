use core::str::FromStr;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use flame_core::{contains_ci, DomainError, DomainResult, OrderId, ProductId};

use crate::payment::PaymentStatus;

/// Fulfilment status. Any value may follow any other; only membership is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Placed,
    InProgress,
    Delivered,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::InProgress => "in-progress",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "in-progress" => Ok(OrderStatus::InProgress),
            "delivered" => Ok(OrderStatus::Delivered),
            "completed" => Ok(OrderStatus::Completed),
            _ => Err(DomainError::validation(
                "Invalid status. Must be one of: placed, in-progress, delivered, completed",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "QR Payment")]
    QrPayment,
    #[serde(rename = "COD")]
    Cod,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::QrPayment => "QR Payment",
            PaymentMethod::Cod => "COD",
        }
    }

    /// Status of the payment recorded when an order is placed: QR payments
    /// are settled up front, cash on delivery is not.
    pub fn initial_payment_status(&self) -> PaymentStatus {
        match self {
            PaymentMethod::QrPayment => PaymentStatus::Completed,
            PaymentMethod::Cod => PaymentStatus::Pending,
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QR Payment" => Ok(PaymentMethod::QrPayment),
            "COD" => Ok(PaymentMethod::Cod),
            _ => Err(DomainError::validation(
                "Invalid payment method. Must be one of: QR Payment, COD",
            )),
        }
    }
}

/// Human-readable order number, `FB-<year>-<seq>` with `seq` zero-padded to
/// three digits. Assigned once at placement and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillNumber(String);

impl BillNumber {
    pub fn new(year: i32, seq: u64) -> Self {
        Self(format!("FB-{year}-{seq:03}"))
    }

    pub fn for_time(now: DateTime<Utc>, seq: u64) -> Self {
        Self::new(now.year(), seq)
    }

    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for BillNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub full_name: String,
    pub mobile: String,
    pub pan_number: Option<String>,
    pub location: String,
}

/// Item snapshot taken at purchase time; later product edits don't touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub bill_number: BillNumber,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot one line at the product's current unit price.
pub fn price_line(product_id: ProductId, name: impl Into<String>, unit_price: f64, quantity: i64) -> OrderItem {
    OrderItem {
        product_id,
        name: name.into(),
        quantity,
        price: unit_price,
        total: unit_price * quantity as f64,
    }
}

pub fn order_total(items: &[OrderItem]) -> f64 {
    items.iter().map(|i| i.total).sum()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub full_name: Option<String>,
    pub mobile: Option<String>,
    pub pan_number: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
}

/// Order placement input as received from the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer: Option<NewCustomer>,
    #[serde(default)]
    pub items: Vec<NewOrderLine>,
    pub payment_method: Option<String>,
}

/// One requested line after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    pub payment_method: PaymentMethod,
}

impl ValidatedOrder {
    /// Requested units per product, summed across lines that repeat a product.
    pub fn demand(&self) -> DomainResult<HashMap<ProductId, i64>> {
        let mut demand: HashMap<ProductId, i64> = HashMap::new();
        for line in &self.lines {
            let units = demand.entry(line.product_id).or_insert(0);
            *units = units
                .checked_add(line.quantity)
                .ok_or_else(|| DomainError::validation("Quantity is too large"))?;
        }
        Ok(demand)
    }
}

impl NewOrder {
    pub fn validate(self) -> DomainResult<ValidatedOrder> {
        let c = self
            .customer
            .ok_or_else(|| DomainError::validation("Customer details are required"))?;
        let customer = Customer {
            full_name: required(c.full_name, "Customer name is required")?,
            mobile: required(c.mobile, "Mobile number is required")?,
            pan_number: c.pan_number.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            location: required(c.location, "Location is required")?,
        };

        if self.items.is_empty() {
            return Err(DomainError::validation("Order must have at least one item"));
        }
        let lines = self
            .items
            .into_iter()
            .map(|line| {
                let product_id: ProductId = line
                    .product_id
                    .ok_or_else(|| DomainError::validation("Product ID is required"))?
                    .parse()?;
                let quantity = line.quantity.unwrap_or(0);
                if quantity < 1 {
                    return Err(DomainError::validation("Quantity must be at least 1"));
                }
                Ok(OrderLine { product_id, quantity })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let payment_method = self
            .payment_method
            .ok_or_else(|| DomainError::validation("Payment method is required"))?
            .parse()?;

        let order = ValidatedOrder {
            customer,
            lines,
            payment_method,
        };
        order.demand()?;
        Ok(order)
    }
}

impl Order {
    /// Build a freshly placed order from priced item snapshots.
    pub fn place(
        customer: Customer,
        items: Vec<OrderItem>,
        payment_method: PaymentMethod,
        bill_number: BillNumber,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("Order must have at least one item"));
        }
        let total_amount = order_total(&items);
        Ok(Self {
            id: OrderId::new(),
            bill_number,
            customer,
            items,
            total_amount,
            status: OrderStatus::Placed,
            payment_method,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn units(&self) -> i64 {
        self.items.iter().fold(0i64, |acc, i| acc.saturating_add(i.quantity))
    }
}

/// Filters for the order list.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Matches bill number, customer name or location.
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|s| s != order.status) {
            return false;
        }
        if self.payment_method.is_some_and(|m| m != order.payment_method) {
            return false;
        }
        match self.search.as_deref().filter(|s| !s.is_empty()) {
            Some(q) => {
                contains_ci(order.bill_number.as_str(), q)
                    || contains_ci(&order.customer.full_name, q)
                    || contains_ci(&order.customer.location, q)
            }
            None => true,
        }
    }
}

fn required(value: Option<String>, msg: &str) -> DomainResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::validation(msg))
}
