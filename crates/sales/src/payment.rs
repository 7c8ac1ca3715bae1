use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flame_core::{contains_ci, DomainError, DomainResult, OrderId, PaymentId};

use crate::order::{BillNumber, Order, PaymentMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            _ => Err(DomainError::validation(
                "Invalid status. Must be one of: pending, completed",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCustomer {
    pub full_name: String,
    pub mobile: Option<String>,
}

/// Ledger entry for an order. Correlated with its order by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub bill_number: BillNumber,
    pub customer: PaymentCustomer,
    pub amount: f64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Manually recorded payment as received from the client. Bill number and
/// customer are always copied from the order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub order_id: Option<String>,
    pub amount: Option<f64>,
    pub method: Option<String>,
    pub status: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn order_id(&self) -> DomainResult<OrderId> {
        self.order_id
            .as_deref()
            .ok_or_else(|| DomainError::validation("Order ID is required"))?
            .parse()
    }
}

impl Payment {
    /// The payment recorded automatically when `order` is placed.
    pub fn for_order(order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            order_id: order.id,
            bill_number: order.bill_number.clone(),
            customer: PaymentCustomer {
                full_name: order.customer.full_name.clone(),
                mobile: Some(order.customer.mobile.clone()),
            },
            amount: order.total_amount,
            method: order.payment_method,
            status: order.payment_method.initial_payment_status(),
            transaction_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A manual payment against an existing order. Amount and method default
    /// to the order's; status defaults to pending.
    pub fn record(order: &Order, input: NewPayment, now: DateTime<Utc>) -> DomainResult<Self> {
        let amount = input.amount.unwrap_or(order.total_amount);
        if !amount.is_finite() || amount < 0.0 {
            return Err(DomainError::validation("Amount must be positive"));
        }
        let method = match input.method {
            Some(m) => m.parse()?,
            None => order.payment_method,
        };
        let status = match input.status {
            Some(s) => s.parse()?,
            None => PaymentStatus::Pending,
        };
        let mut payment = Self::for_order(order, now);
        payment.amount = amount;
        payment.method = method;
        payment.status = status;
        payment.transaction_id = non_blank(input.transaction_id);
        payment.notes = non_blank(input.notes);
        Ok(payment)
    }

    /// Set the status; returns the previous one.
    pub fn set_status(&mut self, status: PaymentStatus, now: DateTime<Utc>) -> PaymentStatus {
        let previous = self.status;
        self.status = status;
        self.updated_at = now;
        previous
    }
}

/// Filters for the payment list.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    /// Matches bill number or customer name.
    pub search: Option<String>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        if self.method.is_some_and(|m| m != payment.method) {
            return false;
        }
        if self.status.is_some_and(|s| s != payment.status) {
            return false;
        }
        match self.search.as_deref().filter(|s| !s.is_empty()) {
            Some(q) => {
                contains_ci(payment.bill_number.as_str(), q)
                    || contains_ci(&payment.customer.full_name, q)
            }
            None => true,
        }
    }
}

/// Amount totals across the whole ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub total_payments: f64,
    pub completed: f64,
    pub pending: f64,
}

impl PaymentSummary {
    pub fn of<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Self {
        payments.into_iter().fold(Self::default(), |mut acc, p| {
            acc.total_payments += p.amount;
            match p.status {
                PaymentStatus::Completed => acc.completed += p.amount,
                PaymentStatus::Pending => acc.pending += p.amount,
            }
            acc
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
