use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use flame_catalog::{Category, Product};
use flame_core::ProductId;
use flame_sales::{Order, Payment, PaymentStatus};

use crate::window::MonthWindow;

const DATE_FORMAT: &str = "%-m/%-d/%Y";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
    pub start_date: DateTime<Utc>,
    /// Last second of the month.
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_orders: u64,
    /// Sum of completed payments created in the month.
    pub total_revenue: f64,
    pub total_payments: u64,
    pub completed_payments: u64,
    pub pending_payments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub category: Category,
    pub quantity_sold: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub product_id: ProductId,
    pub name: String,
    pub category: Category,
    pub stock: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub period: ReportPeriod,
    pub summary: ReportSummary,
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
    pub product_sales: Vec<ProductSales>,
    pub stock_levels: Vec<StockLevel>,
}

/// Everything that happened in `window`, plus a snapshot of current stock.
///
/// Per-product sales use each product's current name and category and
/// leave out lines whose product has since been deleted.
pub fn monthly_report(
    window: &MonthWindow,
    orders: &[Order],
    payments: &[Payment],
    products: &[Product],
) -> MonthlyReport {
    let mut orders: Vec<Order> = orders
        .iter()
        .filter(|o| window.contains(o.created_at))
        .cloned()
        .collect();
    orders.sort_by_key(|o| o.created_at);
    let mut payments: Vec<Payment> = payments
        .iter()
        .filter(|p| window.contains(p.created_at))
        .cloned()
        .collect();
    payments.sort_by_key(|p| p.created_at);

    let completed = payments.iter().filter(|p| p.status == PaymentStatus::Completed);
    let summary = ReportSummary {
        total_orders: orders.len() as u64,
        total_revenue: completed.clone().map(|p| p.amount).sum(),
        total_payments: payments.len() as u64,
        completed_payments: completed.count() as u64,
        pending_payments: payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Pending)
            .count() as u64,
    };

    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();
    let mut sales: HashMap<ProductId, ProductSales> = HashMap::new();
    for item in orders.iter().flat_map(|o| &o.items) {
        let Some(product) = by_id.get(&item.product_id) else {
            continue;
        };
        let row = sales.entry(item.product_id).or_insert_with(|| ProductSales {
            product_id: product.id,
            name: product.name.clone(),
            category: product.category,
            quantity_sold: 0,
            revenue: 0.0,
        });
        row.quantity_sold += item.quantity;
        row.revenue += item.total;
    }
    let mut product_sales: Vec<ProductSales> = sales.into_values().collect();
    product_sales.sort_by(|a, b| {
        b.quantity_sold
            .cmp(&a.quantity_sold)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut stock_levels: Vec<StockLevel> = products
        .iter()
        .map(|p| StockLevel {
            product_id: p.id,
            name: p.name.clone(),
            category: p.category,
            stock: p.stock,
            price: p.price,
        })
        .collect();
    stock_levels.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));

    MonthlyReport {
        period: ReportPeriod {
            year: window.year,
            month: window.month,
            start_date: window.start,
            end_date: window.end - Duration::seconds(1),
        },
        summary,
        orders,
        payments,
        product_sales,
        stock_levels,
    }
}

/// A rendered table cell. Counts stay numeric so spreadsheets can sum them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Int(i64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Int(n)
    }
}

fn money(v: f64) -> Cell {
    Cell::Text(format!("${v:.2}"))
}

fn count(n: u64) -> Cell {
    Cell::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn header(cols: &[&str]) -> Vec<Cell> {
    cols.iter().map(|c| Cell::from(*c)).collect()
}

/// The report laid out as tables, each starting with its header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTables {
    pub summary: Vec<Vec<Cell>>,
    pub orders: Vec<Vec<Cell>>,
    pub payments: Vec<Vec<Cell>>,
    pub product_sales: Vec<Vec<Cell>>,
    pub stock_levels: Vec<Vec<Cell>>,
}

impl ReportTables {
    pub fn from_report(report: &MonthlyReport) -> Self {
        let s = &report.summary;
        let summary = vec![
            header(&["Metric", "Value"]),
            vec!["Total Orders".into(), count(s.total_orders)],
            vec!["Total Revenue".into(), money(s.total_revenue)],
            vec!["Total Payments".into(), count(s.total_payments)],
            vec!["Completed Payments".into(), count(s.completed_payments)],
            vec!["Pending Payments".into(), count(s.pending_payments)],
        ];

        let mut orders = vec![header(&[
            "Bill Number",
            "Customer",
            "Location",
            "Items",
            "Total Amount",
            "Status",
            "Payment Method",
            "Date",
        ])];
        orders.extend(report.orders.iter().map(|o| {
            let items = o
                .items
                .iter()
                .map(|i| format!("{} x{}", i.name, i.quantity))
                .collect::<Vec<_>>()
                .join(", ");
            vec![
                o.bill_number.as_str().into(),
                o.customer.full_name.clone().into(),
                o.customer.location.clone().into(),
                items.into(),
                money(o.total_amount),
                o.status.as_str().into(),
                o.payment_method.as_str().into(),
                o.created_at.format(DATE_FORMAT).to_string().into(),
            ]
        }));

        let mut payments = vec![header(&["Bill Number", "Customer", "Amount", "Method", "Status", "Date"])];
        payments.extend(report.payments.iter().map(|p| {
            vec![
                p.bill_number.as_str().into(),
                p.customer.full_name.clone().into(),
                money(p.amount),
                p.method.as_str().into(),
                p.status.as_str().into(),
                p.created_at.format(DATE_FORMAT).to_string().into(),
            ]
        }));

        let mut product_sales = vec![header(&["Product Name", "Category", "Quantity Sold", "Revenue"])];
        product_sales.extend(report.product_sales.iter().map(|r| {
            vec![
                r.name.clone().into(),
                r.category.as_str().into(),
                r.quantity_sold.into(),
                money(r.revenue),
            ]
        }));

        let mut stock_levels = vec![header(&["Product Name", "Category", "Stock", "Price"])];
        stock_levels.extend(report.stock_levels.iter().map(|r| {
            vec![
                r.name.clone().into(),
                r.category.as_str().into(),
                r.stock.into(),
                money(r.price),
            ]
        }));

        Self {
            summary,
            orders,
            payments,
            product_sales,
            stock_levels,
        }
    }
}
