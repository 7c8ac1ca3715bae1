use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use flame_sales::{Payment, PaymentStatus};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: &'static str,
    pub revenue: f64,
    pub count: u64,
}

/// Completed-payment revenue for each named month, January to December.
///
/// Payments are bucketed by (year, month). Each named month reports the
/// bucket of the *earliest* year that has one; later years' figures for the
/// same month are not shown. Months without any completed payment report zero.
pub fn sales_trend(payments: &[Payment]) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<(i32, u32), (f64, u64)> = BTreeMap::new();
    for p in payments.iter().filter(|p| p.status == PaymentStatus::Completed) {
        let slot = buckets
            .entry((p.created_at.year(), p.created_at.month()))
            .or_insert((0.0, 0));
        slot.0 += p.amount;
        slot.1 += 1;
    }

    MONTH_NAMES
        .into_iter()
        .zip(1u32..)
        .map(|(name, month)| {
            let (revenue, count) = buckets
                .iter()
                .find(|((_, m), _)| *m == month)
                .map(|(_, v)| *v)
                .unwrap_or((0.0, 0));
            TrendPoint {
                month: name,
                revenue,
                count,
            }
        })
        .collect()
}
