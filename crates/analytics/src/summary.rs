use chrono::{DateTime, Utc};
use serde::Serialize;

use flame_core::{percentage_change, round_to};
use flame_sales::{Order, Payment, PaymentStatus};

use crate::window::MonthWindow;

/// One dashboard figure with its month-over-month growth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric<T> {
    pub value: T,
    pub growth: i64,
    pub previous_value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    /// Completed payments.
    pub total_revenue: Metric<f64>,
    /// Number of orders.
    pub total_sales: Metric<u64>,
    /// Mean order total, shown to two decimals.
    pub avg_order_value: Metric<f64>,
    /// Units across all order items.
    pub products_sold: Metric<i64>,
}

struct MonthFigures {
    revenue: f64,
    orders: u64,
    avg_order: f64,
    units: i64,
}

fn figures(window: &MonthWindow, orders: &[Order], payments: &[Payment]) -> MonthFigures {
    let revenue = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed && window.contains(p.created_at))
        .map(|p| p.amount)
        .sum();

    let in_month: Vec<&Order> = orders.iter().filter(|o| window.contains(o.created_at)).collect();
    let count = in_month.len() as u64;
    let avg_order = if count == 0 {
        0.0
    } else {
        in_month.iter().map(|o| o.total_amount).sum::<f64>() / count as f64
    };
    let units = in_month.iter().map(|o| o.units()).sum();

    MonthFigures {
        revenue,
        orders: count,
        avg_order,
        units,
    }
}

/// Current calendar month (the one containing `now`) against the previous one.
pub fn analytics_summary(orders: &[Order], payments: &[Payment], now: DateTime<Utc>) -> AnalyticsSummary {
    let current_window = MonthWindow::containing(now);
    let current = figures(&current_window, orders, payments);
    let previous = figures(&current_window.previous(), orders, payments);

    AnalyticsSummary {
        total_revenue: Metric {
            value: current.revenue,
            growth: percentage_change(current.revenue, previous.revenue),
            previous_value: previous.revenue,
        },
        total_sales: Metric {
            value: current.orders,
            growth: percentage_change(current.orders as f64, previous.orders as f64),
            previous_value: previous.orders,
        },
        // Growth uses the unrounded averages.
        avg_order_value: Metric {
            value: round_to(current.avg_order, 2),
            growth: percentage_change(current.avg_order, previous.avg_order),
            previous_value: round_to(previous.avg_order, 2),
        },
        products_sold: Metric {
            value: current.units,
            growth: percentage_change(current.units as f64, previous.units as f64),
            previous_value: previous.units,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flame_core::ProductId;
    use flame_sales::{price_line, BillNumber, Customer, PaymentMethod};

    fn order_at(t: DateTime<Utc>, unit: f64, qty: i64, method: PaymentMethod) -> Order {
        Order::place(
            Customer {
                full_name: "Customer".into(),
                mobile: "98".into(),
                pan_number: None,
                location: "Kathmandu".into(),
            },
            vec![price_line(ProductId::new(), "Item", unit, qty)],
            method,
            BillNumber::new(2024, 1),
            t,
        )
        .unwrap()
    }

    #[test]
    fn month_over_month_figures() {
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap();
        let may = Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap();
        let june = Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap();

        let orders = vec![
            order_at(may, 100.0, 10, PaymentMethod::QrPayment),
            order_at(june, 100.0, 2, PaymentMethod::QrPayment),
            order_at(june, 100.0, 3, PaymentMethod::Cod),
        ];
        let payments: Vec<Payment> = orders.iter().map(|o| Payment::for_order(o, o.created_at)).collect();

        let s = analytics_summary(&orders, &payments, now);

        // Only the QR payment is completed in each month.
        assert_eq!(s.total_revenue.value, 200.0);
        assert_eq!(s.total_revenue.previous_value, 1000.0);
        assert_eq!(s.total_revenue.growth, -80);

        assert_eq!(s.total_sales.value, 2);
        assert_eq!(s.total_sales.growth, 100);

        assert_eq!(s.avg_order_value.value, 250.0);
        assert_eq!(s.avg_order_value.growth, -75);

        assert_eq!(s.products_sold.value, 5);
        assert_eq!(s.products_sold.previous_value, 10);
        assert_eq!(s.products_sold.growth, -50);
    }

    #[test]
    fn empty_store_reports_zeroes() {
        let s = analytics_summary(&[], &[], Utc::now());
        assert_eq!(s.total_sales.value, 0);
        assert_eq!(s.total_sales.growth, 0);
        assert_eq!(s.avg_order_value.value, 0.0);
    }

    #[test]
    fn counts_serialize_as_integers() {
        let s = analytics_summary(&[], &[], Utc::now());
        let json = serde_json::to_value(s).unwrap();
        assert!(json["totalSales"]["value"].is_u64());
        assert!(json["avgOrderValue"]["previousValue"].is_f64());
    }
}
