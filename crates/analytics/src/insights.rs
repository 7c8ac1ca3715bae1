use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use flame_catalog::{Category, Product};
use flame_core::{percent_of, percentage_change, ProductId};
use flame_sales::Order;

use crate::window::MonthWindow;

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Reported when there are no orders at all.
const DEFAULT_PEAK_DAY: &str = "Saturday";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingCategory {
    pub category: Category,
    pub growth: i64,
    pub units_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestCategory {
    pub category: Category,
    pub units_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakSalesDay {
    pub day: &'static str,
    /// Peak-day orders as a share of all orders ever placed.
    pub percentage: i64,
    pub order_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesInsights {
    pub trending_category: Option<TrendingCategory>,
    pub best_category: Option<BestCategory>,
    pub peak_sales_day: PeakSalesDay,
}

fn units_by_category(
    window: &MonthWindow,
    orders: &[Order],
    category_of: &HashMap<ProductId, Category>,
) -> BTreeMap<Category, i64> {
    let mut units = BTreeMap::new();
    for order in orders.iter().filter(|o| window.contains(o.created_at)) {
        for item in &order.items {
            if let Some(c) = category_of.get(&item.product_id) {
                *units.entry(*c).or_insert(0) += item.quantity;
            }
        }
    }
    units
}

fn peak_day(orders: &[Order]) -> PeakSalesDay {
    let mut per_day = [0u64; 7];
    for o in orders {
        per_day[o.created_at.weekday().num_days_from_sunday() as usize] += 1;
    }
    let total: u64 = per_day.iter().sum();
    if total == 0 {
        return PeakSalesDay {
            day: DEFAULT_PEAK_DAY,
            percentage: 0,
            order_count: 0,
        };
    }

    // First maximum in Sunday..Saturday order.
    let (idx, count) = per_day
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, c)| if *c > best.1 { (i, *c) } else { best });
    PeakSalesDay {
        day: DAY_NAMES[idx],
        percentage: percent_of(count as f64, total as f64),
        order_count: count,
    }
}

/// Trending and best-selling categories this month, plus the busiest weekday.
///
/// Category figures use each item's product's current category. The peak
/// day is computed over every order ever placed, not per week.
pub fn sales_insights(orders: &[Order], products: &[Product], now: DateTime<Utc>) -> SalesInsights {
    let category_of: HashMap<ProductId, Category> = products.iter().map(|p| (p.id, p.category)).collect();
    let window = MonthWindow::containing(now);
    let current = units_by_category(&window, orders, &category_of);
    let previous = units_by_category(&window.previous(), orders, &category_of);

    let trending_category = current
        .iter()
        .map(|(category, units)| TrendingCategory {
            category: *category,
            growth: percentage_change(*units as f64, *previous.get(category).unwrap_or(&0) as f64),
            units_sold: *units,
        })
        .filter(|t| t.growth > 0)
        .fold(None::<TrendingCategory>, |best, t| match best {
            Some(b) if (b.growth, b.units_sold) >= (t.growth, t.units_sold) => Some(b),
            _ => Some(t),
        });

    let best_category = current
        .iter()
        .fold(None::<BestCategory>, |best, (category, units)| match best {
            Some(b) if b.units_sold >= *units => Some(b),
            _ => Some(BestCategory {
                category: *category,
                units_sold: *units,
            }),
        });

    SalesInsights {
        trending_category,
        best_category,
        peak_sales_day: peak_day(orders),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flame_catalog::NewProduct;
    use flame_sales::{price_line, BillNumber, Customer, PaymentMethod};

    fn product(category: &str) -> Product {
        Product::create(
            NewProduct {
                name: Some(format!("{category} product")),
                category: Some(category.into()),
                price: Some(100.0),
                stock: Some(100),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn order(p: &Product, qty: i64, t: DateTime<Utc>) -> Order {
        Order::place(
            Customer {
                full_name: "C".into(),
                mobile: "1".into(),
                pan_number: None,
                location: "L".into(),
            },
            vec![price_line(p.id, p.name.clone(), 100.0, qty)],
            PaymentMethod::Cod,
            BillNumber::new(2024, 1),
            t,
        )
        .unwrap()
    }

    #[test]
    fn trending_is_highest_positive_growth_and_best_is_most_units() {
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap();
        let may = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let june = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        let beer = product("beer");
        let gin = product("gin");
        let wine = product("wine");

        let orders = vec![
            order(&beer, 10, may),
            order(&beer, 12, june), // +20%
            order(&gin, 2, may),
            order(&gin, 4, june), // +100%
            order(&wine, 9, may),
            order(&wine, 3, june), // -67%
        ];
        let insights = sales_insights(&orders, &[beer, gin, wine], now);

        let trending = insights.trending_category.unwrap();
        assert_eq!(trending.category, Category::Gin);
        assert_eq!(trending.growth, 100);
        assert_eq!(trending.units_sold, 4);

        let best = insights.best_category.unwrap();
        assert_eq!(best.category, Category::Beer);
        assert_eq!(best.units_sold, 12);
    }

    #[test]
    fn no_positive_growth_means_no_trending_category() {
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap();
        let beer = product("beer");
        let orders = vec![
            order(&beer, 10, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            order(&beer, 5, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        ];
        let insights = sales_insights(&orders, &[beer], now);
        assert_eq!(insights.trending_category, None);
        assert!(insights.best_category.is_some());
    }

    #[test]
    fn peak_day_is_global_share_of_all_orders() {
        let beer = product("beer");
        // 2024-06-01 and 2024-06-08 are Saturdays, 2024-06-03 a Monday.
        let orders = vec![
            order(&beer, 1, Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()),
            order(&beer, 1, Utc.with_ymd_and_hms(2024, 6, 8, 10, 0, 0).unwrap()),
            order(&beer, 1, Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()),
        ];
        let insights = sales_insights(&orders, &[beer], Utc::now());
        assert_eq!(insights.peak_sales_day.day, "Saturday");
        assert_eq!(insights.peak_sales_day.order_count, 2);
        assert_eq!(insights.peak_sales_day.percentage, 67);
    }

    #[test]
    fn no_orders_defaults_to_saturday() {
        let insights = sales_insights(&[], &[], Utc::now());
        assert_eq!(insights.peak_sales_day.day, "Saturday");
        assert_eq!(insights.peak_sales_day.percentage, 0);
        assert_eq!(insights.trending_category, None);
        assert_eq!(insights.best_category, None);
    }

    #[test]
    fn weekday_ties_resolve_to_earliest_in_week() {
        let beer = product("beer");
        // Sunday 2024-06-02 and Tuesday 2024-06-04.
        let orders = vec![
            order(&beer, 1, Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap()),
            order(&beer, 1, Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()),
        ];
        assert_eq!(sales_insights(&orders, &[beer], Utc::now()).peak_sales_day.day, "Sunday");
    }
}
