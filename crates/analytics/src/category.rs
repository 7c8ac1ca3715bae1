use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use flame_catalog::{Category, Product, StockStatus};
use flame_core::{percent_of, ProductId};
use flame_sales::Order;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStock {
    pub category: Category,
    pub in_stock: u64,
    pub low_stock: u64,
    pub out_of_stock: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub count: u64,
    pub percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRevenue {
    pub category: Category,
    pub revenue: f64,
    /// Units sold.
    pub count: i64,
    pub percentage: i64,
}

/// Stock-bucket counts per category, categories in alphabetical order.
pub fn stock_by_category(products: &[Product]) -> Vec<CategoryStock> {
    let mut buckets: BTreeMap<Category, CategoryStock> = BTreeMap::new();
    for p in products {
        let row = buckets.entry(p.category).or_insert(CategoryStock {
            category: p.category,
            in_stock: 0,
            low_stock: 0,
            out_of_stock: 0,
        });
        match p.status() {
            StockStatus::InStock => row.in_stock += 1,
            StockStatus::LowStock => row.low_stock += 1,
            StockStatus::OutOfStock => row.out_of_stock += 1,
        }
    }
    buckets.into_values().collect()
}

/// Product count per category with its share of the catalog, largest first.
pub fn products_by_category(products: &[Product]) -> Vec<CategoryShare> {
    let mut counts: BTreeMap<Category, u64> = BTreeMap::new();
    for p in products {
        *counts.entry(p.category).or_insert(0) += 1;
    }
    let total: u64 = counts.values().sum();

    let mut rows: Vec<CategoryShare> = counts
        .into_iter()
        .map(|(category, count)| CategoryShare {
            category,
            count,
            percentage: percent_of(count as f64, total as f64),
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));
    rows
}

/// Order-item revenue per category, highest first.
///
/// Items are attributed to their product's *current* category; items whose
/// product no longer exists are left out.
pub fn revenue_by_category(orders: &[Order], products: &[Product]) -> Vec<CategoryRevenue> {
    let category_of: HashMap<ProductId, Category> = products.iter().map(|p| (p.id, p.category)).collect();

    let mut sums: BTreeMap<Category, (f64, i64)> = BTreeMap::new();
    for item in orders.iter().flat_map(|o| o.items.iter()) {
        if let Some(category) = category_of.get(&item.product_id) {
            let slot = sums.entry(*category).or_insert((0.0, 0));
            slot.0 += item.total;
            slot.1 += item.quantity;
        }
    }
    let total: f64 = sums.values().map(|(r, _)| r).sum();

    let mut rows: Vec<CategoryRevenue> = sums
        .into_iter()
        .map(|(category, (revenue, count))| CategoryRevenue {
            category,
            revenue,
            count,
            percentage: if total > 0.0 { percent_of(revenue, total) } else { 0 },
        })
        .collect();
    rows.sort_by(|a, b| b.revenue.total_cmp(&a.revenue).then(a.category.cmp(&b.category)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flame_catalog::NewProduct;
    use flame_sales::{price_line, BillNumber, Customer, PaymentMethod};

    fn product(name: &str, category: &str, stock: i64) -> Product {
        Product::create(
            NewProduct {
                name: Some(name.into()),
                category: Some(category.into()),
                price: Some(100.0),
                stock: Some(stock),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn order(lines: Vec<(&Product, f64, i64)>) -> Order {
        Order::place(
            Customer {
                full_name: "C".into(),
                mobile: "1".into(),
                pan_number: None,
                location: "L".into(),
            },
            lines
                .into_iter()
                .map(|(p, price, q)| price_line(p.id, p.name.clone(), price, q))
                .collect(),
            PaymentMethod::Cod,
            BillNumber::new(2024, 1),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn stock_buckets_per_category() {
        let products = vec![
            product("Tuborg", "beer", 0),
            product("Arna", "beer", 5),
            product("Gorkha", "beer", 10),
            product("Khukri", "rum", 50),
        ];
        let rows = stock_by_category(&products);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, Category::Beer);
        assert_eq!((rows[0].in_stock, rows[0].low_stock, rows[0].out_of_stock), (1, 1, 1));
        assert_eq!(rows[1].category, Category::Rum);
    }

    #[test]
    fn product_shares_are_rounded_and_sorted() {
        let products = vec![
            product("a", "gin", 1),
            product("b", "wine", 1),
            product("c", "wine", 1),
        ];
        let rows = products_by_category(&products);
        assert_eq!(rows[0].category, Category::Wine);
        assert_eq!(rows[0].percentage, 67);
        assert_eq!(rows[1].percentage, 33);
    }

    #[test]
    fn revenue_uses_current_category_and_skips_deleted_products() {
        let beer = product("Arna", "beer", 20);
        let rum = product("Khukri", "rum", 20);
        let gone = product("Old Stock", "gin", 0);
        let orders = vec![
            order(vec![(&beer, 300.0, 2), (&rum, 1000.0, 1)]),
            order(vec![(&gone, 500.0, 1)]),
        ];
        let rows = revenue_by_category(&orders, &[beer, rum]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, Category::Rum);
        assert_eq!(rows[0].revenue, 1000.0);
        assert_eq!(rows[0].percentage, 63);
        assert_eq!(rows[1].count, 2);
        assert_eq!(rows[1].percentage, 38);
    }

    #[test]
    fn no_revenue_means_zero_percentages() {
        let beer = product("Arna", "beer", 20);
        let orders = vec![order(vec![(&beer, 0.0, 3)])];
        let rows = revenue_by_category(&orders, &[beer]);
        assert_eq!(rows[0].percentage, 0);
    }
}
