use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flame_core::{contains_ci, DomainError, DomainResult, ProductId};

use crate::review::RatingAggregate;

/// Stock strictly below this (and above zero) is "low".
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Beverage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Beer,
    Brandy,
    Gin,
    Rum,
    Tequila,
    Vodka,
    Whiskey,
    Wine,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Beer,
        Category::Brandy,
        Category::Gin,
        Category::Rum,
        Category::Tequila,
        Category::Vodka,
        Category::Whiskey,
        Category::Wine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Beer => "beer",
            Category::Brandy => "brandy",
            Category::Gin => "gin",
            Category::Rum => "rum",
            Category::Tequila => "tequila",
            Category::Vodka => "vodka",
            Category::Whiskey => "whiskey",
            Category::Wine => "wine",
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(
                    "Invalid category. Must be one of: beer, brandy, gin, rum, tequila, vodka, whiskey, wine",
                )
            })
    }
}

/// Inventory label derived from the stock count; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "In Stock")]
    InStock,
}

impl StockStatus {
    pub fn of(stock: i64) -> Self {
        if stock <= 0 {
            StockStatus::OutOfStock
        } else if stock < LOW_STOCK_THRESHOLD {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "Out of Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::InStock => "In Stock",
        }
    }

    /// Parse the list filter form: `in-stock`, `low-stock`, `out-of-stock`.
    pub fn parse_filter(s: &str) -> DomainResult<Self> {
        match s {
            "in-stock" => Ok(StockStatus::InStock),
            "low-stock" => Ok(StockStatus::LowStock),
            "out-of-stock" => Ok(StockStatus::OutOfStock),
            _ => Err(DomainError::validation(
                "Invalid status. Use 'in-stock', 'low-stock' or 'out-of-stock'",
            )),
        }
    }
}

/// Whether a stock level should raise a low-stock alert.
pub fn needs_low_stock_alert(stock: i64) -> bool {
    stock > 0 && stock < LOW_STOCK_THRESHOLD
}

/// `(discount_amount, final_price)` for a list price and a flat percentage.
pub fn pricing(price: f64, discount_percent: f64) -> (f64, f64) {
    let discount_amount = price * discount_percent / 100.0;
    let final_price = (price - discount_amount).max(0.0);
    (discount_amount, final_price)
}

/// A catalog record.
///
/// `discount_amount`, `final_price`, `rating` and `review_count` are
/// materialized: they are rewritten alongside every mutation of their sources
/// and can be rebuilt with [`Product::repair`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: Option<String>,
    pub category: Category,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub discount_percent: f64,
    pub discount_amount: f64,
    pub final_price: f64,
    pub stock: i64,
    pub rating: f64,
    pub total_sold: i64,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create input as received from the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub discount_percent: Option<f64>,
    pub stock: Option<i64>,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub discount_percent: Option<f64>,
    pub stock: Option<i64>,
}

impl ProductPatch {
    pub fn stock_only(stock: i64) -> Self {
        Self {
            stock: Some(stock),
            ..Default::default()
        }
    }
}

impl Product {
    pub fn create(input: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = input
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DomainError::validation("Product name is required"))?;
        let category = input
            .category
            .ok_or_else(|| DomainError::validation("Category is required"))?
            .parse()?;
        let price = check_price(input.price.ok_or_else(|| DomainError::validation("Price is required"))?)?;
        let discount_percent = check_discount(input.discount_percent.unwrap_or(0.0))?;
        let stock = check_stock(input.stock.unwrap_or(0))?;
        let (discount_amount, final_price) = pricing(price, discount_percent);

        Ok(Self {
            id: ProductId::new(),
            name,
            brand: non_blank(input.brand),
            category,
            image_url: non_blank(input.image_url),
            description: non_blank(input.description),
            price,
            discount_percent,
            discount_amount,
            final_price,
            stock,
            rating: 0.0,
            total_sold: 0,
            review_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update; pricing is recomputed whenever price or
    /// discount is touched. Nothing changes if any field is invalid.
    pub fn apply(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let name = match patch.name {
            Some(n) if n.trim().is_empty() => {
                return Err(DomainError::validation("Product name cannot be empty"));
            }
            Some(n) => Some(n.trim().to_string()),
            None => None,
        };
        let category = patch.category.map(|c| c.parse::<Category>()).transpose()?;
        let price = patch.price.map(check_price).transpose()?;
        let discount = patch.discount_percent.map(check_discount).transpose()?;
        let stock = patch.stock.map(check_stock).transpose()?;

        if let Some(n) = name {
            self.name = n;
        }
        if let Some(c) = category {
            self.category = c;
        }
        if patch.brand.is_some() {
            self.brand = non_blank(patch.brand);
        }
        if patch.image_url.is_some() {
            self.image_url = non_blank(patch.image_url);
        }
        if patch.description.is_some() {
            self.description = non_blank(patch.description);
        }
        if price.is_some() || discount.is_some() {
            self.price = price.unwrap_or(self.price);
            self.discount_percent = discount.unwrap_or(self.discount_percent);
            self.reprice();
        }
        if let Some(s) = stock {
            self.stock = s;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::of(self.stock)
    }

    /// `final_price`, falling back to the list price when no final price was
    /// ever computed.
    pub fn unit_price(&self) -> f64 {
        if self.final_price > 0.0 { self.final_price } else { self.price }
    }

    pub fn set_rating(&mut self, aggregate: RatingAggregate, now: DateTime<Utc>) {
        self.rating = aggregate.rating;
        self.review_count = aggregate.count;
        self.updated_at = now;
    }

    /// Rebuild every materialized field from its sources.
    ///
    /// Returns `true` if anything had drifted.
    pub fn repair(&mut self, reviews: RatingAggregate, now: DateTime<Utc>) -> bool {
        let before = (self.discount_amount, self.final_price, self.rating, self.review_count);
        self.reprice();
        self.rating = reviews.rating;
        self.review_count = reviews.count;
        let drifted = before != (self.discount_amount, self.final_price, self.rating, self.review_count);
        if drifted {
            self.updated_at = now;
        }
        drifted
    }

    fn reprice(&mut self) {
        let (amount, final_price) = pricing(self.price, self.discount_percent);
        self.discount_amount = amount;
        self.final_price = final_price;
    }
}

/// Filters for the product list.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Matches name, category or brand.
    pub search: Option<String>,
    pub category: Option<Category>,
    pub status: Option<StockStatus>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if self.category.is_some_and(|c| c != product.category) {
            return false;
        }
        if self.status.is_some_and(|s| s != product.status()) {
            return false;
        }
        match self.search.as_deref().filter(|s| !s.is_empty()) {
            Some(q) => {
                contains_ci(&product.name, q)
                    || contains_ci(product.category.as_str(), q)
                    || product.brand.as_deref().is_some_and(|b| contains_ci(b, q))
            }
            None => true,
        }
    }
}

fn check_price(price: f64) -> DomainResult<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(DomainError::validation("Price must be a non-negative number"));
    }
    Ok(price)
}

fn check_discount(discount: f64) -> DomainResult<f64> {
    if !discount.is_finite() || !(0.0..=100.0).contains(&discount) {
        return Err(DomainError::validation("Discount must be between 0 and 100"));
    }
    Ok(discount)
}

fn check_stock(stock: i64) -> DomainResult<i64> {
    if stock < 0 {
        return Err(DomainError::validation("Stock cannot be negative"));
    }
    Ok(stock)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn new_product() -> NewProduct {
        NewProduct {
            name: Some("Khukri Rum".to_string()),
            brand: Some("Khukri".to_string()),
            category: Some("rum".to_string()),
            price: Some(1200.0),
            discount_percent: Some(10.0),
            stock: Some(25),
            ..Default::default()
        }
    }

    #[test]
    fn create_computes_discount_and_final_price() {
        let p = Product::create(new_product(), test_time()).unwrap();
        assert_eq!(p.discount_amount, 120.0);
        assert_eq!(p.final_price, 1080.0);
        assert_eq!(p.status(), StockStatus::InStock);
        assert_eq!(p.rating, 0.0);
    }

    #[test]
    fn create_rejects_unknown_category_and_negative_stock() {
        let bad_category = NewProduct {
            category: Some("cider".to_string()),
            ..new_product()
        };
        assert!(matches!(
            Product::create(bad_category, test_time()),
            Err(DomainError::Validation(_))
        ));

        let bad_stock = NewProduct {
            stock: Some(-1),
            ..new_product()
        };
        assert!(Product::create(bad_stock, test_time()).is_err());
    }

    #[test]
    fn price_change_recomputes_final_price() {
        let mut p = Product::create(new_product(), test_time()).unwrap();
        p.apply(
            ProductPatch {
                price: Some(2000.0),
                ..Default::default()
            },
            test_time(),
        )
        .unwrap();
        assert_eq!(p.final_price, 1800.0);

        p.apply(
            ProductPatch {
                discount_percent: Some(0.0),
                ..Default::default()
            },
            test_time(),
        )
        .unwrap();
        assert_eq!(p.final_price, 2000.0);
        assert_eq!(p.discount_amount, 0.0);
    }

    #[test]
    fn invalid_patch_leaves_product_untouched() {
        let mut p = Product::create(new_product(), test_time()).unwrap();
        let before = p.clone();
        let err = p.apply(
            ProductPatch {
                name: Some("Renamed".to_string()),
                discount_percent: Some(150.0),
                ..Default::default()
            },
            test_time(),
        );
        assert!(err.is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn stock_status_boundaries() {
        assert_eq!(StockStatus::of(0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::of(1), StockStatus::LowStock);
        assert_eq!(StockStatus::of(9), StockStatus::LowStock);
        assert_eq!(StockStatus::of(10), StockStatus::InStock);
        assert!(!needs_low_stock_alert(0));
        assert!(needs_low_stock_alert(9));
        assert!(!needs_low_stock_alert(10));
    }

    #[test]
    fn repair_reports_drift_only_when_fields_changed() {
        let mut p = Product::create(new_product(), test_time()).unwrap();
        assert!(!p.repair(RatingAggregate::default(), test_time()));

        p.final_price = 1.0;
        p.review_count = 7;
        assert!(p.repair(RatingAggregate::default(), test_time()));
        assert_eq!(p.final_price, 1080.0);
        assert_eq!(p.review_count, 0);
    }

    #[test]
    fn filter_searches_name_category_and_brand() {
        let p = Product::create(new_product(), test_time()).unwrap();
        let by_brand = ProductFilter {
            search: Some("KHUK".into()),
            ..Default::default()
        };
        let by_category = ProductFilter {
            search: Some("ru".into()),
            ..Default::default()
        };
        let low = ProductFilter {
            status: Some(StockStatus::LowStock),
            ..Default::default()
        };
        assert!(by_brand.matches(&p));
        assert!(by_category.matches(&p));
        assert!(!low.matches(&p));
    }

    #[test]
    fn status_serializes_as_label() {
        let json = serde_json::to_value(StockStatus::LowStock).unwrap();
        assert_eq!(json, "Low Stock");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: after any price/discount update, the stored final price
            /// equals the formula and is never negative.
            #[test]
            fn final_price_tracks_formula(
                price in 0.0f64..100_000.0,
                discount in 0.0f64..=100.0,
                new_price in proptest::option::of(0.0f64..100_000.0),
                new_discount in proptest::option::of(0.0f64..=100.0),
            ) {
                let input = NewProduct {
                    price: Some(price),
                    discount_percent: Some(discount),
                    ..new_product()
                };
                let mut p = Product::create(input, test_time()).unwrap();
                p.apply(ProductPatch { price: new_price, discount_percent: new_discount, ..Default::default() }, test_time()).unwrap();

                let expected = p.price - p.price * p.discount_percent / 100.0;
                prop_assert_eq!(p.final_price, expected.max(0.0));
                prop_assert!(p.final_price >= 0.0);
            }
        }
    }
}
