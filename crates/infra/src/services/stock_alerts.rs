use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use flame_catalog::{Category, Product, ProductFilter, StockStatus, LOW_STOCK_THRESHOLD};
use flame_core::{DomainError, Page, PageRequest, ProductId, SortOrder};

use super::{product_sort_key, sort_records, ProductView, ServiceResult};
use crate::store::{Repositories, Restock};

/// A product on an alert list. The status is the list's label, not the
/// product's derived status, so a custom threshold can report "Low Stock"
/// above the default cut-off.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAlertItem {
    #[serde(flatten)]
    pub product: Product,
    pub status: StockStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_units: Option<i64>,
}

impl StockAlertItem {
    fn out_of_stock(product: Product) -> Self {
        Self {
            product,
            status: StockStatus::OutOfStock,
            remaining_units: None,
        }
    }

    fn low_stock(product: Product) -> Self {
        let remaining = product.stock;
        Self {
            product,
            status: StockStatus::LowStock,
            remaining_units: Some(remaining),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertGroup<T> {
    pub count: usize,
    pub products: Vec<T>,
}

impl<T> From<Vec<T>> for AlertGroup<T> {
    fn from(products: Vec<T>) -> Self {
        Self {
            count: products.len(),
            products,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllStockAlerts {
    pub out_of_stock: AlertGroup<StockAlertItem>,
    /// Same products as `low_stock`; both names are served.
    pub going_to_be_out_of_stock: AlertGroup<StockAlertItem>,
    pub low_stock: AlertGroup<StockAlertItem>,
}

/// Just the fields a purchaser needs on a reorder sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReorderLine {
    pub id: ProductId,
    pub name: String,
    pub category: Category,
    pub brand: Option<String>,
    pub price: f64,
    pub stock: i64,
}

impl From<Product> for ReorderLine {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            category: p.category,
            brand: p.brand,
            price: p.price,
            stock: p.stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderReport {
    pub generated_at: DateTime<Utc>,
    pub threshold: i64,
    pub out_of_stock: AlertGroup<ReorderLine>,
    pub low_stock: AlertGroup<ReorderLine>,
    pub total_products_needing_reorder: usize,
}

/// Threshold from the query string; absent or non-positive means the default.
pub fn threshold_or_default(threshold: Option<i64>) -> i64 {
    threshold.filter(|t| *t > 0).unwrap_or(LOW_STOCK_THRESHOLD)
}

fn is_low(p: &Product, threshold: i64) -> bool {
    p.stock > 0 && p.stock < threshold
}

#[derive(Clone)]
pub struct StockAlertService {
    repos: Repositories,
}

impl StockAlertService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn out_of_stock(&self, filter: &ProductFilter, page: &PageRequest) -> ServiceResult<Page<StockAlertItem>> {
        let mut products = self.matching(filter, |p| p.stock == 0).await?;
        sort_records(&mut products, page, ("name", SortOrder::Asc), product_sort_key);
        Ok(Page::from_sorted(products, page).map(StockAlertItem::out_of_stock))
    }

    pub async fn low_stock(
        &self,
        filter: &ProductFilter,
        threshold: Option<i64>,
        page: &PageRequest,
    ) -> ServiceResult<Page<StockAlertItem>> {
        let threshold = threshold_or_default(threshold);
        let mut products = self.matching(filter, |p| is_low(p, threshold)).await?;
        sort_records(&mut products, page, ("stock", SortOrder::Asc), product_sort_key);
        Ok(Page::from_sorted(products, page).map(StockAlertItem::low_stock))
    }

    pub async fn all(&self, threshold: Option<i64>) -> ServiceResult<AllStockAlerts> {
        let threshold = threshold_or_default(threshold);
        let products = self.repos.products.list().await?;
        let (out, low): (Vec<_>, Vec<_>) = products
            .into_iter()
            .filter(|p| p.stock == 0 || is_low(p, threshold))
            .partition(|p| p.stock == 0);
        let low: Vec<StockAlertItem> = low.into_iter().map(StockAlertItem::low_stock).collect();
        Ok(AllStockAlerts {
            out_of_stock: out.into_iter().map(StockAlertItem::out_of_stock).collect::<Vec<_>>().into(),
            going_to_be_out_of_stock: low.clone().into(),
            low_stock: low.into(),
        })
    }

    pub async fn reorder_report(&self, threshold: Option<i64>) -> ServiceResult<ReorderReport> {
        let threshold = threshold_or_default(threshold);
        let products = self.repos.products.list().await?;
        let (mut out, mut low): (Vec<_>, Vec<_>) = products
            .into_iter()
            .filter(|p| p.stock == 0 || is_low(p, threshold))
            .partition(|p| p.stock == 0);
        out.sort_by(|a, b| (a.category.as_str(), &a.name).cmp(&(b.category.as_str(), &b.name)));
        low.sort_by(|a, b| (a.stock, a.category.as_str(), &a.name).cmp(&(b.stock, b.category.as_str(), &b.name)));

        let total = out.len() + low.len();
        Ok(ReorderReport {
            generated_at: Utc::now(),
            threshold,
            out_of_stock: out.into_iter().map(ReorderLine::from).collect::<Vec<_>>().into(),
            low_stock: low.into_iter().map(ReorderLine::from).collect::<Vec<_>>().into(),
            total_products_needing_reorder: total,
        })
    }

    /// Add `quantity` units. Does not raise or clear low-stock alerts.
    #[instrument(skip(self), err)]
    pub async fn reorder(&self, id: ProductId, quantity: Option<i64>) -> ServiceResult<ProductView> {
        let quantity = quantity
            .filter(|q| *q > 0)
            .ok_or_else(|| DomainError::validation("Valid quantity is required"))?;
        let product = match self.repos.products.restock(id, quantity, Utc::now()).await? {
            Restock::Restocked(product) => product,
            Restock::Overflow { stock } => {
                return Err(DomainError::validation(format!(
                    "Quantity is too large. Current stock: {stock}"
                ))
                .into());
            }
            Restock::Missing => return Err(DomainError::not_found("Product").into()),
        };
        info!(product_id = %id, quantity, stock = product.stock, "product restocked");
        Ok(product.into())
    }

    async fn matching(&self, filter: &ProductFilter, keep: impl Fn(&Product) -> bool) -> ServiceResult<Vec<Product>> {
        Ok(self
            .repos
            .products
            .list()
            .await?
            .into_iter()
            .filter(|p| keep(p) && filter.matches(p))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_catalog::NewProduct;

    async fn seed(repos: &Repositories, name: &str, category: &str, stock: i64) -> Product {
        let p = Product::create(
            NewProduct {
                name: Some(name.into()),
                category: Some(category.into()),
                price: Some(100.0),
                stock: Some(stock),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        repos.products.insert(&p).await.unwrap();
        p
    }

    async fn shelf() -> Repositories {
        let repos = Repositories::in_memory();
        seed(&repos, "Zubrowka", "vodka", 0).await;
        seed(&repos, "Bacardi", "rum", 0).await;
        seed(&repos, "Smirnoff", "vodka", 7).await;
        seed(&repos, "Absolut", "vodka", 2).await;
        seed(&repos, "Jameson", "whiskey", 15).await;
        seed(&repos, "Gilbeys", "gin", 40).await;
        repos
    }

    #[tokio::test]
    async fn out_of_stock_defaults_to_name_order() {
        let svc = StockAlertService::new(shelf().await);
        let page = svc.out_of_stock(&ProductFilter::default(), &PageRequest::default()).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|i| i.product.name.as_str()).collect();
        assert_eq!(names, ["Bacardi", "Zubrowka"]);
        assert!(page.items.iter().all(|i| i.status == StockStatus::OutOfStock));
    }

    #[tokio::test]
    async fn low_stock_honours_custom_threshold() {
        let svc = StockAlertService::new(shelf().await);
        let all = ProductFilter::default();
        let default = svc.low_stock(&all, None, &PageRequest::default()).await.unwrap();
        let stocks: Vec<_> = default.items.iter().map(|i| i.remaining_units).collect();
        assert_eq!(stocks, [Some(2), Some(7)]);

        let wide = svc.low_stock(&all, Some(20), &PageRequest::default()).await.unwrap();
        assert_eq!(wide.pagination.total, 3);
        assert_eq!(wide.items[2].product.name, "Jameson");
        assert_eq!(wide.items[2].status, StockStatus::LowStock);
    }

    #[tokio::test]
    async fn all_alerts_serve_the_low_list_twice() {
        let svc = StockAlertService::new(shelf().await);
        let alerts = svc.all(None).await.unwrap();
        assert_eq!(alerts.out_of_stock.count, 2);
        assert_eq!(alerts.low_stock.count, 2);
        assert_eq!(alerts.going_to_be_out_of_stock, alerts.low_stock);
    }

    #[tokio::test]
    async fn reorder_report_sorts_each_list() {
        let svc = StockAlertService::new(shelf().await);
        let report = svc.reorder_report(None).await.unwrap();
        assert_eq!(report.threshold, LOW_STOCK_THRESHOLD);
        assert_eq!(report.total_products_needing_reorder, 4);
        let out: Vec<_> = report.out_of_stock.products.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(out, ["Bacardi", "Zubrowka"]);
        let low: Vec<_> = report.low_stock.products.iter().map(|l| l.stock).collect();
        assert_eq!(low, [2, 7]);
    }

    #[tokio::test]
    async fn reorder_adds_stock_without_alerting() {
        let repos = shelf().await;
        let svc = StockAlertService::new(repos.clone());
        let p = seed(&repos, "Tuborg", "beer", 1).await;

        let view = svc.reorder(p.id, Some(3)).await.unwrap();
        assert_eq!(view.product.stock, 4);
        assert_eq!(view.status, StockStatus::LowStock);
        assert!(repos.notifications.list().await.unwrap().is_empty());

        let err = svc.reorder(p.id, Some(0)).await.unwrap_err();
        assert_eq!(err.to_string(), "Valid quantity is required");
        let err = svc.reorder(ProductId::new(), Some(5)).await.unwrap_err();
        assert_eq!(err.to_string(), "Product not found");
    }

    #[tokio::test]
    async fn reorder_past_the_stock_ceiling_is_a_bad_request() {
        let repos = shelf().await;
        let svc = StockAlertService::new(repos.clone());
        let p = seed(&repos, "Carlsberg", "beer", 5).await;

        let err = svc.reorder(p.id, Some(i64::MAX)).await.unwrap_err();
        assert_eq!(err.class(), crate::services::ErrorClass::BadRequest);
        assert_eq!(err.to_string(), "Quantity is too large. Current stock: 5");
        assert_eq!(repos.products.get(p.id).await.unwrap().unwrap().stock, 5);
    }
}
