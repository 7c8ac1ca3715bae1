use chrono::Utc;
use serde::Serialize;

use flame_analytics::{sales_insights, SalesInsights};
use flame_catalog::{Product, ProductFilter, StockStatus};
use flame_core::{Page, PageRequest, SortOrder};

use super::{product_sort_key, sort_records, ServiceResult};
use crate::store::Repositories;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopSeller {
    #[serde(flatten)]
    pub product: Product,
    /// Position across all pages, starting at 1.
    pub rank: u64,
    pub status: StockStatus,
}

#[derive(Clone)]
pub struct TopSellerService {
    repos: Repositories,
}

impl TopSellerService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Products that have sold at least once.
    pub async fn products(&self, filter: &ProductFilter, page: &PageRequest) -> ServiceResult<Page<TopSeller>> {
        let mut products: Vec<Product> = self
            .repos
            .products
            .list()
            .await?
            .into_iter()
            .filter(|p| p.total_sold > 0 && filter.matches(p))
            .collect();
        sort_records(&mut products, page, ("totalSold", SortOrder::Desc), product_sort_key);

        let offset = page.offset();
        let page = Page::from_sorted(products, page);
        let items = page
            .items
            .into_iter()
            .zip(offset + 1..)
            .map(|(product, rank)| TopSeller {
                status: product.status(),
                product,
                rank,
            })
            .collect();
        Ok(Page {
            items,
            pagination: page.pagination,
        })
    }

    pub async fn insights(&self) -> ServiceResult<SalesInsights> {
        let orders = self.repos.orders.list().await?;
        let products = self.repos.products.list().await?;
        Ok(sales_insights(&orders, &products, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_catalog::NewProduct;

    async fn seed(repos: &Repositories, name: &str, stock: i64, sold: i64) {
        let mut p = Product::create(
            NewProduct {
                name: Some(name.into()),
                category: Some("gin".into()),
                price: Some(500.0),
                stock: Some(stock),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        p.total_sold = sold;
        repos.products.insert(&p).await.unwrap();
    }

    #[tokio::test]
    async fn ranks_continue_across_pages() {
        let repos = Repositories::in_memory();
        seed(&repos, "Never sold", 20, 0).await;
        seed(&repos, "Bombay", 20, 12).await;
        seed(&repos, "Gordon's", 5, 30).await;
        seed(&repos, "Tanqueray", 0, 7).await;
        let svc = TopSellerService::new(repos);

        let first = svc
            .products(&ProductFilter::default(), &PageRequest::new(Some(1), Some(2), 10))
            .await
            .unwrap();
        assert_eq!(first.pagination.total, 3);
        assert_eq!(first.items[0].product.name, "Gordon's");
        assert_eq!(first.items[0].rank, 1);
        assert_eq!(first.items[0].status, StockStatus::LowStock);

        let second = svc
            .products(&ProductFilter::default(), &PageRequest::new(Some(2), Some(2), 10))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].product.name, "Tanqueray");
        assert_eq!(second.items[0].rank, 3);
        assert_eq!(second.items[0].status, StockStatus::OutOfStock);
    }

    #[tokio::test]
    async fn insights_default_to_saturday_without_orders() {
        let svc = TopSellerService::new(Repositories::in_memory());
        let insights = svc.insights().await.unwrap();
        assert_eq!(insights.peak_sales_day.day, "Saturday");
        assert_eq!(insights.trending_category, None);
    }
}
