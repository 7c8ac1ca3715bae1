use chrono::Utc;
use tracing::{info, instrument};

use flame_catalog::{rating_aggregate, NewProduct, Product, ProductFilter, ProductPatch};
use flame_core::{DomainError, Page, PageRequest, ProductId, SortOrder};

use super::notifications::raise_low_stock_alert;
use super::{product_sort_key, sort_records, ProductView, ServiceResult};
use crate::store::Repositories;

#[derive(Clone)]
pub struct ProductService {
    repos: Repositories,
}

impl ProductService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn list(&self, filter: &ProductFilter, page: &PageRequest) -> ServiceResult<Page<ProductView>> {
        let mut products: Vec<Product> = self
            .repos
            .products
            .list()
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        sort_records(&mut products, page, ("createdAt", SortOrder::Desc), product_sort_key);
        Ok(Page::from_sorted(products, page).map(ProductView::from))
    }

    pub async fn get(&self, id: ProductId) -> ServiceResult<ProductView> {
        Ok(self.load(id).await?.into())
    }

    #[instrument(skip(self, input), err)]
    pub async fn create(&self, input: NewProduct) -> ServiceResult<ProductView> {
        let now = Utc::now();
        let product = Product::create(input, now)?;
        self.repos.products.insert(&product).await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        raise_low_stock_alert(&self.repos, &product, now).await?;
        Ok(product.into())
    }

    #[instrument(skip(self, patch), err)]
    pub async fn update(&self, id: ProductId, patch: ProductPatch) -> ServiceResult<ProductView> {
        let now = Utc::now();
        let mut product = self.load(id).await?;
        product.apply(patch, now)?;
        if !self.repos.products.update(&product).await? {
            return Err(DomainError::not_found("Product").into());
        }
        raise_low_stock_alert(&self.repos, &product, now).await?;
        Ok(product.into())
    }

    /// Explicit stock correction; runs the same low-stock check as an update.
    pub async fn set_stock(&self, id: ProductId, stock: Option<i64>) -> ServiceResult<ProductView> {
        let stock = stock.ok_or_else(|| DomainError::validation("Stock is required"))?;
        self.update(id, ProductPatch::stock_only(stock)).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: ProductId) -> ServiceResult<Product> {
        let product = self
            .repos
            .products
            .delete(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product"))?;
        info!(product_id = %id, "product deleted");
        Ok(product)
    }

    /// Rebuild price and rating fields from their sources. Returns the
    /// product and whether anything had drifted.
    #[instrument(skip(self), err)]
    pub async fn repair(&self, id: ProductId) -> ServiceResult<(ProductView, bool)> {
        let mut product = self.load(id).await?;
        let reviews = self.repos.reviews.list_for_product(id).await?;
        let drifted = product.repair(rating_aggregate(reviews.iter().map(|r| r.rating)), Utc::now());
        if drifted {
            self.repos.products.update(&product).await?;
            info!(product_id = %id, "repaired drifted product fields");
        }
        Ok((product.into(), drifted))
    }

    async fn load(&self, id: ProductId) -> ServiceResult<Product> {
        Ok(self
            .repos
            .products
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_catalog::{StockStatus, LOW_STOCK_THRESHOLD};
    use flame_notifications::NotificationKind;

    fn new_product(name: &str, price: f64, discount: f64, stock: i64) -> NewProduct {
        NewProduct {
            name: Some(name.into()),
            category: Some("whiskey".into()),
            price: Some(price),
            discount_percent: Some(discount),
            stock: Some(stock),
            ..Default::default()
        }
    }

    async fn low_stock_alerts(repos: &Repositories) -> usize {
        repos
            .notifications
            .list()
            .await
            .unwrap()
            .iter()
            .filter(|n| n.kind == NotificationKind::LowStockAlert && !n.is_read)
            .count()
    }

    #[tokio::test]
    async fn final_price_follows_price_and_discount() {
        let repos = Repositories::in_memory();
        let svc = ProductService::new(repos);
        let created = svc.create(new_product("Old Durbar", 40.0, 25.0, 50)).await.unwrap();
        assert_eq!(created.product.final_price, 30.0);
        assert_eq!(created.product.discount_amount, 10.0);

        let updated = svc
            .update(
                created.product.id,
                ProductPatch {
                    price: Some(80.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.product.final_price, 60.0);
        assert_eq!(updated.status, StockStatus::InStock);
    }

    #[tokio::test]
    async fn repeated_low_stock_updates_raise_one_alert() {
        let repos = Repositories::in_memory();
        let svc = ProductService::new(repos.clone());
        let p = svc.create(new_product("Khukri", 10.0, 0.0, 50)).await.unwrap();

        svc.set_stock(p.product.id, Some(5)).await.unwrap();
        svc.set_stock(p.product.id, Some(4)).await.unwrap();
        assert_eq!(low_stock_alerts(&repos).await, 1);

        repos.notifications.mark_all_read(Utc::now()).await.unwrap();
        svc.set_stock(p.product.id, Some(3)).await.unwrap();
        assert_eq!(low_stock_alerts(&repos).await, 1);
        assert_eq!(repos.notifications.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn creating_low_or_empty_stock_only_alerts_when_strictly_between() {
        let repos = Repositories::in_memory();
        let svc = ProductService::new(repos.clone());
        svc.create(new_product("Empty", 10.0, 0.0, 0)).await.unwrap();
        svc.create(new_product("Exactly", 10.0, 0.0, LOW_STOCK_THRESHOLD)).await.unwrap();
        assert_eq!(low_stock_alerts(&repos).await, 0);

        svc.create(new_product("Nine", 10.0, 0.0, 9)).await.unwrap();
        assert_eq!(low_stock_alerts(&repos).await, 1);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_sorts() {
        let svc = ProductService::new(Repositories::in_memory());
        svc.create(new_product("B", 20.0, 0.0, 0)).await.unwrap();
        svc.create(new_product("A", 10.0, 0.0, 5)).await.unwrap();
        svc.create(new_product("C", 30.0, 0.0, 100)).await.unwrap();

        let filter = ProductFilter::default();
        let page = PageRequest::default().with_sort(Some("price".into()), Some(SortOrder::Asc));
        let names: Vec<_> = svc
            .list(&filter, &page)
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|p| p.product.name)
            .collect();
        assert_eq!(names, ["A", "B", "C"]);

        let filter = ProductFilter {
            status: Some(StockStatus::OutOfStock),
            ..Default::default()
        };
        let page = svc.list(&filter, &PageRequest::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.items[0].product.name, "B");
    }

    #[tokio::test]
    async fn repair_restores_drifted_fields() {
        let repos = Repositories::in_memory();
        let svc = ProductService::new(repos.clone());
        let created = svc.create(new_product("Signature", 50.0, 10.0, 20)).await.unwrap();

        let mut drifted = created.product.clone();
        drifted.final_price = 1.0;
        drifted.rating = 4.2;
        repos.products.update(&drifted).await.unwrap();

        let (fixed, changed) = svc.repair(created.product.id).await.unwrap();
        assert!(changed);
        assert_eq!(fixed.product.final_price, 45.0);
        assert_eq!(fixed.product.rating, 0.0);

        let (_, changed_again) = svc.repair(created.product.id).await.unwrap();
        assert!(!changed_again);
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let svc = ProductService::new(Repositories::in_memory());
        let err = svc.get(ProductId::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Product not found");
    }
}
