use chrono::Utc;

use flame_analytics::{
    analytics_summary, products_by_category, revenue_by_category, sales_trend, stock_by_category, AnalyticsSummary,
    CategoryRevenue, CategoryShare, CategoryStock, TrendPoint,
};

use super::ServiceResult;
use crate::store::Repositories;

/// Dashboard reads. Each call loads what it needs and aggregates on the spot.
#[derive(Clone)]
pub struct AnalyticsService {
    repos: Repositories,
}

impl AnalyticsService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn summary(&self) -> ServiceResult<AnalyticsSummary> {
        let orders = self.repos.orders.list().await?;
        let payments = self.repos.payments.list().await?;
        Ok(analytics_summary(&orders, &payments, Utc::now()))
    }

    pub async fn sales_trend(&self) -> ServiceResult<Vec<TrendPoint>> {
        let payments = self.repos.payments.list().await?;
        Ok(sales_trend(&payments))
    }

    pub async fn stock_by_category(&self) -> ServiceResult<Vec<CategoryStock>> {
        let products = self.repos.products.list().await?;
        Ok(stock_by_category(&products))
    }

    pub async fn products_by_category(&self) -> ServiceResult<Vec<CategoryShare>> {
        let products = self.repos.products.list().await?;
        Ok(products_by_category(&products))
    }

    pub async fn revenue_by_category(&self) -> ServiceResult<Vec<CategoryRevenue>> {
        let orders = self.repos.orders.list().await?;
        let products = self.repos.products.list().await?;
        Ok(revenue_by_category(&orders, &products))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StockReservation;
    use crate::services::OrderService;
    use flame_catalog::{NewProduct, Product};
    use flame_sales::{NewCustomer, NewOrder, NewOrderLine};

    #[tokio::test]
    async fn dashboard_reflects_orders_placed_this_month() {
        let repos = Repositories::in_memory();
        let product = Product::create(
            NewProduct {
                name: Some("Nepal Ice".into()),
                category: Some("beer".into()),
                price: Some(300.0),
                stock: Some(20),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        repos.products.insert(&product).await.unwrap();

        let orders = OrderService::new(repos.clone(), StockReservation::Atomic);
        orders
            .place(NewOrder {
                customer: Some(NewCustomer {
                    full_name: Some("Maya".into()),
                    mobile: Some("9811111111".into()),
                    pan_number: None,
                    location: Some("Kathmandu".into()),
                }),
                items: vec![NewOrderLine {
                    product_id: Some(product.id.to_string()),
                    quantity: Some(4),
                }],
                payment_method: Some("QR Payment".into()),
            })
            .await
            .unwrap();

        let svc = AnalyticsService::new(repos);
        let summary = svc.summary().await.unwrap();
        assert_eq!(summary.total_revenue.value, 1200.0);
        assert_eq!(summary.total_revenue.growth, 100);
        assert_eq!(summary.total_sales.value, 1);
        assert_eq!(summary.products_sold.value, 4);

        let revenue = svc.revenue_by_category().await.unwrap();
        assert_eq!(revenue[0].revenue, 1200.0);
        assert_eq!(revenue[0].percentage, 100);

        let trend = svc.sales_trend().await.unwrap();
        assert_eq!(trend.len(), 12);
        assert_eq!(trend.iter().map(|t| t.count).sum::<u64>(), 1);

        let stock = svc.stock_by_category().await.unwrap();
        assert_eq!(stock[0].in_stock, 1);
        assert_eq!(svc.products_by_category().await.unwrap()[0].percentage, 100);
    }
}
