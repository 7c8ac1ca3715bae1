use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use flame_catalog::{rating_aggregate, Category, NewReview, Review, ReviewFilter, ReviewPatch, ReviewSummary};
use flame_core::{DomainError, Page, PageRequest, ProductId, ReviewId, SortOrder};

use super::{sort_records, ProductSummary, ServiceResult, SortKey};
use crate::store::Repositories;

/// Default size of the most-reviewed list.
pub const MOST_REVIEWED_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MostReviewed {
    pub rank: usize,
    pub id: ProductId,
    pub name: String,
    pub category: Category,
    pub image_url: Option<String>,
    pub rating: f64,
    pub review_count: i64,
}

fn review_sort_key(r: &Review, field: &str) -> Option<SortKey> {
    Some(match field {
        "createdAt" => r.created_at.into(),
        "updatedAt" => r.updated_at.into(),
        "rating" => i64::from(r.rating).into(),
        "customerName" => r.customer_name.as_str().into(),
        "isVerified" => r.is_verified.into(),
        _ => return None,
    })
}

#[derive(Clone)]
pub struct ReviewService {
    repos: Repositories,
}

impl ReviewService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn list(&self, filter: &ReviewFilter, page: &PageRequest) -> ServiceResult<Page<ReviewView>> {
        let mut reviews: Vec<Review> = self
            .repos
            .reviews
            .list()
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        sort_records(&mut reviews, page, ("createdAt", SortOrder::Desc), review_sort_key);
        let page = Page::from_sorted(reviews, page);

        let mut products: HashMap<ProductId, Option<ProductSummary>> = HashMap::new();
        for review in &page.items {
            if !products.contains_key(&review.product_id) {
                let summary = self.repos.products.get(review.product_id).await?.map(|p| ProductSummary::from(&p));
                products.insert(review.product_id, summary);
            }
        }
        Ok(page.map(|review| ReviewView {
            product: products.get(&review.product_id).cloned().flatten(),
            review,
        }))
    }

    pub async fn get(&self, id: ReviewId) -> ServiceResult<ReviewView> {
        let review = self.load(id).await?;
        let product = self
            .repos
            .products
            .get(review.product_id)
            .await?
            .map(|p| ProductSummary::from(&p));
        Ok(ReviewView { review, product })
    }

    pub async fn summary(&self) -> ServiceResult<ReviewSummary> {
        let reviews = self.repos.reviews.list().await?;
        Ok(ReviewSummary::from_ratings(reviews.iter().map(|r| r.rating)))
    }

    /// Products with at least one review, most reviewed first.
    pub async fn most_reviewed(&self, limit: Option<usize>) -> ServiceResult<Vec<MostReviewed>> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(MOST_REVIEWED_LIMIT);
        let mut products: Vec<_> = self
            .repos
            .products
            .list()
            .await?
            .into_iter()
            .filter(|p| p.review_count > 0)
            .collect();
        products.sort_by(|a, b| b.review_count.cmp(&a.review_count));
        Ok(products
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, p)| MostReviewed {
                rank: i + 1,
                id: p.id,
                name: p.name,
                category: p.category,
                image_url: p.image_url,
                rating: p.rating,
                review_count: p.review_count,
            })
            .collect())
    }

    #[instrument(skip(self, input), err)]
    pub async fn create(&self, input: NewReview) -> ServiceResult<Review> {
        let now = Utc::now();
        let review = Review::create(input, now)?;
        if self.repos.products.get(review.product_id).await?.is_none() {
            return Err(DomainError::not_found("Product").into());
        }
        self.repos.reviews.insert(&review).await?;
        info!(review_id = %review.id, product_id = %review.product_id, rating = review.rating, "review created");
        self.refresh_rating(review.product_id, now).await?;
        Ok(review)
    }

    #[instrument(skip(self, patch), err)]
    pub async fn update(&self, id: ReviewId, patch: ReviewPatch) -> ServiceResult<Review> {
        let now = Utc::now();
        let mut review = self.load(id).await?;
        review.apply(patch, now)?;
        if !self.repos.reviews.update(&review).await? {
            return Err(DomainError::not_found("Review").into());
        }
        self.refresh_rating(review.product_id, now).await?;
        Ok(review)
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: ReviewId) -> ServiceResult<Review> {
        let review = self
            .repos
            .reviews
            .delete(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Review"))?;
        info!(review_id = %id, "review deleted");
        self.refresh_rating(review.product_id, Utc::now()).await?;
        Ok(review)
    }

    /// Re-scan every review of `product` and store the mean and count.
    async fn refresh_rating(&self, product: ProductId, now: DateTime<Utc>) -> ServiceResult<()> {
        let Some(mut p) = self.repos.products.get(product).await? else {
            debug!(product_id = %product, "reviewed product is gone; nothing to refresh");
            return Ok(());
        };
        let reviews = self.repos.reviews.list_for_product(product).await?;
        let aggregate = rating_aggregate(reviews.iter().map(|r| r.rating));
        p.set_rating(aggregate, now);
        self.repos.products.update(&p).await?;
        debug!(product_id = %product, rating = aggregate.rating, count = aggregate.count, "product rating refreshed");
        Ok(())
    }

    async fn load(&self, id: ReviewId) -> ServiceResult<Review> {
        Ok(self
            .repos
            .reviews
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Review"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_catalog::{NewProduct, Product};

    async fn product(repos: &Repositories, name: &str) -> Product {
        let p = Product::create(
            NewProduct {
                name: Some(name.into()),
                category: Some("wine".into()),
                price: Some(1200.0),
                stock: Some(30),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        repos.products.insert(&p).await.unwrap();
        p
    }

    fn review(product: ProductId, rating: i64) -> NewReview {
        NewReview {
            product_id: Some(product.to_string()),
            customer_name: Some("Anita".into()),
            rating: Some(rating),
            comment: Some("Good value".into()),
            is_verified: None,
        }
    }

    async fn stored(repos: &Repositories, id: ProductId) -> Product {
        repos.products.get(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn first_review_sets_rating_and_delete_resets_it() {
        let repos = Repositories::in_memory();
        let svc = ReviewService::new(repos.clone());
        let p = product(&repos, "Divine").await;

        let r = svc.create(review(p.id, 5)).await.unwrap();
        let after = stored(&repos, p.id).await;
        assert_eq!(after.rating, 5.0);
        assert_eq!(after.review_count, 1);

        svc.delete(r.id).await.unwrap();
        let after = stored(&repos, p.id).await;
        assert_eq!(after.rating, 0.0);
        assert_eq!(after.review_count, 0);
    }

    #[tokio::test]
    async fn edits_rescan_all_reviews() {
        let repos = Repositories::in_memory();
        let svc = ReviewService::new(repos.clone());
        let p = product(&repos, "Hinwa").await;
        svc.create(review(p.id, 4)).await.unwrap();
        let r = svc.create(review(p.id, 5)).await.unwrap();
        assert_eq!(stored(&repos, p.id).await.rating, 4.5);

        svc.update(
            r.id,
            ReviewPatch {
                rating: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let after = stored(&repos, p.id).await;
        assert_eq!(after.rating, 2.5);
        assert_eq!(after.review_count, 2);
    }

    #[tokio::test]
    async fn reviews_need_an_existing_product() {
        let repos = Repositories::in_memory();
        let svc = ReviewService::new(repos.clone());
        let err = svc.create(review(ProductId::new(), 3)).await.unwrap_err();
        assert_eq!(err.to_string(), "Product not found");
        assert!(repos.reviews.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn most_reviewed_ranks_by_count() {
        let repos = Repositories::in_memory();
        let svc = ReviewService::new(repos.clone());
        let a = product(&repos, "A").await;
        let b = product(&repos, "B").await;
        product(&repos, "Unreviewed").await;
        svc.create(review(a.id, 3)).await.unwrap();
        for _ in 0..3 {
            svc.create(review(b.id, 4)).await.unwrap();
        }

        let ranked = svc.most_reviewed(None).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!((ranked[0].rank, ranked[0].name.as_str(), ranked[0].review_count), (1, "B", 3));
        assert_eq!(ranked[1].name, "A");
        assert_eq!(svc.most_reviewed(Some(1)).await.unwrap().len(), 1);

        let summary = svc.summary().await.unwrap();
        assert_eq!(summary.total_reviews, 4);
        assert_eq!(summary.average_rating, 3.8);
        assert_eq!(summary.rating_distribution["4"], 3);
    }
}
