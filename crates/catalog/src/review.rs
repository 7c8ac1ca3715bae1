use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flame_core::{contains_ci, round_to, DomainError, DomainResult, ProductId, ReviewId};

/// A customer review of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub customer_name: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub product_id: Option<String>,
    pub customer_name: Option<String>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
    pub is_verified: Option<bool>,
}

/// Review edits. The owning product cannot be changed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    pub customer_name: Option<String>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
    pub is_verified: Option<bool>,
}

impl Review {
    pub fn create(input: NewReview, now: DateTime<Utc>) -> DomainResult<Self> {
        let product_id: ProductId = input
            .product_id
            .ok_or_else(|| DomainError::validation("Product ID is required"))?
            .parse()?;
        let customer_name = input
            .customer_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DomainError::validation("Customer name is required"))?;
        let rating = check_rating(input.rating.ok_or_else(|| DomainError::validation("Rating is required"))?)?;

        Ok(Self {
            id: ReviewId::new(),
            product_id,
            customer_name,
            rating,
            comment: input.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            is_verified: input.is_verified.unwrap_or(false),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, patch: ReviewPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let rating = patch.rating.map(check_rating).transpose()?;
        let name = match patch.customer_name {
            Some(n) if n.trim().is_empty() => {
                return Err(DomainError::validation("Customer name cannot be empty"));
            }
            Some(n) => Some(n.trim().to_string()),
            None => None,
        };

        if let Some(r) = rating {
            self.rating = r;
        }
        if let Some(n) = name {
            self.customer_name = n;
        }
        if let Some(c) = patch.comment {
            self.comment = Some(c.trim().to_string()).filter(|c| !c.is_empty());
        }
        if let Some(v) = patch.is_verified {
            self.is_verified = v;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn check_rating(rating: i64) -> DomainResult<u8> {
    match rating {
        1..=5 => Ok(rating as u8),
        r if r < 1 => Err(DomainError::validation("Rating must be at least 1")),
        _ => Err(DomainError::validation("Rating cannot exceed 5")),
    }
}

/// A product's materialized rating fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingAggregate {
    /// Mean rating rounded to one decimal; `0` with no reviews.
    pub rating: f64,
    pub count: i64,
}

/// Full re-scan of a product's review ratings.
pub fn rating_aggregate(ratings: impl IntoIterator<Item = u8>) -> RatingAggregate {
    let (sum, count) = ratings
        .into_iter()
        .fold((0u64, 0i64), |(s, c), r| (s + u64::from(r), c + 1));
    if count == 0 {
        return RatingAggregate::default();
    }
    RatingAggregate {
        rating: round_to(sum as f64 / count as f64, 1),
        count,
    }
}

/// Filters for the review list.
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    /// Matches customer name or comment.
    pub search: Option<String>,
    pub product_id: Option<ProductId>,
    pub rating: Option<u8>,
}

impl ReviewFilter {
    pub fn matches(&self, review: &Review) -> bool {
        if self.product_id.is_some_and(|p| p != review.product_id) {
            return false;
        }
        if self.rating.is_some_and(|r| r != review.rating) {
            return false;
        }
        match self.search.as_deref().filter(|s| !s.is_empty()) {
            Some(q) => {
                contains_ci(&review.customer_name, q)
                    || review.comment.as_deref().is_some_and(|c| contains_ci(c, q))
            }
            None => true,
        }
    }
}

/// Store-wide review statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub total_reviews: u64,
    pub average_rating: f64,
    /// Star count (`"1"`..`"5"`) to number of reviews; every star is present.
    pub rating_distribution: BTreeMap<String, u64>,
}

impl ReviewSummary {
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let mut distribution: BTreeMap<String, u64> = (1..=5).map(|s| (s.to_string(), 0)).collect();
        let mut total = 0u64;
        let mut sum = 0u64;
        for r in ratings {
            total += 1;
            sum += u64::from(r);
            if let Some(slot) = distribution.get_mut(&r.to_string()) {
                *slot += 1;
            }
        }
        let average_rating = if total == 0 { 0.0 } else { round_to(sum as f64 / total as f64, 1) };
        Self {
            total_reviews: total,
            average_rating,
            rating_distribution: distribution,
        }
    }
}
