//! Request extractors and query-string DTOs, mapped onto domain filters.

use std::str::FromStr;

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use flame_auth::{Role, UserFilter};
use flame_catalog::{Category, ProductFilter, ReviewFilter, StockStatus};
use flame_core::{DomainResult, PageRequest, SortOrder, DEFAULT_LIMIT};
use flame_notifications::{NotificationFilter, NotificationKind};
use flame_sales::{OrderFilter, OrderStatus, PaymentFilter, PaymentMethod, PaymentStatus};

use super::errors::ApiError;

// -------------------------
// Extractors
// -------------------------

/// `axum::Json` whose rejection is a 400 in the standard envelope.
pub struct Body<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Body(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// `axum::extract::Query` with an enveloped 400 on malformed input.
pub struct Params<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        axum::extract::Query::<T>::from_request_parts(parts, state)
            .await
            .map(|q| Params(q.0))
            .map_err(|e: QueryRejection| ApiError::BadRequest(e.body_text()))
    }
}

/// A typed id from the `:id` path segment.
pub struct Id<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Id<T>
where
    T: FromStr<Err = flame_core::DomainError> + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(raw) = axum::extract::Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e: PathRejection| ApiError::BadRequest(e.body_text()))?;
        Ok(Id(raw.parse()?))
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockRequest {
    pub stock: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReorderRequest {
    pub quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MostReviewedQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThresholdQuery {
    pub threshold: Option<i64>,
}

/// Query string shared by every list endpoint. Each list reads the filters
/// it understands and ignores the rest.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub method: Option<String>,
    pub product_id: Option<String>,
    pub rating: Option<u8>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub is_read: Option<bool>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub threshold: Option<i64>,
}

/// Blank query values count as absent.
fn given(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parsed<T: FromStr<Err = flame_core::DomainError>>(v: &Option<String>) -> DomainResult<Option<T>> {
    given(v).map(str::parse).transpose()
}

impl ListQuery {
    pub fn page(&self) -> PageRequest {
        self.page_with_default(DEFAULT_LIMIT)
    }

    pub fn page_with_default(&self, default_limit: u32) -> PageRequest {
        PageRequest::new(self.page, self.limit, default_limit).with_sort(
            given(&self.sort_by).map(str::to_string),
            given(&self.sort_order).and_then(SortOrder::parse),
        )
    }

    fn search(&self) -> Option<String> {
        given(&self.search).map(str::to_string)
    }

    pub fn product_filter(&self) -> DomainResult<ProductFilter> {
        Ok(ProductFilter {
            search: self.search(),
            category: parsed::<Category>(&self.category)?,
            status: given(&self.status).map(StockStatus::parse_filter).transpose()?,
        })
    }

    pub fn order_filter(&self) -> DomainResult<OrderFilter> {
        Ok(OrderFilter {
            search: self.search(),
            status: parsed::<OrderStatus>(&self.status)?,
            payment_method: parsed::<PaymentMethod>(&self.payment_method)?,
        })
    }

    pub fn payment_filter(&self) -> DomainResult<PaymentFilter> {
        Ok(PaymentFilter {
            search: self.search(),
            method: parsed::<PaymentMethod>(&self.method)?,
            status: parsed::<PaymentStatus>(&self.status)?,
        })
    }

    pub fn review_filter(&self) -> DomainResult<ReviewFilter> {
        Ok(ReviewFilter {
            search: self.search(),
            product_id: parsed(&self.product_id)?,
            rating: self.rating,
        })
    }

    pub fn notification_filter(&self) -> DomainResult<NotificationFilter> {
        Ok(NotificationFilter {
            kind: parsed::<NotificationKind>(&self.kind)?,
            is_read: self.is_read,
        })
    }

    pub fn user_filter(&self) -> DomainResult<UserFilter> {
        Ok(UserFilter {
            role: parsed::<Role>(&self.role)?,
            is_active: self.is_active,
            search: self.search(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: &str) -> ListQuery {
        serde_json::from_value(serde_json::Value::Object(
            raw.split('&')
                .filter_map(|kv| kv.split_once('='))
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect(),
        ))
        .unwrap()
    }

    #[test]
    fn paging_defaults_and_sort_parsing() {
        let q = ListQuery::default();
        assert_eq!(q.page(), PageRequest::new(None, None, DEFAULT_LIMIT));
        assert_eq!(q.page_with_default(20).limit, 20);

        let q = query("sortBy=price&sortOrder=ASC");
        let page = q.page();
        assert_eq!(page.sort_by.as_deref(), Some("price"));
        assert_eq!(page.sort_order, Some(SortOrder::Asc));

        let q = query("sortBy= &sortOrder=sideways");
        assert_eq!(q.page().sort_by, None);
        assert_eq!(q.page().sort_order, None);
    }

    #[test]
    fn filters_parse_their_enums() {
        let q = query("category=Vodka&status=low-stock&search=smir");
        let f = q.product_filter().unwrap();
        assert_eq!(f.category, Some(Category::Vodka));
        assert_eq!(f.status, Some(StockStatus::LowStock));
        assert_eq!(f.search.as_deref(), Some("smir"));

        let q = query("status=completed&paymentMethod=COD");
        let f = q.order_filter().unwrap();
        assert_eq!(f.status, Some(OrderStatus::Completed));
        assert_eq!(f.payment_method, Some(PaymentMethod::Cod));
    }

    #[test]
    fn blank_filters_are_ignored_and_bad_ones_rejected() {
        let q = query("category=&status=");
        assert!(q.product_filter().unwrap().category.is_none());

        let q = query("category=lemonade");
        assert!(q.product_filter().is_err());
        let q = query("type=Gossip");
        assert!(q.notification_filter().is_err());
    }
}
