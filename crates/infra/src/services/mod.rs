//! Application services: every read and every side-effect chain the HTTP
//! layer exposes, written against the repository traits.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use flame_auth::{AuthzError, Hs256Jwt, PasswordError, TokenError};
use flame_catalog::{Category, Product, StockStatus};
use flame_core::{DomainError, PageRequest, ProductId, SortOrder};

use crate::config::StockReservation;
use crate::store::{Repositories, StoreError};

pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod export;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod stock_alerts;
pub mod top_sellers;

pub use analytics::AnalyticsService;
pub use auth::{AuthService, LoginRequest, ProfileRequest, Session};
pub use catalog::ProductService;
pub use export::{ExportFormat, ExportService, MonthlyExportRequest, RenderedReport};
pub use notifications::{NotificationFeed, NotificationService, NotificationView};
pub use orders::{OrderItemView, OrderService, OrderView};
pub use payments::{PaymentService, PaymentView};
pub use reviews::{MostReviewed, ReviewService, ReviewView};
pub use stock_alerts::{AlertGroup, AllStockAlerts, ReorderReport, StockAlertItem, StockAlertService};
pub use top_sellers::{TopSeller, TopSellerService};

/// Coarse outcome class the HTTP layer turns into a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Authz(#[from] AuthzError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    /// Credentials or account state rejected.
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("report rendering failed: {0}")]
    Export(String),
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::Domain(DomainError::NotFound(_)) => ErrorClass::NotFound,
            ServiceError::Domain(_) => ErrorClass::BadRequest,
            ServiceError::Store(StoreError::Duplicate(_)) => ErrorClass::BadRequest,
            ServiceError::Store(_) => ErrorClass::Internal,
            ServiceError::Token(TokenError::Signing(_)) => ErrorClass::Internal,
            ServiceError::Token(_) => ErrorClass::Unauthorized,
            ServiceError::Authz(AuthzError::Unauthenticated) => ErrorClass::Unauthorized,
            ServiceError::Authz(AuthzError::Forbidden(_)) => ErrorClass::Forbidden,
            ServiceError::Password(_) => ErrorClass::Internal,
            ServiceError::Unauthorized(_) => ErrorClass::Unauthorized,
            ServiceError::Forbidden(_) => ErrorClass::Forbidden,
            ServiceError::Export(_) => ErrorClass::Internal,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Everything the HTTP layer calls into.
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub products: ProductService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub reviews: ReviewService,
    pub notifications: NotificationService,
    pub stock_alerts: StockAlertService,
    pub top_sellers: TopSellerService,
    pub analytics: AnalyticsService,
    pub export: ExportService,
}

impl Services {
    pub fn new(repos: Repositories, jwt: Arc<Hs256Jwt>, reservation: StockReservation) -> Self {
        Self {
            auth: AuthService::new(repos.clone(), jwt),
            products: ProductService::new(repos.clone()),
            orders: OrderService::new(repos.clone(), reservation),
            payments: PaymentService::new(repos.clone()),
            reviews: ReviewService::new(repos.clone()),
            notifications: NotificationService::new(repos.clone()),
            stock_alerts: StockAlertService::new(repos.clone()),
            top_sellers: TopSellerService::new(repos.clone()),
            analytics: AnalyticsService::new(repos.clone()),
            export: ExportService::new(repos),
        }
    }
}

/// A product as listed, with its derived stock status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub status: StockStatus,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let status = product.status();
        Self { product, status }
    }
}

/// The product fields embedded in orders and reviews.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub category: Category,
    pub image_url: Option<String>,
    pub price: f64,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            category: p.category,
            image_url: p.image_url.clone(),
            price: p.price,
        }
    }
}

/// A value a list can be sorted by.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub(crate) enum SortKey {
    Int(i64),
    Num(f64),
    Text(String),
    Time(DateTime<Utc>),
    Bool(bool),
}

impl From<i64> for SortKey {
    fn from(v: i64) -> Self {
        SortKey::Int(v)
    }
}

impl From<f64> for SortKey {
    fn from(v: f64) -> Self {
        SortKey::Num(v)
    }
}

impl From<&str> for SortKey {
    fn from(v: &str) -> Self {
        SortKey::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for SortKey {
    fn from(v: DateTime<Utc>) -> Self {
        SortKey::Time(v)
    }
}

impl From<bool> for SortKey {
    fn from(v: bool) -> Self {
        SortKey::Bool(v)
    }
}

/// Sort by the requested field, or by `default` when the field is not one
/// `key` knows. Ties keep the incoming order.
pub(crate) fn sort_records<T>(
    items: &mut [T],
    request: &PageRequest,
    default: (&str, SortOrder),
    key: fn(&T, &str) -> Option<SortKey>,
) {
    let requested = request.sort_field(default.0);
    let field = match items.first() {
        Some(first) if key(first, requested).is_none() => default.0,
        _ => requested,
    };
    let order = request.order_or(default.1);
    items.sort_by(|a, b| {
        let ordering = key(a, field)
            .partial_cmp(&key(b, field))
            .unwrap_or(Ordering::Equal);
        order.apply(ordering)
    });
}

pub(crate) fn product_sort_key(p: &Product, field: &str) -> Option<SortKey> {
    Some(match field {
        "name" => p.name.as_str().into(),
        "brand" => p.brand.as_deref().unwrap_or_default().into(),
        "category" => p.category.as_str().into(),
        "price" => p.price.into(),
        "discountPercent" => p.discount_percent.into(),
        "finalPrice" => p.final_price.into(),
        "stock" => p.stock.into(),
        "rating" => p.rating.into(),
        "totalSold" => p.total_sold.into(),
        "reviewCount" => p.review_count.into(),
        "createdAt" => p.created_at.into(),
        "updatedAt" => p.updated_at.into(),
        _ => return None,
    })
}
