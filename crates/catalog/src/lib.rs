//! `flame-catalog`: products, their derived pricing/stock fields, and reviews.

pub mod product;
pub mod review;

pub use product::{
    needs_low_stock_alert, pricing, Category, NewProduct, Product, ProductFilter, ProductPatch,
    StockStatus, LOW_STOCK_THRESHOLD,
};
pub use review::{
    rating_aggregate, NewReview, RatingAggregate, Review, ReviewFilter, ReviewPatch, ReviewSummary,
};
