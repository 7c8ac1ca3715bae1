//! `flame-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the domain error model, list paging and the rounding
//! helpers every report uses.

pub mod error;
pub mod id;
pub mod numeric;
pub mod paging;

pub use error::{DomainError, DomainResult};
pub use id::{NotificationId, OrderId, PaymentId, ProductId, ReviewId, UserId};
pub use numeric::{percent_of, percentage_change, round_to};
pub use paging::{contains_ci, Page, PageRequest, Pagination, SortOrder, DEFAULT_LIMIT, MAX_LIMIT};
