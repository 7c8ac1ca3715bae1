//! `flame-notifications`: the staff notification feed.
//!
//! Notifications are append-only records of order, payment and stock events.
//! The only field that ever changes after creation is `is_read`.

pub mod notification;

pub use notification::{
    NewNotification, Notification, NotificationFilter, NotificationKind, Priority, RelatedKind,
    RelatedRef,
};
