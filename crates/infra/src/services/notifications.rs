use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use flame_catalog::{needs_low_stock_alert, Product};
use flame_core::{DomainError, NotificationId, Page, PageRequest, SortOrder};
use flame_notifications::{NewNotification, Notification, NotificationFilter, RelatedRef};

use super::{sort_records, ProductView, ServiceResult, SortKey};
use crate::store::Repositories;

/// Default page size of the feed.
pub const FEED_PAGE_SIZE: u32 = 20;

/// Raise a low-stock alert for `product` unless one is already unread.
pub(crate) async fn raise_low_stock_alert(
    repos: &Repositories,
    product: &Product,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    if !needs_low_stock_alert(product.stock) {
        return Ok(());
    }
    if repos.notifications.has_open_low_stock_alert(product.id).await? {
        debug!(product_id = %product.id, "low-stock alert already open");
        return Ok(());
    }
    let alert = Notification::low_stock(product, now);
    repos.notifications.insert(&alert).await?;
    info!(product_id = %product.id, stock = product.stock, "low-stock alert raised");
    Ok(())
}

/// The record a notification points at, loaded through its typed repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "document")]
pub enum RelatedDocument {
    Product(ProductView),
    Order(flame_sales::Order),
    Payment(flame_sales::Payment),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    /// `None` when nothing is referenced or the record has been deleted.
    pub related_document: Option<RelatedDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationFeed {
    pub page: Page<NotificationView>,
    pub unread_count: u64,
}

fn notification_sort_key(n: &Notification, field: &str) -> Option<SortKey> {
    Some(match field {
        "createdAt" => n.created_at.into(),
        "updatedAt" => n.updated_at.into(),
        "title" => n.title.as_str().into(),
        "type" => n.kind.as_str().into(),
        "isRead" => n.is_read.into(),
        _ => return None,
    })
}

#[derive(Clone)]
pub struct NotificationService {
    repos: Repositories,
}

impl NotificationService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn list(&self, filter: &NotificationFilter, page: &PageRequest) -> ServiceResult<NotificationFeed> {
        let mut all: Vec<Notification> = self
            .repos
            .notifications
            .list()
            .await?
            .into_iter()
            .filter(|n| filter.matches(n))
            .collect();
        sort_records(&mut all, page, ("createdAt", SortOrder::Desc), notification_sort_key);
        let page = Page::from_sorted(all, page);

        let mut items = Vec::with_capacity(page.items.len());
        for notification in page.items {
            items.push(self.view(notification).await?);
        }
        Ok(NotificationFeed {
            page: Page {
                items,
                pagination: page.pagination,
            },
            unread_count: self.repos.notifications.unread_count().await?,
        })
    }

    pub async fn unread_count(&self) -> ServiceResult<u64> {
        Ok(self.repos.notifications.unread_count().await?)
    }

    pub async fn get(&self, id: NotificationId) -> ServiceResult<NotificationView> {
        let n = self.load(id).await?;
        self.view(n).await
    }

    pub async fn create(&self, input: NewNotification) -> ServiceResult<Notification> {
        let n = Notification::create(input, Utc::now())?;
        self.repos.notifications.insert(&n).await?;
        info!(notification_id = %n.id, kind = n.kind.as_str(), "notification created");
        Ok(n)
    }

    pub async fn mark_read(&self, id: NotificationId) -> ServiceResult<Notification> {
        let mut n = self.load(id).await?;
        n.mark_read(Utc::now());
        self.repos.notifications.update(&n).await?;
        Ok(n)
    }

    pub async fn mark_all_read(&self) -> ServiceResult<u64> {
        let changed = self.repos.notifications.mark_all_read(Utc::now()).await?;
        info!(changed, "all notifications marked read");
        Ok(changed)
    }

    pub async fn delete(&self, id: NotificationId) -> ServiceResult<Notification> {
        Ok(self
            .repos
            .notifications
            .delete(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Notification"))?)
    }

    async fn load(&self, id: NotificationId) -> ServiceResult<Notification> {
        Ok(self
            .repos
            .notifications
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Notification"))?)
    }

    async fn view(&self, notification: Notification) -> ServiceResult<NotificationView> {
        let related_document = match notification.related {
            Some(r) => self.resolve(r).await?,
            None => None,
        };
        Ok(NotificationView {
            notification,
            related_document,
        })
    }

    async fn resolve(&self, related: RelatedRef) -> ServiceResult<Option<RelatedDocument>> {
        Ok(match related {
            RelatedRef::Product(id) => self
                .repos
                .products
                .get(id)
                .await?
                .map(|p| RelatedDocument::Product(p.into())),
            RelatedRef::Order(id) => self.repos.orders.get(id).await?.map(RelatedDocument::Order),
            RelatedRef::Payment(id) => self.repos.payments.get(id).await?.map(RelatedDocument::Payment),
        })
    }
}
