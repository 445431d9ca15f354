// src/stock_notifications.rs
//! Stock-change notification engine.
//!
//! Every product edit goes through [`StockNotifier::apply_quantity_update`], which
//! persists the form and decides, against the stored quantity and the dedup marker
//! read in the same transaction, whether a notification is due. The product write,
//! the marker advance and the notification insert commit together or not at all.

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use sqlx::SqlitePool;
use strum::Display;
use tokio::sync::broadcast;
use tokio::time::sleep;
use validator::Validate;
use crate::config::NotificationConfig;
use crate::error::{is_write_conflict, ApiError, ApiResult};
use crate::models::{NewNotification, Notification, Product, ProductRequest};
use crate::monitoring::Metrics;
use crate::repositories::{CrudRepository, NotificationRepository, ProductRepository};

const RETRY_BACKOFF_MS: u64 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeDirection {
    Increased,
    Decreased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityChange {
    pub direction: ChangeDirection,
    pub diff: i64,
    pub new_quantity: i64,
}

/// Notify only when the quantity actually moved and did not land on the value
/// that was last notified about.
pub fn detect_change(old_quantity: i64, last_notified: Option<i64>, new_quantity: i64) -> Option<QuantityChange> {
    if new_quantity == old_quantity || Some(new_quantity) == last_notified {
        return None;
    }

    let direction = if new_quantity > old_quantity {
        ChangeDirection::Increased
    } else {
        ChangeDirection::Decreased
    };

    Some(QuantityChange {
        direction,
        diff: (new_quantity - old_quantity).abs(),
        new_quantity,
    })
}

pub fn format_message(name: &str, change: &QuantityChange) -> String {
    format!(
        "Quantity of '{}' was {} by {}. New quantity: {}.",
        name, change.direction, change.diff, change.new_quantity
    )
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub product: Product,
    pub notification: Option<Notification>,
}

enum Attempt {
    Committed(UpdateOutcome),
    Conflict,
}

pub struct StockNotifier {
    pool: SqlitePool,
    products: ProductRepository,
    feed: broadcast::Sender<Notification>,
    max_attempts: u32,
    metrics: Arc<Metrics>,
}

impl StockNotifier {
    pub fn new(pool: SqlitePool, config: &NotificationConfig, metrics: Arc<Metrics>) -> Self {
        let (feed, _) = broadcast::channel(config.feed_capacity.max(1));
        Self {
            pool,
            products: ProductRepository::new(),
            feed,
            max_attempts: config.max_update_attempts.max(1),
            metrics,
        }
    }

    /// Receive every notification committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.feed.subscribe()
    }

    /// New products have no baseline, so creation never notifies.
    pub async fn create_product(&self, data: ProductRequest) -> ApiResult<Product> {
        data.validate()?;
        let product = self.products.create(&self.pool, data).await?;
        log::info!("Created product '{}' ({}) with quantity {}", product.name, product.id, product.quantity);
        Ok(product)
    }

    /// Notifications referencing the product are left in place.
    pub async fn delete_product(&self, id: &str) -> ApiResult<()> {
        self.products
            .delete(&self.pool, id)
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::product_not_found(id),
                other => other,
            })?;
        log::info!("Deleted product {}", id);
        Ok(())
    }

    #[tracing::instrument(skip(self, data), fields(product_id = %id))]
    pub async fn apply_quantity_update(&self, id: &str, data: ProductRequest) -> ApiResult<UpdateOutcome> {
        data.validate()?;

        for attempt in 1..=self.max_attempts {
            let result = match self.try_apply(id, &data).await {
                Err(ApiError::DatabaseError(ref e)) if is_write_conflict(e) => Ok(Attempt::Conflict),
                other => other,
            };

            match result? {
                Attempt::Committed(outcome) => {
                    match &outcome.notification {
                        Some(notification) => {
                            self.metrics.record_notification();
                            log::info!("Stock notification for {}: {}", id, notification.message);
                            // No subscribers is not an error
                            let _ = self.feed.send(notification.clone());
                        }
                        None => {
                            self.metrics.record_suppressed();
                            log::debug!("Update of {} did not warrant a notification", id);
                        }
                    }
                    return Ok(outcome);
                }
                Attempt::Conflict => {
                    self.metrics.record_conflict();
                    log::warn!("Concurrent modification of product {} (attempt {}/{})", id, attempt, self.max_attempts);
                    if attempt < self.max_attempts {
                        sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(ApiError::update_conflict(id, self.max_attempts))
    }

    /// One read-decide-write pass. Dropping `tx` on any early return rolls back.
    async fn try_apply(&self, id: &str, data: &ProductRequest) -> ApiResult<Attempt> {
        let mut tx = self.pool.begin().await?;

        // Write lock first, so the read below is already serialized with other writers
        if !ProductRepository::claim_for_update(&mut *tx, id).await? {
            return Err(ApiError::product_not_found(id));
        }

        let current = ProductRepository::fetch_in_tx(&mut *tx, id)
            .await?
            .ok_or_else(|| ApiError::product_not_found(id))?;

        let change = detect_change(current.quantity, current.last_notified_quantity, data.quantity);
        let marker = match change {
            Some(_) => Some(data.quantity),
            None => current.last_notified_quantity,
        };

        let now = Utc::now();
        if !ProductRepository::update_if_unchanged(&mut *tx, &current, data, marker, now).await? {
            return Ok(Attempt::Conflict);
        }

        let notification = match change {
            Some(change) => {
                let new_notification = NewNotification {
                    product_id: current.id.clone(),
                    message: format_message(&data.name, &change),
                };
                Some(NotificationRepository::insert(&mut *tx, &new_notification).await?)
            }
            None => None,
        };

        tx.commit().await?;

        let product = Product {
            name: data.name.clone(),
            quantity: data.quantity,
            threshold: data.threshold,
            expired_date: data.expired_date,
            section: data.section_or_default(),
            last_notified_quantity: marker,
            updated_at: now,
            ..current
        };

        Ok(Attempt::Committed(UpdateOutcome { product, notification }))
    }
}
