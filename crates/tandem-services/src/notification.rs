//! Notification service
//!
//! Notifications are persisted first, then pushed to the addressee's `user:{id}` room.
//! An offline addressee simply receives nothing live; the stored row is the source of truth.

use std::sync::Arc;
use tandem_core::models::{NewNotification, Notification};
use tandem_core::AppError;
use tandem_db::NotificationStore;

use crate::events::ServerEvent;
use crate::rooms::ConnectionManager;

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    connections: ConnectionManager,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, connections: ConnectionManager) -> Self {
        Self { store, connections }
    }

    #[tracing::instrument(skip(self, new), fields(user_id = %new.user_id, notification_type = ?new.notification_type))]
    pub async fn notify(&self, new: NewNotification) -> Result<Notification, AppError> {
        let notification = self.store.create_notification(new).await?;

        let delivered = self
            .connections
            .emit_to_user(
                notification.user_id,
                ServerEvent::NewNotification(notification.clone()),
            )
            .await;
        tracing::debug!(
            notification_id = %notification.id,
            delivered,
            "Notification created"
        );

        Ok(notification)
    }

    /// One notification per addressee. A failure for one addressee is logged and does not
    /// stop the others.
    pub async fn notify_all(&self, batch: Vec<NewNotification>) -> Vec<Notification> {
        let mut created = Vec::with_capacity(batch.len());
        for new in batch {
            let user_id = new.user_id;
            match self.notify(new).await {
                Ok(notification) => created.push(notification),
                Err(e) => {
                    tracing::error!(user_id = %user_id, error = %e, "Failed to create notification")
                }
            }
        }
        created
    }
}
