//! Notification factory
//!
//! Creates a notification of a named variant, grants its observers, and
//! announces it on the event bus.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use crate::error::Result;
use crate::events::{EventBus, NotificationAssigned};
use crate::references::{EntityRef, ObserverRef};
use crate::registry::TypeRegistry;
use crate::repositories::ObserverLinkRepository;
use crate::sti::{Notification, NotificationStore};

/// Input for [`NotificationFactory::create`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateNotification {
    /// Short or qualified variant tag, e.g. `liked`.
    pub variant: String,
    #[serde(default)]
    pub observers: Vec<ObserverRef>,
    #[serde(default)]
    pub sender: Option<EntityRef>,
    #[serde(default)]
    pub subject: Option<EntityRef>,
    #[serde(default)]
    pub data: Option<JsonValue>,
}

impl CreateNotification {
    pub fn new(variant: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            ..Self::default()
        }
    }

    pub fn observer(mut self, observer: ObserverRef) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn sender(mut self, sender: EntityRef) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn subject(mut self, subject: EntityRef) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Clone)]
pub struct NotificationFactory {
    db: Arc<DatabaseConnection>,
    store: NotificationStore,
    links: ObserverLinkRepository,
    events: Arc<EventBus>,
}

impl NotificationFactory {
    pub fn new(
        db: Arc<DatabaseConnection>,
        registry: Arc<TypeRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store: NotificationStore::new(db.clone(), registry),
            links: ObserverLinkRepository::new(db.clone()),
            db,
            events,
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Create and store a notification and its observer links in one
    /// transaction, then publish a single [`NotificationAssigned`].
    ///
    /// An unknown variant fails before anything is written.
    #[instrument(skip(self, request), fields(variant = %request.variant, observers = request.observers.len()))]
    pub async fn create(&self, request: CreateNotification) -> Result<Notification> {
        let variant = self.store.registry().resolve(&request.variant)?;

        let mut notification = Notification::new(variant);
        notification.data = request.data.filter(|value| !value.is_null());
        notification.sender = request.sender;
        notification.subject = request.subject;

        let txn = self.db.begin().await?;
        self.store.persist_with(&txn, &mut notification).await?;
        for observer in &request.observers {
            self.links
                .attach_with(&txn, notification.id, *observer)
                .await?;
        }
        txn.commit().await?;

        info!(notification_id = %notification.id, "Created notification");

        self.events.publish(NotificationAssigned::new(
            notification.clone(),
            request.observers,
        ));
        Ok(notification)
    }
}
