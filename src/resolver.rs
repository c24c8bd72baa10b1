//! Observer resolution
//!
//! Answers "which notifications may this principal see" and records reads.
//! In direct-only mode a notification is visible when the principal holds a
//! live user link to it. In extended mode (`entrust = true`) links to any of
//! the principal's roles, or to any permission those roles carry, also grant
//! visibility, except where the principal's own direct link already reports
//! the opposite read state.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ColumnTrait, Condition, PaginatorTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::NotificationSettings;
use crate::directory::AuthorityDirectory;
use crate::error::Result;
use crate::models::notification;
use crate::references::{ObserverKind, ObserverRef};
use crate::repositories::{ObserverLinkRepository, ObserverLinkView, ReadFilter};
use crate::sti::{Notification, NotificationStore, QueryPlan, Scope};

/// Which links grant visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    DirectOnly,
    Extended,
}

impl From<&NotificationSettings> for ResolutionMode {
    fn from(settings: &NotificationSettings) -> Self {
        if settings.entrust {
            ResolutionMode::Extended
        } else {
            ResolutionMode::DirectOnly
        }
    }
}

/// Builds visibility queries and records read state for principals.
#[derive(Clone)]
pub struct ObserverResolver {
    store: NotificationStore,
    links: ObserverLinkRepository,
    directory: Arc<dyn AuthorityDirectory>,
    mode: ResolutionMode,
}

impl ObserverResolver {
    pub fn new(
        store: NotificationStore,
        links: ObserverLinkRepository,
        directory: Arc<dyn AuthorityDirectory>,
        settings: &NotificationSettings,
    ) -> Self {
        Self {
            store,
            links,
            directory,
            mode: ResolutionMode::from(settings),
        }
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn links(&self) -> &ObserverLinkRepository {
        &self.links
    }

    /// Query plan over the notifications `principal` may see in `scope`.
    ///
    /// Only directory lookups happen here; the plan itself is not executed.
    #[instrument(skip(self, scope), fields(mode = ?self.mode))]
    pub async fn visible_to(
        &self,
        scope: &Scope,
        principal: Uuid,
        filter: ReadFilter,
    ) -> Result<QueryPlan> {
        let query = self.store.scoped_query(scope);
        let direct = ObserverLinkRepository::linked_notification_ids(
            ObserverKind::User,
            vec![principal],
            filter,
        );

        match self.mode {
            ResolutionMode::DirectOnly => {
                Ok(query.filter(notification::Column::Id.in_subquery(direct)))
            }
            ResolutionMode::Extended => {
                let role_ids = self.directory.role_ids(principal).await?;
                let permission_ids = if role_ids.is_empty() {
                    Vec::new()
                } else {
                    self.directory.permission_ids(&role_ids).await?
                };
                debug!(
                    roles = role_ids.len(),
                    permissions = permission_ids.len(),
                    "Resolved principal authorities"
                );

                let mut channels =
                    Condition::any().add(notification::Column::Id.in_subquery(direct));
                for (kind, ids) in [
                    (ObserverKind::Role, role_ids),
                    (ObserverKind::Permission, permission_ids),
                ] {
                    if ids.is_empty() {
                        continue;
                    }
                    channels = channels.add(notification::Column::Id.in_subquery(
                        ObserverLinkRepository::linked_notification_ids(kind, ids, filter),
                    ));
                }

                let mut query = query.filter(channels);
                if let Some(opposite) = filter.opposite() {
                    query = query.filter(notification::Column::Id.not_in_subquery(
                        ObserverLinkRepository::linked_notification_ids(
                            ObserverKind::User,
                            vec![principal],
                            opposite,
                        ),
                    ));
                }
                Ok(query)
            }
        }
    }

    /// Execute [`Self::visible_to`], newest first, materialized through `scope`.
    pub async fn fetch(
        &self,
        scope: &Scope,
        principal: Uuid,
        filter: ReadFilter,
    ) -> Result<Vec<Notification>> {
        let rows = self
            .visible_to(scope, principal, filter)
            .await?
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .all(self.store.db.as_ref())
            .await?;
        self.store.materialize_all(scope, rows)
    }

    /// Number of notifications [`Self::visible_to`] would return.
    pub async fn count(&self, scope: &Scope, principal: Uuid, filter: ReadFilter) -> Result<u64> {
        let plan = self.visible_to(scope, principal, filter).await?;
        Ok(plan.count(self.store.db.as_ref()).await?)
    }

    /// Record that `principal` read the notification, as of now.
    ///
    /// Only the principal's own direct link is touched; role and permission
    /// links are shared and keep their state.
    pub async fn mark_read(&self, principal: Uuid, notification_id: Uuid) -> Result<ObserverLinkView> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        self.links
            .sync_read(notification_id, ObserverRef::User(principal), now)
            .await
    }

    /// Grant each observer visibility into the notification.
    pub async fn attach(&self, notification_id: Uuid, observers: &[ObserverRef]) -> Result<()> {
        for observer in observers {
            self.links.attach(notification_id, *observer).await?;
        }
        Ok(())
    }
}
