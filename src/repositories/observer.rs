//! Observer link repository
//!
//! Tracks which users, roles and permissions may read a notification and
//! whether each of them has read it. Links are soft-deleted: a link with a
//! deletion marker stays in the table for audit but is excluded from every
//! visibility and read-state query.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict, SelectStatement, SimpleExpr};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::notification_observer::{self, Entity as NotificationObserver};
use crate::references::{ObserverKind, ObserverRef};

/// Read-state filter applied to observer links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFilter {
    #[default]
    Unread,
    Read,
    Any,
}

impl ReadFilter {
    /// Predicate on `read_at`, or `None` for [`ReadFilter::Any`].
    pub fn condition(&self) -> Option<SimpleExpr> {
        match self {
            ReadFilter::Unread => Some(unread()),
            ReadFilter::Read => Some(read()),
            ReadFilter::Any => None,
        }
    }

    /// The complementary read state.
    pub fn opposite(&self) -> Option<ReadFilter> {
        match self {
            ReadFilter::Unread => Some(ReadFilter::Read),
            ReadFilter::Read => Some(ReadFilter::Unread),
            ReadFilter::Any => None,
        }
    }
}

impl std::str::FromStr for ReadFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unread" => Ok(ReadFilter::Unread),
            "read" => Ok(ReadFilter::Read),
            "any" | "all" => Ok(ReadFilter::Any),
            other => Err(format!(
                "invalid read filter '{other}'; expected unread, read or any"
            )),
        }
    }
}

/// `read_at IS NOT NULL`
pub fn read() -> SimpleExpr {
    notification_observer::Column::ReadAt.is_not_null()
}

/// `read_at IS NULL`
pub fn unread() -> SimpleExpr {
    notification_observer::Column::ReadAt.is_null()
}

/// `deleted_at IS NULL`
pub fn not_deleted() -> SimpleExpr {
    notification_observer::Column::DeletedAt.is_null()
}

/// Externally visible shape of a link. The deletion marker is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObserverLinkView {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub observer_id: Uuid,
    pub observer_type: ObserverKind,
    pub read_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl ObserverLinkView {
    /// Project a stored row; rows with an unsupported observer type yield `None`.
    pub fn from_model(model: notification_observer::Model) -> Option<Self> {
        match model.observer_type.parse::<ObserverKind>() {
            Ok(kind) => Some(Self {
                id: model.id,
                notification_id: model.notification_id,
                observer_id: model.observer_id,
                observer_type: kind,
                read_at: model.read_at,
                created_at: model.created_at,
                updated_at: model.updated_at,
            }),
            Err(err) => {
                warn!(link_id = %model.id, error = %err, "Skipping observer link");
                None
            }
        }
    }

    pub fn observer(&self) -> ObserverRef {
        ObserverRef::new(self.observer_type, self.observer_id)
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Repository for observer link operations
#[derive(Debug, Clone)]
pub struct ObserverLinkRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl ObserverLinkRepository {
    /// Creates a new ObserverLinkRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Grant `observer` visibility into a notification.
    pub async fn attach(&self, notification_id: Uuid, observer: ObserverRef) -> Result<()> {
        self.attach_with(self.db.as_ref(), notification_id, observer)
            .await
    }

    /// Grant through any connection. Re-attaching an existing grant keeps its
    /// read state and clears a soft delete instead of adding a second row.
    #[instrument(skip(self, conn), fields(observer = %observer))]
    pub async fn attach_with<C>(
        &self,
        conn: &C,
        notification_id: Uuid,
        observer: ObserverRef,
    ) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let link = new_link(notification_id, observer, None, now);

        NotificationObserver::insert(link)
            .on_conflict(
                OnConflict::columns(link_key())
                    .update_columns([
                        notification_observer::Column::DeletedAt,
                        notification_observer::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        debug!(%notification_id, "Attached observer");
        Ok(())
    }

    /// Set `read_at` on the observer's link, creating the link when missing.
    pub async fn sync_read(
        &self,
        notification_id: Uuid,
        observer: ObserverRef,
        at: DateTimeWithTimeZone,
    ) -> Result<ObserverLinkView> {
        self.sync_read_with(self.db.as_ref(), notification_id, observer, at)
            .await
    }

    /// Upsert keyed on (notification, observer kind, observer id); calling it
    /// again only moves `read_at` forward to the new instant. A soft-deleted
    /// link is revived, so the read always lands on a live link.
    #[instrument(skip(self, conn), fields(observer = %observer))]
    pub async fn sync_read_with<C>(
        &self,
        conn: &C,
        notification_id: Uuid,
        observer: ObserverRef,
        at: DateTimeWithTimeZone,
    ) -> Result<ObserverLinkView>
    where
        C: ConnectionTrait,
    {
        let link = new_link(notification_id, observer, Some(at), at);

        NotificationObserver::insert(link)
            .on_conflict(
                OnConflict::columns(link_key())
                    .update_columns([
                        notification_observer::Column::ReadAt,
                        notification_observer::Column::DeletedAt,
                        notification_observer::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        let stored = NotificationObserver::find()
            .filter(link_filter(notification_id, observer))
            .filter(not_deleted())
            .one(conn)
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!(
                    "observer link {observer} on notification {notification_id}"
                ))
            })?;

        debug!(%notification_id, "Synchronized read state");
        Ok(ObserverLinkView {
            id: stored.id,
            notification_id: stored.notification_id,
            observer_id: stored.observer_id,
            observer_type: observer.kind(),
            read_at: stored.read_at,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// The visible link between a notification and an observer.
    pub async fn find(
        &self,
        notification_id: Uuid,
        observer: ObserverRef,
    ) -> Result<Option<ObserverLinkView>> {
        let model = NotificationObserver::find()
            .filter(link_filter(notification_id, observer))
            .filter(not_deleted())
            .one(self.db.as_ref())
            .await?;
        Ok(model.and_then(ObserverLinkView::from_model))
    }

    /// Visible links of a notification, optionally restricted to one observer kind.
    pub async fn observers_of(
        &self,
        notification_id: Uuid,
        kind: Option<ObserverKind>,
    ) -> Result<Vec<ObserverLinkView>> {
        let mut query = NotificationObserver::find()
            .filter(notification_observer::Column::NotificationId.eq(notification_id))
            .filter(not_deleted());

        if let Some(kind) = kind {
            query = query.filter(notification_observer::Column::ObserverType.eq(kind.as_str()));
        }

        let models = query
            .order_by_asc(notification_observer::Column::CreatedAt)
            .order_by_asc(notification_observer::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(models
            .into_iter()
            .filter_map(ObserverLinkView::from_model)
            .collect())
    }

    /// Every link of a notification, soft-deleted ones included, for audit.
    pub async fn with_deleted(
        &self,
        notification_id: Uuid,
        kind: Option<ObserverKind>,
    ) -> Result<Vec<ObserverLinkView>> {
        let mut query = NotificationObserver::find()
            .filter(notification_observer::Column::NotificationId.eq(notification_id));

        if let Some(kind) = kind {
            query = query.filter(notification_observer::Column::ObserverType.eq(kind.as_str()));
        }

        let models = query
            .order_by_asc(notification_observer::Column::CreatedAt)
            .order_by_asc(notification_observer::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(models
            .into_iter()
            .filter_map(ObserverLinkView::from_model)
            .collect())
    }

    /// Hide a link without removing its row. Returns whether a visible link was hidden.
    #[instrument(skip(self), fields(observer = %observer))]
    pub async fn soft_delete(&self, notification_id: Uuid, observer: ObserverRef) -> Result<bool> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = NotificationObserver::update_many()
            .col_expr(notification_observer::Column::DeletedAt, Expr::value(now))
            .col_expr(notification_observer::Column::UpdatedAt, Expr::value(now))
            .filter(link_filter(notification_id, observer))
            .filter(not_deleted())
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Undo a soft delete. Returns whether a hidden link was restored.
    #[instrument(skip(self), fields(observer = %observer))]
    pub async fn restore(&self, notification_id: Uuid, observer: ObserverRef) -> Result<bool> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = NotificationObserver::update_many()
            .col_expr(
                notification_observer::Column::DeletedAt,
                Expr::value(Option::<DateTimeWithTimeZone>::None),
            )
            .col_expr(notification_observer::Column::UpdatedAt, Expr::value(now))
            .filter(link_filter(notification_id, observer))
            .filter(notification_observer::Column::DeletedAt.is_not_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Sub-select of notification ids with a visible link to any of `observer_ids`
    /// of the given kind, narrowed by `filter`.
    pub fn linked_notification_ids(
        kind: ObserverKind,
        observer_ids: Vec<Uuid>,
        filter: ReadFilter,
    ) -> SelectStatement {
        let mut query = NotificationObserver::find()
            .select_only()
            .column(notification_observer::Column::NotificationId)
            .filter(notification_observer::Column::ObserverType.eq(kind.as_str()))
            .filter(notification_observer::Column::ObserverId.is_in(observer_ids))
            .filter(not_deleted());

        if let Some(condition) = filter.condition() {
            query = query.filter(condition);
        }

        query.into_query()
    }
}

fn link_key() -> [notification_observer::Column; 3] {
    [
        notification_observer::Column::NotificationId,
        notification_observer::Column::ObserverType,
        notification_observer::Column::ObserverId,
    ]
}

fn link_filter(notification_id: Uuid, observer: ObserverRef) -> sea_orm::Condition {
    sea_orm::Condition::all()
        .add(notification_observer::Column::NotificationId.eq(notification_id))
        .add(notification_observer::Column::ObserverType.eq(observer.kind().as_str()))
        .add(notification_observer::Column::ObserverId.eq(observer.id()))
}

fn new_link(
    notification_id: Uuid,
    observer: ObserverRef,
    read_at: Option<DateTimeWithTimeZone>,
    now: DateTimeWithTimeZone,
) -> notification_observer::ActiveModel {
    notification_observer::ActiveModel {
        id: Set(Uuid::new_v4()),
        notification_id: Set(notification_id),
        observer_id: Set(observer.id()),
        observer_type: Set(observer.kind().as_str().to_string()),
        read_at: Set(read_at),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
}
