//! Single-table inheritance over the `notifications` table.
//!
//! All variants share one table. Loading through the supertype reads the
//! discriminator of every row and dispatches to the registered variant;
//! loading through a variant scope filters on that variant's discriminator.
//! Saving a variant instance stamps its discriminator right before the write.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{NotificationError, Result};
use crate::models::notification::{self, Entity as NotificationEntity};
use crate::references::EntityRef;
use crate::registry::{TypeRegistry, Variant, VariantDescriptor};

/// Query plan over notification rows.
pub type QueryPlan = Select<NotificationEntity>;

/// The static type a load, query or save goes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Polymorphic base: unfiltered, each row disambiguated on load.
    Super,
    /// One variant: filtered to its discriminator.
    Sub(Arc<VariantDescriptor>),
}

/// A materialized notification.
///
/// Built either as a variant instance ([`Notification::new`]) whose
/// discriminator is stamped on save, or as a supertype instance
/// ([`Notification::untyped`]) carrying a caller-supplied discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    /// Stored `type` value; `None` until stamped or supplied
    #[serde(rename = "type")]
    pub discriminator: Option<String>,
    #[serde(serialize_with = "serialize_variant")]
    pub variant: Option<Arc<VariantDescriptor>>,
    pub sender: Option<EntityRef>,
    pub subject: Option<EntityRef>,
    pub data: Option<JsonValue>,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub updated_at: Option<DateTimeWithTimeZone>,
    #[serde(skip)]
    exists: bool,
}

fn serialize_variant<S: Serializer>(
    variant: &Option<Arc<VariantDescriptor>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match variant {
        Some(descriptor) => serializer.serialize_some(descriptor.name()),
        None => serializer.serialize_none(),
    }
}

impl Notification {
    /// New, unsaved instance of a registered variant.
    pub fn new(variant: Arc<VariantDescriptor>) -> Self {
        Self {
            variant: Some(variant),
            ..Self::new_blank()
        }
    }

    /// New, unsaved supertype instance with an explicit discriminator.
    pub fn untyped(discriminator: Option<String>) -> Self {
        Self {
            variant: None,
            discriminator,
            ..Self::new_blank()
        }
    }

    fn new_blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            discriminator: None,
            variant: None,
            sender: None,
            subject: None,
            data: None,
            created_at: None,
            updated_at: None,
            exists: false,
        }
    }

    /// Whether the instance has been written to the store.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Store any serializable value as the payload.
    pub fn set_data<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.data = Some(serde_json::to_value(value)?);
        Ok(())
    }

    /// Decode the payload into a concrete type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.data
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(NotificationError::from)
    }

    pub fn is_variant<V: Variant>(&self, registry: &TypeRegistry) -> bool {
        match (&self.variant, registry.resolve_variant::<V>()) {
            (Some(own), Ok(wanted)) => own == &wanted,
            _ => false,
        }
    }
}

/// Reads and writes notification rows with single-table-inheritance rules.
#[derive(Debug, Clone)]
pub struct NotificationStore {
    pub db: Arc<DatabaseConnection>,
    registry: Arc<TypeRegistry>,
}

impl NotificationStore {
    pub fn new(db: Arc<DatabaseConnection>, registry: Arc<TypeRegistry>) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Scope for a compile-time variant.
    pub fn scope_of<V: Variant>(&self) -> Result<Scope> {
        Ok(Scope::Sub(self.registry.resolve_variant::<V>()?))
    }

    /// Turn a raw row into a notification of the right variant.
    pub fn materialize(&self, scope: &Scope, row: notification::Model) -> Result<Notification> {
        let variant = match scope {
            Scope::Sub(descriptor) => descriptor.clone(),
            Scope::Super => {
                if row.r#type.trim().is_empty() {
                    return Err(NotificationError::schema_violation(format!(
                        "type not present in notification row {}",
                        row.id
                    )));
                }
                self.registry
                    .by_discriminator(&row.r#type)
                    .ok_or_else(|| {
                        NotificationError::schema_violation(format!(
                            "notification row {} carries unregistered type '{}'",
                            row.id, row.r#type
                        ))
                    })?
            }
        };

        let data = row
            .data
            .as_deref()
            .map(serde_json::from_str::<JsonValue>)
            .transpose()?;

        Ok(Notification {
            id: row.id,
            discriminator: Some(row.r#type),
            variant: Some(variant),
            sender: EntityRef::from_columns(row.sender_type, row.sender_id),
            subject: EntityRef::from_columns(row.object_type, row.object_id),
            data,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
            exists: true,
        })
    }

    /// Base query for the scope; variant scopes only see their own rows.
    pub fn scoped_query(&self, scope: &Scope) -> QueryPlan {
        let query = NotificationEntity::find();
        match scope {
            Scope::Super => query,
            Scope::Sub(descriptor) => query.filter(
                notification::Column::Type
                    .eq(descriptor.discriminator(self.registry.type_format())),
            ),
        }
    }

    /// Save through the pooled connection.
    pub async fn persist(&self, notification: &mut Notification) -> Result<()> {
        self.persist_with(self.db.as_ref(), notification).await
    }

    /// Save through any connection, including an open transaction.
    #[instrument(skip(self, conn, notification), fields(notification_id = %notification.id))]
    pub async fn persist_with<C>(&self, conn: &C, notification: &mut Notification) -> Result<()>
    where
        C: ConnectionTrait,
    {
        if let Some(variant) = &notification.variant {
            notification.discriminator =
                Some(variant.discriminator(self.registry.type_format()));
        }

        let discriminator = notification
            .discriminator
            .clone()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                NotificationError::schema_violation(format!(
                    "type not present on notification {} saved through the supertype",
                    notification.id
                ))
            })?;

        let data = notification
            .data
            .as_ref()
            .filter(|value| !value.is_null())
            .map(serde_json::to_string)
            .transpose()?;
        let now: DateTimeWithTimeZone = Utc::now().into();

        let mut active = notification::ActiveModel {
            id: Set(notification.id),
            r#type: Set(discriminator.clone()),
            sender_id: Set(notification.sender.as_ref().map(|r| r.id)),
            sender_type: Set(notification.sender.as_ref().map(|r| r.kind.clone())),
            object_id: Set(notification.subject.as_ref().map(|r| r.id)),
            object_type: Set(notification.subject.as_ref().map(|r| r.kind.clone())),
            data: Set(data),
            updated_at: Set(now),
            ..Default::default()
        };

        if notification.exists {
            active.update(conn).await?;
        } else {
            active.created_at = Set(now);
            active.insert(conn).await?;
            notification.created_at = Some(now);
            notification.exists = true;
        }
        notification.updated_at = Some(now);

        debug!(discriminator = %discriminator, "Persisted notification");
        Ok(())
    }

    /// Find one notification by id within the scope.
    pub async fn find_by_id(&self, scope: &Scope, id: Uuid) -> Result<Option<Notification>> {
        let row = self
            .scoped_query(scope)
            .filter(notification::Column::Id.eq(id))
            .one(self.db.as_ref())
            .await?;
        row.map(|row| self.materialize(scope, row)).transpose()
    }

    /// All notifications in the scope, newest first.
    pub async fn all(&self, scope: &Scope) -> Result<Vec<Notification>> {
        let rows = self
            .scoped_query(scope)
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .all(self.db.as_ref())
            .await?;
        self.materialize_all(scope, rows)
    }

    pub(crate) fn materialize_all(
        &self,
        scope: &Scope,
        rows: Vec<notification::Model>,
    ) -> Result<Vec<Notification>> {
        rows.into_iter()
            .map(|row| self.materialize(scope, row))
            .collect()
    }
}
