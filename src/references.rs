//! Polymorphic references: who sent a notification, what it is about, and who
//! may observe it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to an arbitrary external entity as a `(kind, id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: Uuid) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Rebuilds a reference from its two nullable columns; both must be present.
    pub(crate) fn from_columns(kind: Option<String>, id: Option<Uuid>) -> Option<Self> {
        match (kind, id) {
            (Some(kind), Some(id)) if !kind.is_empty() => Some(Self { kind, id }),
            _ => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for EntityRef {
    type Err = String;

    /// Parses `kind:uuid`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, id) = value
            .split_once(':')
            .ok_or_else(|| format!("expected '<kind>:<uuid>', got '{value}'"))?;
        if kind.trim().is_empty() {
            return Err(format!("missing entity kind in '{value}'"));
        }
        let id = Uuid::parse_str(id.trim()).map_err(|e| format!("invalid id in '{value}': {e}"))?;
        Ok(Self::new(kind.trim(), id))
    }
}

/// The closed set of observer kinds a notification can be granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverKind {
    User,
    Role,
    Permission,
}

impl ObserverKind {
    /// Value stored in `notification_observer.observer_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObserverKind::User => "user",
            ObserverKind::Role => "role",
            ObserverKind::Permission => "permission",
        }
    }
}

impl fmt::Display for ObserverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored observer type is outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported observer kind '{0}'")]
pub struct UnsupportedObserverKind(pub String);

impl FromStr for ObserverKind {
    type Err = UnsupportedObserverKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(ObserverKind::User),
            "role" => Ok(ObserverKind::Role),
            "permission" => Ok(ObserverKind::Permission),
            other => Err(UnsupportedObserverKind(other.to_string())),
        }
    }
}

/// An observer a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    tag = "observer_type",
    content = "observer_id",
    rename_all = "snake_case"
)]
pub enum ObserverRef {
    User(Uuid),
    Role(Uuid),
    Permission(Uuid),
}

impl ObserverRef {
    pub fn new(kind: ObserverKind, id: Uuid) -> Self {
        match kind {
            ObserverKind::User => ObserverRef::User(id),
            ObserverKind::Role => ObserverRef::Role(id),
            ObserverKind::Permission => ObserverRef::Permission(id),
        }
    }

    pub fn kind(&self) -> ObserverKind {
        match self {
            ObserverRef::User(_) => ObserverKind::User,
            ObserverRef::Role(_) => ObserverKind::Role,
            ObserverRef::Permission(_) => ObserverKind::Permission,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ObserverRef::User(id) | ObserverRef::Role(id) | ObserverRef::Permission(id) => *id,
        }
    }
}

impl fmt::Display for ObserverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind(), self.id())
    }
}

impl FromStr for ObserverRef {
    type Err = String;

    /// Parses `user:<uuid>`, `role:<uuid>` or `permission:<uuid>`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, id) = value
            .split_once(':')
            .ok_or_else(|| format!("expected '<kind>:<uuid>', got '{value}'"))?;
        let kind = kind.trim().parse::<ObserverKind>().map_err(|e| e.to_string())?;
        let id = Uuid::parse_str(id.trim()).map_err(|e| format!("invalid id in '{value}': {e}"))?;
        Ok(Self::new(kind, id))
    }
}
