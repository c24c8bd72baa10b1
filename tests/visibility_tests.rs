//! Visibility resolution and read tracking across direct, role and
//! permission grants.

mod test_utils;

use anyhow::Result;
use chrono::Utc;
use notifications::{
    config::TypeFormat, directory::InMemoryDirectory, CreateNotification, Notification,
    ObserverKind, ObserverRef, ReadFilter, Scope,
};
use serde_json::json;
use std::collections::HashSet;
use test_utils::Harness;
use uuid::Uuid;

fn ids(notifications: &[Notification]) -> HashSet<Uuid> {
    notifications.iter().map(|n| n.id).collect()
}

#[tokio::test]
async fn test_liked_scenario_with_role_members() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let (user1, user2) = (Uuid::new_v4(), Uuid::new_v4());
    let role2 = Uuid::new_v4();

    let created = h
        .factory
        .create(
            CreateNotification::new("liked")
                .observer(ObserverRef::User(user1))
                .observer(ObserverRef::Role(role2))
                .data(json!({"post_id": 5})),
        )
        .await?;

    let directory = InMemoryDirectory::new().with_role(user2, role2);
    let resolver = h.resolver(directory);

    let any = resolver.fetch(&Scope::Super, user1, ReadFilter::Any).await?;
    assert_eq!(ids(&any), HashSet::from([created.id]));
    assert_eq!(any[0].data, Some(json!({"post_id": 5})));

    resolver.mark_read(user1, created.id).await?;

    let unread_for_user1 = resolver
        .fetch(&Scope::Super, user1, ReadFilter::Unread)
        .await?;
    assert!(unread_for_user1.is_empty());

    let unread_for_user2 = resolver
        .fetch(&Scope::Super, user2, ReadFilter::Unread)
        .await?;
    assert_eq!(ids(&unread_for_user2), HashSet::from([created.id]));
    Ok(())
}

#[tokio::test]
async fn test_direct_read_excludes_role_unread_grant() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let principal = Uuid::new_v4();
    let role = Uuid::new_v4();

    let n = h
        .factory
        .create(
            CreateNotification::new("commented")
                .observer(ObserverRef::User(principal))
                .observer(ObserverRef::Role(role)),
        )
        .await?;

    let resolver = h.resolver(InMemoryDirectory::new().with_role(principal, role));
    resolver.mark_read(principal, n.id).await?;

    assert_eq!(
        resolver
            .count(&Scope::Super, principal, ReadFilter::Unread)
            .await?,
        0
    );
    let read = resolver
        .fetch(&Scope::Super, principal, ReadFilter::Read)
        .await?;
    assert_eq!(ids(&read), HashSet::from([n.id]));
    Ok(())
}

#[tokio::test]
async fn test_permission_channel_grants_visibility() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let principal = Uuid::new_v4();
    let (role, permission) = (Uuid::new_v4(), Uuid::new_v4());

    let n = h
        .factory
        .create(CreateNotification::new("liked").observer(ObserverRef::Permission(permission)))
        .await?;

    let without = h.resolver(InMemoryDirectory::new().with_role(principal, role));
    assert_eq!(
        without.count(&Scope::Super, principal, ReadFilter::Any).await?,
        0
    );

    let with = h.resolver(
        InMemoryDirectory::new()
            .with_role(principal, role)
            .with_permission(role, permission),
    );
    let visible = with.fetch(&Scope::Super, principal, ReadFilter::Unread).await?;
    assert_eq!(ids(&visible), HashSet::from([n.id]));
    Ok(())
}

#[tokio::test]
async fn test_direct_only_mode_ignores_role_grants() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, false).await?;
    let principal = Uuid::new_v4();
    let role = Uuid::new_v4();

    h.factory
        .create(CreateNotification::new("liked").observer(ObserverRef::Role(role)))
        .await?;
    let direct = h
        .factory
        .create(CreateNotification::new("liked").observer(ObserverRef::User(principal)))
        .await?;

    let resolver = h.resolver(InMemoryDirectory::new().with_role(principal, role));
    let visible = resolver
        .fetch(&Scope::Super, principal, ReadFilter::Any)
        .await?;
    assert_eq!(ids(&visible), HashSet::from([direct.id]));
    Ok(())
}

#[tokio::test]
async fn test_read_filter_partitions_direct_grants() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, false).await?;
    let principal = Uuid::new_v4();

    let first = h
        .factory
        .create(CreateNotification::new("liked").observer(ObserverRef::User(principal)))
        .await?;
    let second = h
        .factory
        .create(CreateNotification::new("commented").observer(ObserverRef::User(principal)))
        .await?;

    let resolver = h.resolver(InMemoryDirectory::new());
    resolver.mark_read(principal, first.id).await?;

    let unread = resolver
        .fetch(&Scope::Super, principal, ReadFilter::Unread)
        .await?;
    let read = resolver
        .fetch(&Scope::Super, principal, ReadFilter::Read)
        .await?;
    assert_eq!(ids(&unread), HashSet::from([second.id]));
    assert_eq!(ids(&read), HashSet::from([first.id]));
    assert_eq!(
        resolver.count(&Scope::Super, principal, ReadFilter::Any).await?,
        2
    );
    Ok(())
}

#[tokio::test]
async fn test_variant_scope_narrows_visibility() -> Result<()> {
    let h = Harness::new(TypeFormat::Integer, false).await?;
    let principal = Uuid::new_v4();

    let liked = h
        .factory
        .create(CreateNotification::new("liked").observer(ObserverRef::User(principal)))
        .await?;
    h.factory
        .create(CreateNotification::new("commented").observer(ObserverRef::User(principal)))
        .await?;

    let resolver = h.resolver(InMemoryDirectory::new());
    let scope = Scope::Sub(h.registry.resolve("liked")?);
    let visible = resolver.fetch(&scope, principal, ReadFilter::Any).await?;
    assert_eq!(ids(&visible), HashSet::from([liked.id]));
    Ok(())
}

#[tokio::test]
async fn test_soft_deleted_link_grants_nothing() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let principal = Uuid::new_v4();
    let observer = ObserverRef::User(principal);

    let n = h
        .factory
        .create(CreateNotification::new("liked").observer(observer))
        .await?;
    let resolver = h.resolver(InMemoryDirectory::new());

    assert!(h.links.soft_delete(n.id, observer).await?);
    assert!(!h.links.soft_delete(n.id, observer).await?);
    assert_eq!(
        resolver.count(&Scope::Super, principal, ReadFilter::Any).await?,
        0
    );
    assert!(h.links.find(n.id, observer).await?.is_none());
    assert!(h.links.observers_of(n.id, None).await?.is_empty());
    assert_eq!(h.links.with_deleted(n.id, None).await?.len(), 1);

    assert!(h.links.restore(n.id, observer).await?);
    assert_eq!(
        resolver.count(&Scope::Super, principal, ReadFilter::Any).await?,
        1
    );
    Ok(())
}

#[tokio::test]
async fn test_soft_deleted_read_link_does_not_exclude_role_grant() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let principal = Uuid::new_v4();
    let role = Uuid::new_v4();

    let n = h
        .factory
        .create(
            CreateNotification::new("liked")
                .observer(ObserverRef::User(principal))
                .observer(ObserverRef::Role(role)),
        )
        .await?;
    let resolver = h.resolver(InMemoryDirectory::new().with_role(principal, role));
    resolver.mark_read(principal, n.id).await?;
    h.links.soft_delete(n.id, ObserverRef::User(principal)).await?;

    let unread = resolver
        .fetch(&Scope::Super, principal, ReadFilter::Unread)
        .await?;
    assert_eq!(ids(&unread), HashSet::from([n.id]));
    Ok(())
}

#[tokio::test]
async fn test_mark_read_is_idempotent() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, false).await?;
    let principal = Uuid::new_v4();

    let n = h
        .factory
        .create(CreateNotification::new("liked").observer(ObserverRef::User(principal)))
        .await?;
    let resolver = h.resolver(InMemoryDirectory::new());

    let first = resolver.mark_read(principal, n.id).await?;
    let second = resolver.mark_read(principal, n.id).await?;

    assert!(first.is_read());
    assert!(second.is_read());
    assert_eq!(first.id, second.id);
    assert!(second.read_at >= first.read_at);
    assert_eq!(h.links.observers_of(n.id, Some(ObserverKind::User)).await?.len(), 1);

    let stored = h
        .links
        .find(n.id, ObserverRef::User(principal))
        .await?
        .expect("direct link stored");
    assert_eq!(stored.read_at, second.read_at);
    Ok(())
}

#[tokio::test]
async fn test_mark_read_revives_soft_deleted_direct_link() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let principal = Uuid::new_v4();
    let role = Uuid::new_v4();

    let n = h
        .factory
        .create(
            CreateNotification::new("liked")
                .observer(ObserverRef::User(principal))
                .observer(ObserverRef::Role(role)),
        )
        .await?;
    let resolver = h.resolver(InMemoryDirectory::new().with_role(principal, role));
    assert!(h.links.soft_delete(n.id, ObserverRef::User(principal)).await?);

    let link = resolver.mark_read(principal, n.id).await?;
    assert!(link.is_read());

    assert_eq!(
        resolver
            .count(&Scope::Super, principal, ReadFilter::Unread)
            .await?,
        0
    );
    let stored = h
        .links
        .find(n.id, ObserverRef::User(principal))
        .await?
        .expect("direct link revived");
    assert_eq!(stored.id, link.id);
    assert!(stored.is_read());
    assert_eq!(h.links.with_deleted(n.id, Some(ObserverKind::User)).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_direct_unread_link_excludes_role_read_grant() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let (principal, member) = (Uuid::new_v4(), Uuid::new_v4());
    let role = Uuid::new_v4();

    let n = h
        .factory
        .create(
            CreateNotification::new("commented")
                .observer(ObserverRef::User(principal))
                .observer(ObserverRef::Role(role)),
        )
        .await?;
    h.links
        .sync_read(n.id, ObserverRef::Role(role), Utc::now().into())
        .await?;

    let resolver = h.resolver(
        InMemoryDirectory::new()
            .with_role(principal, role)
            .with_role(member, role),
    );

    assert_eq!(
        resolver.count(&Scope::Super, principal, ReadFilter::Read).await?,
        0
    );
    assert_eq!(
        resolver
            .count(&Scope::Super, principal, ReadFilter::Unread)
            .await?,
        1
    );
    let any = resolver.fetch(&Scope::Super, principal, ReadFilter::Any).await?;
    assert_eq!(ids(&any), HashSet::from([n.id]));

    // Without a direct link the role's read state applies.
    assert_eq!(
        resolver.count(&Scope::Super, member, ReadFilter::Read).await?,
        1
    );
    assert_eq!(
        resolver.count(&Scope::Super, member, ReadFilter::Unread).await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_with_deleted_respects_observer_kind() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let principal = Uuid::new_v4();
    let role = Uuid::new_v4();

    let n = h
        .factory
        .create(
            CreateNotification::new("liked")
                .observer(ObserverRef::User(principal))
                .observer(ObserverRef::Role(role)),
        )
        .await?;
    h.links.soft_delete(n.id, ObserverRef::Role(role)).await?;

    assert!(h.links.observers_of(n.id, Some(ObserverKind::Role)).await?.is_empty());
    let roles = h.links.with_deleted(n.id, Some(ObserverKind::Role)).await?;
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].observer(), ObserverRef::Role(role));
    assert_eq!(h.links.with_deleted(n.id, None).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_mark_read_creates_missing_direct_link() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, true).await?;
    let principal = Uuid::new_v4();
    let role = Uuid::new_v4();

    let n = h
        .factory
        .create(CreateNotification::new("liked").observer(ObserverRef::Role(role)))
        .await?;
    let resolver = h.resolver(InMemoryDirectory::new().with_role(principal, role));

    let link = resolver.mark_read(principal, n.id).await?;
    assert_eq!(link.observer(), ObserverRef::User(principal));
    assert!(link.is_read());

    let role_link = h
        .links
        .find(n.id, ObserverRef::Role(role))
        .await?
        .expect("role link kept");
    assert!(!role_link.is_read());
    assert_eq!(
        resolver
            .count(&Scope::Super, principal, ReadFilter::Unread)
            .await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_reattach_keeps_single_link_and_read_state() -> Result<()> {
    let h = Harness::new(TypeFormat::Class, false).await?;
    let principal = Uuid::new_v4();
    let observer = ObserverRef::User(principal);

    let n = h
        .factory
        .create(CreateNotification::new("liked").observer(observer))
        .await?;
    let resolver = h.resolver(InMemoryDirectory::new());
    resolver.mark_read(principal, n.id).await?;

    resolver.attach(n.id, &[observer, observer]).await?;

    let links = h.links.observers_of(n.id, None).await?;
    assert_eq!(links.len(), 1);
    assert!(links[0].is_read());
    Ok(())
}
