/// End-to-end behaviour of the storage layer against the memory backend
///
/// Run with: cargo test --test acceptance_tests
mod common;

use common::{User, connect, usernames};
use tablestore::prelude::*;

#[tokio::test]
async fn test_users_scenario() {
    let db = connect().await;
    let users = db
        .register_table::<User>(Some("users"), Some(User::fields()))
        .await
        .unwrap();
    assert_eq!(users.count().await.unwrap(), 0);

    let first = User::new("test");
    let second = User::new("test2");
    let third = User::new("test3");
    for user in [&first, &second, &third] {
        users.save(user).await.unwrap();
    }
    assert_eq!(users.count().await.unwrap(), 3);

    let removed = users
        .build_query("username = @username", params! { "username" => "test3" })
        .unwrap()
        .delete_all()
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(users.count().await.unwrap(), 2);

    let found = users
        .build_query("username = @username", params! { "username" => "test" })
        .unwrap()
        .fetch()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], first);

    let matches = users
        .where_column("username", "test2")
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(matches, 1);

    users.truncate().await.unwrap();
    assert_eq!(users.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_save_assigns_identifier_once() {
    let db = connect().await;
    let users = db
        .register_table::<User>(None, Some(User::fields()))
        .await
        .unwrap();
    assert_eq!(users.name(), "user");

    let mut alice = User::new("alice");
    assert!(!alice.is_persisted());
    assert_eq!(alice.id().unwrap_err(), StoreError::UnpersistedAccess);

    let id = users.save(&alice).await.unwrap();
    assert!(alice.is_persisted());
    assert_eq!(alice.id().unwrap(), &id);
    assert!(id.as_uuid().is_some());

    alice.email = Some("alice@example.com".to_string());
    let again = users.save(&alice).await.unwrap();
    assert_eq!(again, id);
    assert_eq!(users.count().await.unwrap(), 1);

    let stored = users.get_by_id(id.clone()).await.unwrap().unwrap();
    assert_eq!(stored, alice);
    assert_eq!(stored.email.as_deref(), Some("alice@example.com"));
    assert!(stored.active);
    assert!(stored.created_at.is_some());
}

#[tokio::test]
async fn test_inserts_get_distinct_identifiers() {
    let db = connect().await;
    let users = db
        .register_table::<User>(None, Some(User::fields()))
        .await
        .unwrap();

    let mut ids = Vec::new();
    for name in ["a", "b", "c", "d"] {
        ids.push(users.save(&User::new(name)).await.unwrap());
    }
    ids.sort_by_key(|id| id.to_string());
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert_eq!(users.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_get_by_missing_id_is_none() {
    let db = connect().await;
    let users = db
        .register_table::<User>(None, Some(User::fields()))
        .await
        .unwrap();

    let missing = users.get_by_id(uuid::Uuid::new_v4()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_delete_entity() {
    let db = connect().await;
    let users = db
        .register_table::<User>(None, Some(User::fields()))
        .await
        .unwrap();

    let unsaved = User::new("ghost");
    assert_eq!(
        users.delete(&unsaved).await.unwrap_err(),
        StoreError::UnpersistedAccess
    );

    let bob = User::new("bob");
    users.save(&bob).await.unwrap();
    assert!(users.delete(&bob).await.unwrap());
    assert!(!users.delete(&bob).await.unwrap());
    assert_eq!(users.count().await.unwrap(), 0);

    let carol = User::new("carol");
    let id = users.save(&carol).await.unwrap();
    assert!(users.delete_by_id(id).await.unwrap());
}

#[tokio::test]
async fn test_constraint_violation_leaves_table_unchanged() {
    let db = connect().await;
    let users = db
        .register_table::<User>(None, Some(User::fields()))
        .await
        .unwrap();

    users.save(&User::new("taken")).await.unwrap();

    let duplicate = User::new("taken").with_email("other@example.com");
    let err = users.save(&duplicate).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
    assert!(!duplicate.is_persisted());

    let too_long = User::new(&"x".repeat(40));
    assert!(matches!(
        users.save(&too_long).await,
        Err(StoreError::Backend(_))
    ));

    assert_eq!(users.count().await.unwrap(), 1);
    let names = users.query().fetch().await.unwrap();
    assert_eq!(usernames(&names), vec!["taken"]);
}

#[tokio::test]
async fn test_update_keeps_other_rows() {
    let db = connect().await;
    let users = db
        .register_table::<User>(None, Some(User::fields()))
        .await
        .unwrap();

    let mut first = User::new("first");
    let second = User::new("second");
    users.save(&first).await.unwrap();
    users.save(&second).await.unwrap();

    first.active = false;
    users.save(&first).await.unwrap();

    let inactive = users.where_column("active", false).unwrap().fetch().await.unwrap();
    assert_eq!(usernames(&inactive), vec!["first"]);
    let active = users.where_column("active", true).unwrap().fetch().await.unwrap();
    assert_eq!(usernames(&active), vec!["second"]);

    first.username = "second".to_string();
    assert!(users.save(&first).await.is_err());
    let restored = users.get_by_id(first.id().unwrap().clone()).await.unwrap().unwrap();
    assert_eq!(restored.username, "first");
}
