/// Concurrent access tests
///
/// Tables and the registry are shared between tasks.
/// Run with: cargo test --test concurrent_access_tests
mod common;

use std::sync::Arc;

use common::{Message, User, connect};
use futures::future::join_all;
use tablestore::prelude::*;

#[tokio::test]
async fn test_concurrent_saves() {
    let db = connect().await;
    let users = db
        .register_table::<User>(None, Some(User::fields()))
        .await
        .unwrap();

    let num_tasks = 8;
    let saves_per_task = 25;

    let handles: Vec<_> = (0..num_tasks)
        .map(|task_id| {
            let users = users.clone();
            tokio::spawn(async move {
                for i in 0..saves_per_task {
                    let user = User::new(&format!("user_{}_{}", task_id, i));
                    users.save(&user).await.unwrap();
                    assert!(user.is_persisted());
                }
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap();
    }

    assert_eq!(users.count().await.unwrap(), num_tasks * saves_per_task);
}

#[tokio::test]
async fn test_concurrent_serial_keys_are_unique() {
    let db = connect().await;
    let messages = db
        .register_table::<Message>(None, Some(Message::fields()))
        .await
        .unwrap();

    let saves = (0..50).map(|i| {
        let messages = messages.clone();
        async move {
            messages
                .save(&Message::new("load", &format!("note {}", i), i))
                .await
                .unwrap()
        }
    });
    let mut ids: Vec<i64> = join_all(saves)
        .await
        .into_iter()
        .filter_map(|id| match id {
            EntityId::Integer(n) => Some(n),
            EntityId::Uuid(_) => None,
        })
        .collect();
    ids.sort();

    assert_eq!(ids, (1..=50).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_concurrent_registration_single_winner() {
    let db = Arc::new(connect().await);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                db.register_table::<User>(Some("users"), Some(User::fields()))
                    .await
                    .map(|_| ())
            })
        })
        .collect();

    let mut registered = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Ok(()) => registered += 1,
            Err(err) => assert_eq!(err, StoreError::DuplicateRegistration("users".into())),
        }
    }

    assert_eq!(registered, 1);
    assert_eq!(db.table_names().await, vec!["users"]);
}

#[tokio::test]
async fn test_reads_during_writes() {
    let db = connect().await;
    let users = db
        .register_table::<User>(None, Some(User::fields()))
        .await
        .unwrap();
    for i in 0..10 {
        users.save(&User::new(&format!("seed_{}", i))).await.unwrap();
    }

    let writer = {
        let users = users.clone();
        tokio::spawn(async move {
            for i in 0..40 {
                users.save(&User::new(&format!("late_{}", i))).await.unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let users = users.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    let seeded = users
                        .build_query("username LIKE @prefix", params! { "prefix" => "seed_%" })
                        .unwrap()
                        .count()
                        .await
                        .unwrap();
                    assert_eq!(seeded, 10);

                    let total = users.count().await.unwrap();
                    assert!((10..=50).contains(&total));
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for result in join_all(readers).await {
        result.unwrap();
    }
    assert_eq!(users.count().await.unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_entity_inserted_once() {
    let db = connect().await;
    let messages = db
        .register_table::<Message>(None, Some(Message::fields()))
        .await
        .unwrap();

    let rounds = 300;
    for round in 0..rounds {
        let message = Arc::new(Message::new("shared", &format!("round {}", round), round));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let messages = messages.clone();
                let message = Arc::clone(&message);
                tokio::spawn(async move { messages.save(&message).await })
            })
            .collect();

        let ids: Vec<EntityId> = join_all(handles)
            .await
            .into_iter()
            .map(|result| result.unwrap().unwrap())
            .collect();
        assert_eq!(ids[0], ids[1], "round {} saved under two ids", round);
        assert_eq!(message.id().unwrap(), &ids[0]);
    }

    assert_eq!(messages.count().await.unwrap(), rounds as u64);
}
