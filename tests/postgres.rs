//! `PostgresStore` against a live database.
//!
//! Skipped unless `TEST_DATABASE_URL` points at a disposable PostgreSQL
//! database; migrations are applied on connect.

#![allow(clippy::panic)]

use std::sync::Arc;

use chrono::Utc;

use jobboard_gateway::config::AppConfig;
use jobboard_gateway::domain::Role;
use jobboard_gateway::domain::chat::ParticipantPair;
use jobboard_gateway::domain::logs::{ActivityFilter, NewActivityLog};
use jobboard_gateway::domain::user::{NewUser, User};
use jobboard_gateway::persistence::{ChatStore, LogStore, PostgresStore, UserStore};

async fn connect() -> Option<PostgresStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let mut config = AppConfig::for_tests(std::env::temp_dir());
    config.database_url = url;
    config.database_connect_timeout_secs = 5;
    let Ok(store) = PostgresStore::connect(&config).await else {
        panic!("TEST_DATABASE_URL is set but the database is unreachable");
    };
    Some(store)
}

async fn user(store: &PostgresStore, role: Role) -> User {
    let email = format!("{}@pg.test", uuid::Uuid::new_v4());
    let Ok(user) = store
        .insert_user(NewUser {
            email,
            password_hash: "hash".into(),
            full_name: None,
            role,
        })
        .await
    else {
        panic!("insert user failed");
    };
    user
}

#[tokio::test]
async fn concurrent_resolution_creates_one_conversation() {
    let Some(store) = connect().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let store = Arc::new(store);
    let employer = user(&store, Role::Employer).await;
    let student = user(&store, Role::Student).await;
    let pair = ParticipantPair {
        employer_id: employer.id,
        student_id: student.id,
    };
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.find_or_create_conversation(pair, None, Utc::now()).await
        }));
    }
    let mut ids = Vec::new();
    let mut created = 0;
    for handle in handles {
        let Ok(Ok((conv, was_created))) = handle.await else {
            panic!("resolution failed");
        };
        ids.push(conv.id);
        created += usize::from(was_created);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(created, 1);
}

#[tokio::test]
async fn unread_counts_are_grouped_per_conversation() {
    let Some(store) = connect().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let employer = user(&store, Role::Employer).await;
    let first = user(&store, Role::Student).await;
    let second = user(&store, Role::Student).await;
    let mut conversations = Vec::new();
    for student in [&first, &second] {
        let pair = ParticipantPair {
            employer_id: employer.id,
            student_id: student.id,
        };
        let Ok((conv, _)) = store.find_or_create_conversation(pair, None, Utc::now()).await else {
            panic!("conversation");
        };
        conversations.push(conv);
    }
    let [with_first, with_second] = conversations.as_slice() else {
        panic!("expected two conversations");
    };
    for (conv, sender, text) in [
        (with_first.id, employer.id, "a"),
        (with_first.id, employer.id, "b"),
        (with_first.id, first.id, "c"),
        (with_second.id, second.id, "d"),
    ] {
        let Ok(_) = store
            .append_message(conv, sender, text.into(), text.into(), Utc::now())
            .await
        else {
            panic!("append failed");
        };
    }

    let ids = [with_first.id, with_second.id];
    let Ok(mut counts) = store.unread_counts(employer.id, &ids).await else {
        panic!("unread counts failed");
    };
    counts.sort();
    let mut expected = vec![(with_first.id, 1), (with_second.id, 1)];
    expected.sort();
    assert_eq!(counts, expected);
    assert_eq!(
        store.unread_counts(first.id, &ids).await.ok(),
        Some(vec![(with_first.id, 2)])
    );
    assert_eq!(store.total_unread(employer.id).await.ok(), Some(2));

    assert_eq!(store.mark_read(with_first.id, first.id, Utc::now()).await.ok(), Some(2));
    assert_eq!(store.unread_counts(first.id, &ids).await.ok(), Some(vec![]));
}

#[tokio::test]
async fn activity_stats_follow_the_filter() {
    let Some(store) = connect().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let caller = user(&store, Role::Student).await;
    for (status_code, duration_ms) in [(200, 10), (201, 20), (404, 30)] {
        let Ok(()) = store
            .insert_activity_log(NewActivityLog {
                user_id: Some(caller.id),
                method: "GET".into(),
                path: "/api/v1/jobs".into(),
                query: None,
                ip_address: "127.0.0.1".into(),
                user_agent: None,
                status_code,
                duration_ms,
                timestamp: Utc::now(),
            })
            .await
        else {
            panic!("insert activity failed");
        };
    }
    let filter = ActivityFilter {
        user_id: Some(caller.id),
        ..ActivityFilter::default()
    };
    let Ok(stats) = store.activity_stats(&filter).await else {
        panic!("stats failed");
    };
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.successful_requests, 2);
    assert_eq!(stats.failed_requests, 1);
    assert_eq!(stats.unique_users, 1);
    assert_eq!(stats.anonymous_requests, 0);
    assert!((stats.average_duration_ms - 20.0).abs() < 1e-9);
}
