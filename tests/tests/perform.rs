mod common;
use anyhow::Result;
use common::*;
use optimist::{CoordinatorConfig, OperationEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, PartialEq)]
enum ApiError {
    Network,
    Rejected(u16),
}

/// The speculative change is visible while the action is still in flight
#[tokio::test]
async fn test_change_visible_before_action_settles() -> Result<()> {
    let coordinator = Arc::new(coordinator(CoordinatorConfig::default()));
    let (respond, response) = oneshot::channel::<Result<(), ApiError>>();

    let task = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.perform(key("c1"), || async move { response.await.unwrap() }).await })
    };

    // wait for the task to start its operation
    while coordinator.pending_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(reply_counts(&coordinator.snapshot()), counts(&[("c1", 3), ("c2", 0)]));

    respond.send(Err(ApiError::Rejected(409))).unwrap();
    assert_eq!(task.await?, Err(ApiError::Rejected(409)));
    assert_eq!(coordinator.snapshot().to_vec(), comments());
    Ok(())
}

/// The action's value is handed back on success
#[tokio::test]
async fn test_perform_returns_action_value() -> Result<()> {
    let coordinator = coordinator(CoordinatorConfig::default());
    let reply_id = coordinator.perform(key("c2"), || async { Ok::<_, ApiError>("r-81") }).await;
    assert_eq!(reply_id, Ok("r-81"));
    assert_eq!(reply_counts(&coordinator.snapshot()), counts(&[("c1", 2), ("c2", 1)]));
    Ok(())
}

/// Server-authoritative fields are merged on commit
#[tokio::test]
async fn test_perform_and_merge() -> Result<()> {
    let coordinator = coordinator(CoordinatorConfig::default());
    let (_guard, events) = event_watcher(&coordinator);

    coordinator
        .perform_and_merge(key("c1"), || async { Ok::<_, ApiError>(CommentPatch::new().reply_count(7u32).edited_at(42u64)) })
        .await
        .unwrap();

    let c1 = coordinator.snapshot().get(&key("c1")).cloned().unwrap();
    assert_eq!((c1.reply_count, c1.edited_at), (7, Some(42)));

    let events = events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[1], OperationEvent::Committed { merged: true, .. }));

    // failure: nothing merged, change undone
    let result = coordinator.perform_and_merge(key("c1"), || async { Err::<CommentPatch, _>(ApiError::Network) }).await;
    assert_eq!(result, Err(ApiError::Network));
    assert_eq!(coordinator.snapshot().get(&key("c1")).unwrap().reply_count, 7);
    Ok(())
}

/// Operations on different keys are independent, whatever order they settle in
#[tokio::test]
async fn test_concurrent_keys_settle_out_of_order() -> Result<()> {
    for config in [CoordinatorConfig::default(), CoordinatorConfig::hardened()] {
        let coordinator = coordinator(config);
        let (fail_c1, c1_response) = oneshot::channel::<()>();
        let (ok_c2, c2_response) = oneshot::channel::<()>();

        let c1 = coordinator.perform(key("c1"), || async move {
            c1_response.await.unwrap();
            Err::<(), _>(ApiError::Network)
        });
        let c2 = coordinator.perform(key("c2"), || async move {
            c2_response.await.unwrap();
            Ok::<(), ApiError>(())
        });
        let settle = async {
            tokio::task::yield_now().await;
            ok_c2.send(()).unwrap();
            tokio::task::yield_now().await;
            fail_c1.send(()).unwrap();
        };

        let (c1, c2, ()) = tokio::join!(c1, c2, settle);
        assert_eq!(c1, Err(ApiError::Network));
        assert_eq!(c2, Ok(()));
        assert_eq!(reply_counts(&coordinator.snapshot()), counts(&[("c1", 2), ("c2", 1)]));
        assert_eq!(coordinator.pending_count(), 0);
    }
    Ok(())
}

/// Without per-key serialization, two performs on one key overlap
#[tokio::test]
async fn test_same_key_overlaps_by_default() -> Result<()> {
    let coordinator = Arc::new(coordinator(CoordinatorConfig::default()));
    let (release, released) = tokio::sync::watch::channel(false);

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let coordinator = coordinator.clone();
        let released = released.clone();
        tasks.push(tokio::spawn(async move {
            coordinator
                .perform(key("c1"), || async move {
                    let mut released = released;
                    let ok = released.wait_for(|r| *r).await.is_ok();
                    if ok {
                        Ok(())
                    } else {
                        Err(ApiError::Network)
                    }
                })
                .await
        }));
    }

    while coordinator.pending_count() < 2 {
        tokio::task::yield_now().await;
    }
    assert_eq!(coordinator.snapshot().get(&key("c1")).unwrap().reply_count, 4);

    release.send(true)?;
    for task in tasks {
        task.await?.unwrap();
    }
    assert_eq!(coordinator.snapshot().get(&key("c1")).unwrap().reply_count, 4);
    Ok(())
}

/// With per-key serialization, the second perform waits for the first to reconcile
#[tokio::test]
async fn test_serialized_same_key() -> Result<()> {
    let coordinator = Arc::new(coordinator(CoordinatorConfig::hardened()));
    let (respond, response) = oneshot::channel::<Result<(), ApiError>>();

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.perform(key("c1"), || async move { response.await.unwrap() }).await })
    };
    while coordinator.pending_count() == 0 {
        tokio::task::yield_now().await;
    }

    let second = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.perform(key("c1"), || async { Ok::<(), ApiError>(()) }).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(coordinator.pending_count(), 1, "second perform is queued behind the first");
    assert!(!second.is_finished());
    assert_eq!(coordinator.snapshot().get(&key("c1")).unwrap().reply_count, 3);

    respond.send(Err(ApiError::Network)).unwrap();
    assert_eq!(first.await?, Err(ApiError::Network));
    assert_eq!(second.await?, Ok(()));

    // first rolled back, second committed on top of the restored value
    assert_eq!(coordinator.snapshot().get(&key("c1")).unwrap().reply_count, 3);
    Ok(())
}

/// An action that never settles leaves the operation pending
#[tokio::test]
async fn test_unsettled_action_stays_pending() -> Result<()> {
    let coordinator = Arc::new(coordinator(CoordinatorConfig::default().with_stale_after(Duration::from_millis(30))));

    let _task = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.perform(key("c2"), || std::future::pending::<Result<(), ApiError>>()).await })
    };
    while coordinator.pending_count() == 0 {
        tokio::task::yield_now().await;
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stale = coordinator.stale();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].key, key("c2"));
    assert!(stale[0].age >= Duration::from_millis(30));
    assert_eq!(coordinator.snapshot().get(&key("c2")).unwrap().reply_count, 1);
    Ok(())
}

/// Wrapping the action in a deadline is the caller's job; when it fires, the operation is rolled back
#[tokio::test]
async fn test_caller_deadline() -> Result<()> {
    let coordinator = coordinator(CoordinatorConfig::default());

    let result = coordinator
        .perform(key("c1"), || async {
            match tokio::time::timeout(Duration::from_millis(10), std::future::pending::<Result<(), ApiError>>()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ApiError::Network),
            }
        })
        .await;

    assert_eq!(result, Err(ApiError::Network));
    assert_eq!(coordinator.snapshot().to_vec(), comments());
    Ok(())
}
