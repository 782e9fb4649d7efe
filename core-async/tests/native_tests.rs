//! Integration tests for the primitives the sync engine relies on.

use core_async::{sync, task, time};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[core_async::test]
async fn test_timeout_elapses() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(200)).await;
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test]
async fn test_binary_semaphore_admits_single_entrant() {
    let gate = Arc::new(sync::Semaphore::new(1));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gate = gate.clone();
        let inside = inside.clone();
        let max_inside = max_inside.clone();
        handles.push(task::spawn(async move {
            let _permit = gate.acquire().await.unwrap();
            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
            max_inside.fetch_max(now, Ordering::SeqCst);
            task::yield_now().await;
            inside.fetch_sub(1, Ordering::SeqCst);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
}

#[core_async::test]
async fn test_cancellation_token_reaches_child() {
    let parent = sync::CancellationToken::new();
    let child = parent.child_token();

    let handle = task::spawn(async move {
        child.cancelled().await;
        "stopped"
    });

    parent.cancel();
    assert_eq!(handle.await.unwrap(), "stopped");
}

#[core_async::test]
async fn test_watch_channel_reports_latest_state() {
    let (tx, mut rx) = sync::watch::channel(false);

    task::spawn(async move {
        time::sleep(time::Duration::from_millis(5)).await;
        tx.send(true).unwrap();
    });

    rx.wait_for(|active| *active).await.unwrap();
    assert!(*rx.borrow());
}

#[core_async::test]
async fn test_broadcast_channel() {
    let (tx, mut rx1) = sync::broadcast::channel(10);
    let mut rx2 = tx.subscribe();

    tx.send(7).unwrap();

    assert_eq!(rx1.recv().await.unwrap(), 7);
    assert_eq!(rx2.recv().await.unwrap(), 7);
}
