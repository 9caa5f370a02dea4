//! Integration tests for the bounded channel: backpressure, ordering and
//! close semantics.

use std::sync::Arc;
use std::time::Duration;

use lexio_sync::{Channel, SyncError};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn wait_for_size<T>(channel: &Channel<T>, size: usize) {
    while channel.size() != size {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn third_send_waits_for_a_receive() {
    let channel = Arc::new(Channel::bounded(2));

    let mut sends = Vec::new();
    for item in ["a", "b", "c"] {
        let channel = channel.clone();
        sends.push(tokio::spawn(async move { channel.send(item).await }));
        tokio::task::yield_now().await;
    }
    wait_for_size(&channel, 2).await;

    let mut sends = sends.into_iter();
    let a = sends.next().unwrap();
    let b = sends.next().unwrap();
    let c = sends.next().unwrap();
    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!c.is_finished(), "third send must stay suspended while full");

    assert_eq!(channel.receive().await, Some("a"));
    tokio::time::timeout(TIMEOUT, c)
        .await
        .expect("suspended send should complete after a receive")
        .unwrap()
        .unwrap();

    assert_eq!(channel.receive().await, Some("b"));
    assert_eq!(channel.receive().await, Some("c"));
}

#[tokio::test]
async fn close_drains_buffered_items_then_ends() {
    let channel = Channel::bounded(4);
    for i in 0..3 {
        channel.send(i).await.unwrap();
    }
    channel.close().await;

    assert_eq!(channel.receive().await, Some(0));
    assert_eq!(channel.receive().await, Some(1));
    assert_eq!(channel.receive().await, Some(2));
    assert_eq!(channel.receive().await, None);
    assert_eq!(channel.receive().await, None);
}

#[tokio::test]
async fn close_fails_blocked_senders() {
    let channel = Arc::new(Channel::bounded(1));
    channel.send(1).await.unwrap();

    let blocked = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.send(2).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!blocked.is_finished());

    channel.close().await;
    let result = tokio::time::timeout(TIMEOUT, blocked).await.unwrap().unwrap();
    assert_eq!(result, Err(SyncError::ChannelClosed));

    assert_eq!(channel.receive().await, Some(1));
    assert_eq!(channel.receive().await, None);
}

#[tokio::test]
async fn close_wakes_blocked_receivers() {
    let channel: Arc<Channel<u32>> = Arc::new(Channel::bounded(2));

    let mut receivers = Vec::new();
    for _ in 0..3 {
        let channel = channel.clone();
        receivers.push(tokio::spawn(async move { channel.receive().await }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    channel.close().await;
    for receiver in receivers {
        let item = tokio::time::timeout(TIMEOUT, receiver).await.unwrap().unwrap();
        assert_eq!(item, None);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn order_is_preserved_end_to_end() {
    let channel = Arc::new(Channel::bounded(3));

    let producer = {
        let channel = channel.clone();
        tokio::spawn(async move {
            for i in 0..200u32 {
                channel.send(i).await.unwrap();
            }
            channel.close().await;
        })
    };

    let mut received = Vec::new();
    while let Some(item) = channel.receive().await {
        received.push(item);
    }
    producer.await.unwrap();

    assert_eq!(received, (0..200).collect::<Vec<_>>());
}
