//! Aggregation behaviour against the in-memory queue.

use golden_nonce::message::encode_result;
use golden_nonce::{
    Aggregator, Error, MemoryQueue, Message, Outcome, Queue, QueueSettings, SearchTask,
    WorkerResult,
};
use std::time::Duration;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(600);

fn settings() -> QueueSettings {
    QueueSettings {
        lease: Duration::from_secs(30),
        receive_wait: Duration::from_secs(10),
        retry_interval: Duration::from_secs(10),
    }
}

fn task(i: u32) -> SearchTask {
    SearchTask::new(b"COMSM0010cloud".to_vec(), i * 100, (i + 1) * 100, 20).unwrap()
}

fn failure(i: u32) -> Message {
    let reason = format!("No nonce found of length 20 between {} and {}", i * 100, (i + 1) * 100);
    encode_result(&task(i), &WorkerResult::NotFound { reason })
}

#[tokio::test(start_paused = true)]
async fn found_short_circuits() {
    let queue = MemoryQueue::new("OUTPUT_QUEUE");
    let found = WorkerResult::Found {
        nonce: 330,
        hash: "00f9a29f36ecb8fe8cab25143a7c4aafb3a996f23182f03177e3e670b6177dd5".into(),
    };
    let stream = [
        failure(0),
        failure(1),
        encode_result(&task(2), &found),
        failure(3),
        failure(4),
    ];
    for message in stream {
        queue.send(message).await.unwrap();
    }

    let outcome = Aggregator::new(&queue, settings()).wait(5, TIMEOUT).await.unwrap();
    match outcome {
        Outcome::Found {
            nonce, responses, ..
        } => {
            assert_eq!(nonce, 330);
            assert_eq!(responses, 3);
        }
        other => panic!("expected a nonce, got {other:?}"),
    }
    assert_eq!(queue.visible(), 2, "the last two results must stay unread");
}

#[tokio::test(start_paused = true)]
async fn all_failures_end_before_timeout() {
    let queue = MemoryQueue::new("OUTPUT_QUEUE");
    for i in 0..5 {
        queue.send(failure(i)).await.unwrap();
    }

    let start = Instant::now();
    let outcome = Aggregator::new(&queue, settings()).wait(5, TIMEOUT).await.unwrap();
    assert_eq!(outcome, Outcome::Exhausted { responses: 5 });
    assert!(start.elapsed() < TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn generic_failure_text_still_ends_the_run() {
    let queue = MemoryQueue::new("OUTPUT_QUEUE");
    for i in 0..4 {
        let result = WorkerResult::NotFound {
            reason: String::new(),
        };
        queue.send(encode_result(&task(i), &result)).await.unwrap();
    }

    let outcome = Aggregator::new(&queue, settings()).wait(4, TIMEOUT).await.unwrap();
    assert_eq!(outcome, Outcome::Exhausted { responses: 4 });
}

#[tokio::test(start_paused = true)]
async fn redelivered_failure_is_not_double_counted() {
    let queue = MemoryQueue::new("OUTPUT_QUEUE");
    queue.send(failure(0)).await.unwrap();
    queue.send(failure(0)).await.unwrap();
    queue.send(failure(1)).await.unwrap();

    let result = Aggregator::new(&queue, settings())
        .wait(3, Duration::from_secs(60))
        .await;
    assert!(matches!(
        result,
        Err(Error::Timeout {
            received: 2,
            expected: 3,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn late_results_are_picked_up() {
    let queue = std::sync::Arc::new(MemoryQueue::new("OUTPUT_QUEUE"));
    let sender = {
        let queue = std::sync::Arc::clone(&queue);
        tokio::spawn(async move {
            for i in 0..3 {
                tokio::time::sleep(Duration::from_secs(45)).await;
                queue.send(failure(i)).await.unwrap();
            }
        })
    };

    let start = Instant::now();
    let outcome = Aggregator::new(queue.as_ref(), settings())
        .wait(3, TIMEOUT)
        .await
        .unwrap();
    sender.await.unwrap();
    assert_eq!(outcome, Outcome::Exhausted { responses: 3 });
    assert!(start.elapsed() >= Duration::from_secs(135));
    assert!(start.elapsed() < TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn silence_is_a_timeout_not_a_failure() {
    let queue = MemoryQueue::new("OUTPUT_QUEUE");
    let result = Aggregator::new(&queue, settings())
        .wait(4, Duration::from_secs(60))
        .await;
    match result {
        Err(Error::Timeout {
            waited,
            received,
            expected,
        }) => {
            assert_eq!(waited, Duration::from_secs(60));
            assert_eq!(received, 0);
            assert_eq!(expected, 4);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}
