//! Audit pipeline end-to-end: fan-out, batching, shutdown drain.
//!
//! Drives the real pipeline + workers with recording sinks, no external
//! services involved.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use depot_server::audit::{EventSink, Pipeline, Worker};
use depot_server::domain::{Event, EventType};

struct RecordingSink {
    label: &'static str,
    seen: Mutex<Vec<Event>>,
}

impl RecordingSink {
    fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            label,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl EventSink for RecordingSink {
    async fn process(&self, event: &Event) -> anyhow::Result<()> {
        assert!(!self.label.is_empty());
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn events_fan_out_to_both_pools_and_flush_on_timer() {
    let (pipeline, channels) = Pipeline::new();
    let shutdown = CancellationToken::new();

    let db_status = RecordingSink::new("db_status");
    let db_api = RecordingSink::new("db_api");
    let stdout_status = RecordingSink::new("stdout_status");
    let stdout_api = RecordingSink::new("stdout_api");

    let mut handles = Vec::new();
    handles.push(tokio::spawn(
        Worker::new(db_status.clone(), "db_status").run(channels.db.status_rx, shutdown.clone()),
    ));
    handles.push(tokio::spawn(
        Worker::new(db_api.clone(), "db_api").run(channels.db.api_rx, shutdown.clone()),
    ));
    handles.push(tokio::spawn(
        Worker::new(stdout_status.clone(), "stdout_status")
            .run(channels.stdout.status_rx, shutdown.clone()),
    ));
    handles.push(tokio::spawn(
        Worker::new(stdout_api.clone(), "stdout_api")
            .run(channels.stdout.api_rx, shutdown.clone()),
    ));

    // three status events: below the batch-size threshold
    for i in 0..3 {
        pipeline
            .send_event(
                EventType::StatusChange,
                serde_json::json!({"order_id": format!("o{i}"), "status": "stored"}),
            )
            .await;
    }
    // one api event on the other channel
    pipeline
        .send_event(
            EventType::ApiRequest,
            serde_json::json!({"method": "POST", "path": "/orders"}),
        )
        .await;

    tokio::task::yield_now().await;
    assert_eq!(db_status.count(), 0, "partial batch must not flush early");

    // the 500 ms ticker flushes the partial batches
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(db_status.count(), 3);
    assert_eq!(stdout_status.count(), 3);
    assert_eq!(db_api.count(), 1);
    assert_eq!(stdout_api.count(), 1);

    // five more status events flush immediately on the size threshold
    for i in 0..5 {
        pipeline
            .send_event(
                EventType::StatusChange,
                serde_json::json!({"order_id": format!("b{i}"), "status": "issued"}),
            )
            .await;
    }
    tokio::task::yield_now().await;
    assert_eq!(db_status.count(), 8);

    shutdown.cancel();
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_residual_events() {
    let (pipeline, channels) = Pipeline::new();
    let shutdown = CancellationToken::new();

    let sink = RecordingSink::new("db_status");
    let handle = tokio::spawn(
        Worker::new(sink.clone(), "db_status").run(channels.db.status_rx, shutdown.clone()),
    );

    pipeline
        .send_event(
            EventType::StatusChange,
            serde_json::json!({"order_id": "o1", "status": "refunded"}),
        )
        .await;
    tokio::task::yield_now().await;

    shutdown.cancel();
    handle.await.unwrap();
    assert_eq!(sink.count(), 1, "residual batch must flush on shutdown");
}
