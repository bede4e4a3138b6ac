//! Listener behavior against a loopback TCP publisher.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use parking_lot::Mutex;
use serde_json::{json, Value};
use streamsub_frame::{encode_object, FrameError, Record, RecordLayout, RecordShape, Scalar};
use streamsub_listener::{
    DeliveryQueue, Listener, ListenerConfig, ListenerError, ListenerState, OverflowPolicy,
};
use streamsub_transport::{Connector, Endpoint, SubscriberSocket, TcpConnector, TransportError};

/// Serve one session per entry: accept, write the bytes, then hold the
/// connection until the subscriber goes away.
fn publisher(sessions: Vec<Vec<u8>>) -> (Endpoint, JoinHandle<()>) {
    let server = TcpListener::bind("127.0.0.1:0").expect("publisher should bind");
    let endpoint = Endpoint::from(server.local_addr().expect("publisher should have addr"));

    let handle = thread::spawn(move || {
        for bytes in sessions {
            let (mut conn, _) = server.accept().expect("publisher should accept");
            conn.set_read_timeout(Some(Duration::from_secs(10)))
                .expect("read timeout should apply");
            conn.write_all(&bytes).expect("publisher write should succeed");
            let mut sink = [0u8; 64];
            while matches!(conn.read(&mut sink), Ok(n) if n > 0) {}
        }
    });
    (endpoint, handle)
}

fn object_frames(values: &[Value]) -> Vec<u8> {
    let mut wire = BytesMut::new();
    for value in values {
        encode_object(value, &mut wire).expect("encode should succeed");
    }
    wire.to_vec()
}

fn sensor_layout() -> RecordLayout {
    RecordLayout::parse("timestamp:i64,streamNum:u32,value:f32").expect("layout should parse")
}

fn config(endpoint: Endpoint, shape: RecordShape) -> ListenerConfig {
    ListenerConfig::new(endpoint, shape)
        .with_poll_timeout(Duration::from_millis(20))
        .with_retry_backoff(Duration::from_millis(20))
}

fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn pop_n<T>(queue: &DeliveryQueue<T>, n: usize) -> Vec<T> {
    (0..n)
        .map(|i| {
            queue
                .pop_timeout(Duration::from_secs(5))
                .unwrap_or_else(|| panic!("item {i} should arrive"))
        })
        .collect()
}

#[test]
fn three_fixed_records_in_one_read_arrive_in_order() {
    let layout = sensor_layout();
    let mut wire = BytesMut::new();
    for (timestamp, stream, value) in [(1_000i64, 2u32, 140.5f32), (1_001, 26, 0.25), (1_002, 3, -7.0)]
    {
        let record = layout
            .record(vec![
                Scalar::I64(timestamp),
                Scalar::U32(stream),
                Scalar::F32(value),
            ])
            .expect("record should match layout");
        layout.encode(&record, &mut wire).expect("encode should succeed");
    }
    assert_eq!(wire.len(), 48);

    let (endpoint, server) = publisher(vec![wire.to_vec()]);
    let queue = DeliveryQueue::new(8).expect("queue should build");
    let listener = Listener::builder(config(endpoint, RecordShape::Fixed(layout)))
        .queue(queue.clone())
        .spawn()
        .expect("listener should spawn");

    let streams: Vec<_> = pop_n(&queue, 3)
        .iter()
        .map(|r| r.as_fixed().and_then(|f| f.get("streamNum")).copied())
        .collect();
    assert_eq!(
        streams,
        vec![Some(Scalar::U32(2)), Some(Scalar::U32(26)), Some(Scalar::U32(3))]
    );
    assert!(queue.is_empty());

    listener.stop().expect("stop should be clean");
    assert_eq!(listener.stats().delivered, 3);
    server.join().expect("publisher should finish");
}

#[test]
fn failed_connect_is_retried_and_notified_once() {
    let (endpoint, server) = publisher(vec![object_frames(&[json!({"seq": 1})])]);

    let attempts = Arc::new(AtomicUsize::new(0));
    let connector_attempts = Arc::clone(&attempts);
    let connector = move |endpoint: &Endpoint| -> streamsub_transport::Result<Box<dyn SubscriberSocket>> {
        if connector_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(TransportError::Resolve {
                endpoint: endpoint.to_string(),
            });
        }
        TcpConnector::default().connect(endpoint)
    };

    let notified = Arc::new(Mutex::new(Vec::new()));
    let notify_log = Arc::clone(&notified);
    let queue = DeliveryQueue::new(4).expect("queue should build");
    let listener = Listener::builder(config(endpoint, RecordShape::Object).with_retry(true))
        .queue(queue.clone())
        .connector(connector)
        .notify(move |err| notify_log.lock().push(err.to_string()))
        .spawn()
        .expect("listener should spawn");

    assert_eq!(pop_n(&queue, 1), vec![Record::Object(json!({"seq": 1}))]);
    listener.stop().expect("stop should be clean");

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(notified.lock().len(), 1);
    assert_eq!(listener.stats().connections, 1);
    server.join().expect("publisher should finish");
}

#[test]
fn checksum_error_reconnects_and_drops_buffered_bytes() {
    let mut first = object_frames(&[json!({"seq": 1})]);
    let corrupt_at = first.len() + 8;
    first.extend(object_frames(&[json!({"seq": 2}), json!({"seq": 3})]));
    first[corrupt_at] ^= 0x01;

    let (endpoint, server) = publisher(vec![first, object_frames(&[json!({"seq": "after"})])]);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&errors);
    let queue = DeliveryQueue::new(8).expect("queue should build");
    let listener = Listener::builder(config(endpoint, RecordShape::Object).with_retry(true))
        .queue(queue.clone())
        .notify(move |err| {
            seen.lock().push(matches!(
                err,
                ListenerError::Frame(FrameError::ChecksumMismatch { .. })
            ))
        })
        .spawn()
        .expect("listener should spawn");

    let received = pop_n(&queue, 2);
    listener.stop().expect("stop should be clean");

    assert_eq!(
        received,
        vec![
            Record::Object(json!({"seq": 1})),
            Record::Object(json!({"seq": "after"}))
        ]
    );
    assert!(queue.is_empty());
    assert_eq!(*errors.lock(), vec![true]);
    assert_eq!(listener.stats().connections, 2);
    server.join().expect("publisher should finish");
}

#[test]
fn publisher_close_without_retry_ends_listener_with_error() {
    let server = TcpListener::bind("127.0.0.1:0").expect("publisher should bind");
    let endpoint = Endpoint::from(server.local_addr().expect("publisher should have addr"));
    let publisher = thread::spawn(move || {
        let (conn, _) = server.accept().expect("publisher should accept");
        drop(conn);
    });

    let notified = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&notified);
    let listener = Listener::builder(config(endpoint, RecordShape::Object))
        .notify(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .spawn()
        .expect("listener should spawn");

    let err = listener.join().expect_err("listener should fail");
    assert!(matches!(
        err,
        ListenerError::Transport(TransportError::Closed)
    ));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(listener.state(), ListenerState::Terminated);
    assert!(listener.stop().is_ok());
    publisher.join().expect("publisher should finish");
}

#[test]
fn stop_is_prompt_and_idempotent_on_idle_stream() {
    let (endpoint, server) = publisher(vec![Vec::new()]);
    let listener = Listener::builder(
        config(endpoint, RecordShape::Object).with_poll_timeout(Duration::from_secs(30)),
    )
    .spawn()
    .expect("listener should spawn");

    wait_for("connection", || listener.stats().connections == 1);
    let start = Instant::now();
    listener.stop().expect("first stop should be clean");
    assert!(start.elapsed() < Duration::from_secs(5));
    listener.stop().expect("second stop should be a no-op");

    assert!(listener.is_finished());
    assert_eq!(listener.state(), ListenerState::Terminated);
    server.join().expect("publisher should finish");
}

#[test]
fn transform_converts_and_discards() {
    let values: Vec<Value> = (1..=6).map(|n| json!({ "n": n })).collect();
    let (endpoint, server) = publisher(vec![object_frames(&values)]);

    let queue = DeliveryQueue::new(8).expect("queue should build");
    let listener = Listener::builder(config(endpoint, RecordShape::Object))
        .transform(|record: Record| {
            let n = record
                .as_object()
                .and_then(|v| v["n"].as_i64())
                .ok_or("record without n")?;
            Ok((n % 3 == 0).then_some(n))
        })
        .queue(queue.clone())
        .spawn()
        .expect("listener should spawn");

    assert_eq!(pop_n(&queue, 2), vec![3, 6]);
    wait_for("all records", || listener.stats().discarded == 4);
    listener.stop().expect("stop should be clean");
    server.join().expect("publisher should finish");
}

#[test]
fn transform_error_without_retry_notifies_then_terminates() {
    let (endpoint, server) = publisher(vec![object_frames(&[json!("unexpected")])]);

    let notified = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&notified);
    let listener = Listener::builder(config(endpoint, RecordShape::Object))
        .transform(|_record: Record| -> Result<Option<u8>, streamsub_listener::BoxError> {
            Err("no handler for record".into())
        })
        .notify(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .spawn()
        .expect("listener should spawn");

    let err = listener.join().expect_err("transform error should end listener");
    assert!(matches!(err, ListenerError::Transform(_)));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    server.join().expect("publisher should finish");
}

#[test]
fn drop_oldest_keeps_the_newest_records() {
    let values: Vec<Value> = (1..=5).map(|n| json!(n)).collect();
    let (endpoint, server) = publisher(vec![object_frames(&values)]);

    let queue = DeliveryQueue::new(2).expect("queue should build");
    let listener = Listener::builder(
        config(endpoint, RecordShape::Object).with_overflow(OverflowPolicy::DropOldest),
    )
    .queue(queue.clone())
    .spawn()
    .expect("listener should spawn");

    wait_for("all records", || listener.stats().delivered == 5);
    listener.stop().expect("stop should be clean");

    assert_eq!(
        queue.drain(),
        vec![Record::Object(json!(4)), Record::Object(json!(5))]
    );
    assert_eq!(listener.stats().evictions, 3);
    server.join().expect("publisher should finish");
}

#[test]
fn full_queue_under_reject_is_fatal() {
    let (endpoint, server) = publisher(vec![object_frames(&[json!(1), json!(2)])]);

    let queue = DeliveryQueue::new(1).expect("queue should build");
    let listener = Listener::builder(config(endpoint, RecordShape::Object))
        .queue(queue.clone())
        .spawn()
        .expect("listener should spawn");

    let err = listener.join().expect_err("overflow should end listener");
    assert!(matches!(err, ListenerError::QueueFull { capacity: 1 }));
    assert_eq!(queue.drain(), vec![Record::Object(json!(1))]);
    server.join().expect("publisher should finish");
}

#[test]
fn log_sink_reports_connection_by_name() {
    let (endpoint, server) = publisher(vec![Vec::new()]);
    let expected_endpoint = endpoint.to_string();

    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&lines);
    let listener = Listener::builder(config(endpoint, RecordShape::Object).with_name("Sensor stream"))
        .log_sink(move |line| sink.lock().push(line.to_string()))
        .spawn()
        .expect("listener should spawn");

    wait_for("connection", || listener.stats().connections == 1);
    listener.stop().expect("stop should be clean");

    let lines = lines.lock();
    assert_eq!(
        lines.first().map(String::as_str),
        Some(format!("Connection made by Sensor stream to {expected_endpoint}.").as_str())
    );
    server.join().expect("publisher should finish");
}
