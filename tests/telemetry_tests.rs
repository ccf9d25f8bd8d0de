use dronebus::bus::{Bus, BusError, InProcessBus, Message, Subscription};
use dronebus::commands::Command;
use dronebus::fleet::Fleet;
use dronebus::ops;
use dronebus::subjects::TELEMETRY_PATTERN;
use dronebus::telemetry::{TelemetryPublisher, TelemetrySnapshot};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const RECV_TIMEOUT: Duration = Duration::from_millis(500);

#[tokio::test]
async fn test_one_message_per_drone_per_tick() {
    let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
    let fleet = Arc::new(Fleet::new(3));
    let mut sub = bus.subscribe(TELEMETRY_PATTERN);

    let publisher = TelemetryPublisher::start(Arc::clone(&bus), Arc::clone(&fleet), 100.0);

    // Collect one full sweep.
    let mut seen = HashSet::new();
    while seen.len() < 3 {
        let msg = tokio::time::timeout(RECV_TIMEOUT, sub.rx.recv())
            .await
            .expect("telemetry within timeout")
            .expect("subscription open");
        let snapshot: TelemetrySnapshot = serde_json::from_slice(&msg.payload).unwrap();
        assert_eq!(msg.subject, format!("telemetry.{}", snapshot.id));
        assert!(snapshot.id < 3);
        seen.insert(snapshot.id);
    }

    publisher.stop().await;
}

#[tokio::test]
async fn test_snapshots_reflect_guarded_state() {
    let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
    let fleet = Arc::new(Fleet::new(1));
    ops::apply(&fleet, 0, &Command::Takeoff { altitude: 30.0 }).unwrap();

    let mut sub = bus.subscribe(TELEMETRY_PATTERN);
    let publisher = TelemetryPublisher::start(Arc::clone(&bus), Arc::clone(&fleet), 100.0);

    let msg = tokio::time::timeout(RECV_TIMEOUT, sub.rx.recv())
        .await
        .unwrap()
        .unwrap();
    let snapshot: TelemetrySnapshot = serde_json::from_slice(&msg.payload).unwrap();
    assert_eq!(snapshot.flight_mode, "AltitudeHold");
    assert_eq!(snapshot.throttle, 55.0 * 1.2);

    publisher.stop().await;
}

/// Degenerate rates must not kill the publish loop: a rate whose period
/// would be zero (or out of Duration's range) falls back to the default
/// instead of panicking inside the spawned task.
#[tokio::test]
async fn test_degenerate_rates_fall_back_and_keep_publishing() {
    for hz in [f64::INFINITY, f64::NAN, 0.0, -5.0, 1e300, 1e-300] {
        let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
        let fleet = Arc::new(Fleet::new(1));
        let mut sub = bus.subscribe(TELEMETRY_PATTERN);

        let publisher = TelemetryPublisher::start(Arc::clone(&bus), Arc::clone(&fleet), hz);

        // The fallback interval ticks immediately, so a live loop shows
        // up as a first message well within the timeout.
        let msg = tokio::time::timeout(RECV_TIMEOUT, sub.rx.recv())
            .await
            .unwrap_or_else(|_| panic!("no telemetry published for rate {hz}"))
            .expect("subscription open");
        assert_eq!(msg.subject, "telemetry.0");

        publisher.stop().await;
    }
}

/// A bus that rejects every publish but remembers how many were tried.
struct RejectingBus {
    attempts: AtomicUsize,
}

impl RejectingBus {
    fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

impl Bus for RejectingBus {
    fn publish(&self, _subject: &str, _payload: Vec<u8>) -> Result<(), BusError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(BusError::Closed)
    }

    fn publish_message(&self, msg: Message) -> Result<(), BusError> {
        self.publish(&msg.subject, msg.payload)
    }

    fn subscribe(&self, _pattern: &str) -> Subscription {
        let (_tx, rx) = mpsc::unbounded_channel();
        Subscription { id: 0, rx }
    }

    fn unsubscribe(&self, _id: u64) {}

    fn new_inbox(&self) -> String {
        "_INBOX.0".to_string()
    }

    fn close(&self) {}
}

/// Publish failures are per-drone and non-fatal: the loop keeps ticking
/// through a transport that rejects everything, and stop still completes.
#[tokio::test]
async fn test_publish_failures_never_abort_the_loop() {
    let bus = Arc::new(RejectingBus::new());
    let fleet = Arc::new(Fleet::new(2));

    let publisher = TelemetryPublisher::start(
        Arc::clone(&bus) as Arc<dyn Bus>,
        Arc::clone(&fleet),
        100.0,
    );

    // Three full sweeps of two drones each means the loop survived at
    // least two ticks after its first batch of failures.
    let mut survived = false;
    for _ in 0..100 {
        if bus.attempts.load(Ordering::SeqCst) >= 6 {
            survived = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(survived, "publish loop stopped after failures");

    publisher.stop().await;
    let after_stop = bus.attempts.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(bus.attempts.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn test_stop_halts_publishing() {
    let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
    let fleet = Arc::new(Fleet::new(2));
    let mut sub = bus.subscribe(TELEMETRY_PATTERN);

    let publisher = TelemetryPublisher::start(Arc::clone(&bus), Arc::clone(&fleet), 100.0);

    // Let a few ticks through, then stop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    publisher.stop().await;

    // Drain whatever was published before the stop returned.
    while sub.rx.try_recv().is_ok() {}

    // One tick period later, still nothing new.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(sub.rx.try_recv().is_err());
}

/// Telemetry sweeps running concurrently with command traffic must never
/// produce a torn snapshot: a drone that took off reads either the full
/// pre-takeoff state or the full post-takeoff state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweeps_stay_consistent_under_concurrent_commands() {
    let drone_count = 4;
    let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
    let fleet = Arc::new(Fleet::new(drone_count));
    let mut sub = bus.subscribe(TELEMETRY_PATTERN);

    let publisher = TelemetryPublisher::start(Arc::clone(&bus), Arc::clone(&fleet), 200.0);

    // Hammer distinct drones with alternating takeoff/land while sweeps run.
    let mut writers = Vec::new();
    for id in 0..drone_count {
        let fleet = Arc::clone(&fleet);
        writers.push(tokio::spawn(async move {
            for round in 0..200 {
                let cmd = if round % 2 == 0 {
                    Command::Takeoff { altitude: 25.0 }
                } else {
                    Command::Land
                };
                ops::apply(&fleet, id, &cmd).unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }

    // Every observable state is one of: initial (Manual, throttle 0),
    // post-takeoff (AltitudeHold, 66%), post-land (AltitudeHold, 44%).
    // Anything else would be a torn read.
    let hover = 55.0;
    let mut checked = 0;
    while checked < 100 {
        let msg = tokio::time::timeout(RECV_TIMEOUT, sub.rx.recv())
            .await
            .expect("telemetry within timeout")
            .expect("subscription open");
        let snapshot: TelemetrySnapshot = serde_json::from_slice(&msg.payload).unwrap();
        assert!(snapshot.id < drone_count);
        match snapshot.flight_mode.as_str() {
            "Manual" => assert_eq!(snapshot.throttle, 0.0),
            "AltitudeHold" => {
                assert!(
                    snapshot.throttle == hover * 1.2 || snapshot.throttle == hover * 0.8,
                    "torn throttle {} in mode {}",
                    snapshot.throttle,
                    snapshot.flight_mode
                );
            }
            other => panic!("unexpected mode {other}"),
        }
        checked += 1;
    }

    for writer in writers {
        writer.await.unwrap();
    }
    publisher.stop().await;
}
