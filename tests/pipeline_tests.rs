use async_trait::async_trait;
use satlink::classifier::is_anomalous;
use satlink::config::GeneratorConfig;
use satlink::generator::{within_nominal_bands, AnomalyArchetype, PayloadGenerator, LOW_BATTERY};
use satlink::metrics::TelemetryMetrics;
use satlink::processor::PacketProcessor;
use satlink::protocol::{decode, Payload, SequenceCounter, PACKET_SIZE};
use satlink::storage::{MemoryStore, StorageError, TelemetryRecord, TelemetryStore};
use satlink::transport::{IngestPipeline, PipelineSettings, TelemetrySender, TransportError};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;

fn loopback() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
}

async fn sender_for(pipeline: &IngestPipeline) -> TelemetrySender {
    let config = GeneratorConfig {
        target: pipeline.local_addr().unwrap().to_string(),
        ..GeneratorConfig::default()
    };
    TelemetrySender::connect(&config).await.unwrap()
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

async fn wait_for_rows(store: &MemoryStore, rows: usize) {
    for _ in 0..200 {
        if store.len().await >= rows {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("store never reached {} rows", rows);
}

#[tokio::test]
async fn test_low_battery_packet_end_to_end() {
    let metrics = Arc::new(TelemetryMetrics::new().unwrap());
    let store = Arc::new(MemoryStore::new());
    let processor = PacketProcessor::new(Arc::clone(&metrics), store.clone());

    let pipeline = IngestPipeline::start(loopback(), PipelineSettings::default(), processor)
        .await
        .unwrap();
    let sender = sender_for(&pipeline).await;
    tokio::spawn(pipeline.run());

    let payload = PayloadGenerator::with_seed(11).payload_for(AnomalyArchetype::LowBattery);
    sender.send_packet(5, 1_700_000_005, &payload).await.unwrap();

    wait_for_rows(&store, 1).await;

    let row = store.records().await[0];
    assert!(row.battery >= LOW_BATTERY.min && row.battery < LOW_BATTERY.max);
    assert!(!within_nominal_bands(&payload));
    assert_eq!(row.packet_id, 0x0801);
    assert_eq!(row.packet_seq_ctrl, 0xC005);
    assert_eq!(row.timestamp, 1_700_000_005);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.packets, 1);
    // a battery in [20, 40) sits inside the inclusive [20, 100] limit
    assert_eq!(snapshot.anomalies, u64::from(is_anomalous(&payload)));
    assert!((snapshot.battery - f64::from(payload.battery)).abs() < 1e-6);
}

#[tokio::test]
async fn test_depleted_battery_counts_as_anomaly() {
    let metrics = Arc::new(TelemetryMetrics::new().unwrap());
    let store = Arc::new(MemoryStore::new());
    let processor = PacketProcessor::new(Arc::clone(&metrics), store.clone());

    let pipeline = IngestPipeline::start(loopback(), PipelineSettings::default(), processor)
        .await
        .unwrap();
    let sender = sender_for(&pipeline).await;
    tokio::spawn(pipeline.run());

    let depleted = Payload {
        temperature: 25.0,
        battery: 12.5,
        altitude: 520.0,
        signal: -50.0,
    };
    sender.send_packet(10, 1, &depleted).await.unwrap();

    wait_for_rows(&store, 1).await;
    assert_eq!(metrics.snapshot().anomalies, 1);
}

#[tokio::test]
async fn test_generated_stream_is_ingested_in_full() {
    let metrics = Arc::new(TelemetryMetrics::new().unwrap());
    let store = Arc::new(MemoryStore::new());
    let processor = PacketProcessor::new(Arc::clone(&metrics), store.clone());

    let settings = PipelineSettings { workers: 4, queue_depth: 64 };
    let pipeline = IngestPipeline::start(loopback(), settings, processor).await.unwrap();
    assert_eq!(pipeline.worker_count(), 4);
    let mut sender = sender_for(&pipeline)
        .await
        .with_generator(PayloadGenerator::with_seed(3))
        .with_sequence(SequenceCounter::new());
    tokio::spawn(pipeline.run());

    let mut sent = Vec::new();
    for _ in 0..20 {
        sent.push(sender.send_next().await.unwrap());
    }
    assert_eq!(sent[0].sequence_count, 0);
    assert_eq!(sent[19].sequence_count, 19);

    wait_for_rows(&store, 20).await;

    // workers may finish out of order
    let mut counts: Vec<u16> = store
        .records()
        .await
        .iter()
        .map(|row| row.packet_seq_ctrl & 0x3FFF)
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, (0..20).collect::<Vec<u16>>());

    let expected_anomalies = sent.iter().filter(|p| is_anomalous(&p.payload)).count() as u64;
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.packets, 20);
    assert_eq!(snapshot.anomalies, expected_anomalies);
    assert_eq!(snapshot.dropped_datagrams, 0);
}

/// Blocks every append until the test hands out permits.
struct GatedStore {
    gate: Semaphore,
    appended: AtomicUsize,
}

#[async_trait]
impl TelemetryStore for GatedStore {
    async fn append(&self, _record: &TelemetryRecord) -> Result<(), StorageError> {
        let permit = self.gate.acquire().await.map_err(|_| StorageError::Unavailable)?;
        permit.forget();
        self.appended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_full_queue_drops_and_counts() {
    let metrics = Arc::new(TelemetryMetrics::new().unwrap());
    let store = Arc::new(GatedStore {
        gate: Semaphore::new(0),
        appended: AtomicUsize::new(0),
    });
    let processor = PacketProcessor::new(Arc::clone(&metrics), store.clone());

    let settings = PipelineSettings { workers: 1, queue_depth: 1 };
    let pipeline = IngestPipeline::start(loopback(), settings, processor).await.unwrap();
    let sender = sender_for(&pipeline).await;
    tokio::spawn(pipeline.run());

    let payload = Payload {
        temperature: 25.0,
        battery: 80.0,
        altitude: 520.0,
        signal: -50.0,
    };
    let total = 10usize;
    for seq in 0..total {
        sender.send_packet(seq as u16, 1, &payload).await.unwrap();
    }

    // at most one datagram in the worker and one in the queue
    wait_until(|| metrics.snapshot().dropped_datagrams as usize >= total - 2).await;

    store.gate.add_permits(total);
    wait_until(|| {
        store.appended.load(Ordering::SeqCst) + metrics.snapshot().dropped_datagrams as usize == total
    })
    .await;

    let accepted = store.appended.load(Ordering::SeqCst);
    assert!(accepted >= 1);
    assert_eq!(metrics.snapshot().packets as usize, accepted);
}

async fn vacant_target() -> SocketAddr {
    let socket = UdpSocket::bind(loopback()).await.unwrap();
    socket.local_addr().unwrap()
}

async fn sender_to(target: SocketAddr) -> TelemetrySender {
    let config = GeneratorConfig {
        target: target.to_string(),
        ..GeneratorConfig::default()
    };
    TelemetrySender::connect(&config).await.unwrap()
}

#[tokio::test]
async fn test_send_to_closed_port_reports_send_error() {
    let sender = sender_to(vacant_target().await).await;
    let payload = Payload {
        temperature: 25.0,
        battery: 80.0,
        altitude: 520.0,
        signal: -50.0,
    };

    // the refusal surfaces on the send after the one that provoked it
    let mut outcome = Ok(());
    for seq in 0..5 {
        outcome = sender.send_packet(seq, 1, &payload).await;
        if outcome.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(matches!(outcome, Err(TransportError::Send(_))));
}

#[tokio::test]
async fn test_sender_backs_off_and_resumes() {
    let target = vacant_target().await;
    let sender = sender_to(target).await;
    let ticking = tokio::spawn(sender.run(Duration::from_millis(20), Duration::from_millis(100)));

    tokio::time::sleep(Duration::from_millis(300)).await;
    let listener = UdpSocket::bind(target).await.unwrap();

    let mut buffer = [0u8; 64];
    let mut counts = Vec::new();
    for _ in 0..2 {
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), listener.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(len, PACKET_SIZE);
        counts.push(decode(&buffer[..len]).unwrap().primary.sequence_count());
    }
    ticking.abort();

    // counts spent while nobody listened are never sent again
    assert!(counts[0] >= 2, "first delivered count was {}", counts[0]);
    assert!(counts[1] > counts[0]);
}

#[tokio::test]
async fn test_sender_resumes_right_after_backoff() {
    let period = Duration::from_millis(200);
    let backoff = Duration::from_millis(600);
    let target = vacant_target().await;
    let sender = sender_to(target).await;

    // #0 goes out at once and is refused; #1 fails at ~200 ms and starts the back-off
    let started = tokio::time::Instant::now();
    let ticking = tokio::spawn(sender.run(period, backoff));
    tokio::time::sleep(Duration::from_millis(350)).await;
    let listener = UdpSocket::bind(target).await.unwrap();

    let mut buffer = [0u8; 64];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), listener.recv_from(&mut buffer))
        .await
        .unwrap()
        .unwrap();
    let elapsed = started.elapsed();
    ticking.abort();

    assert_eq!(decode(&buffer[..len]).unwrap().primary.sequence_count(), 2);
    // failure at ~200 ms plus 600 ms back-off; an extra period would push this to ~1 s
    assert!(elapsed < Duration::from_millis(950), "resumed after {:?}", elapsed);
}
