use satlink::metrics::TelemetryMetrics;
use satlink::protocol::Payload;
use satlink::status;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_status_endpoints_over_tcp() {
    let metrics = Arc::new(TelemetryMetrics::new().unwrap());
    metrics.record(
        &Payload {
            temperature: 36.5,
            battery: 80.0,
            altitude: 520.0,
            signal: -50.0,
        },
        false,
    );
    metrics.record_dropped();

    let listener = status::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(status::serve(listener, Arc::clone(&metrics)));

    let health = get(addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200 OK"));
    assert!(health.ends_with("healthy"));

    let exposition = get(addr, "/metrics").await;
    assert!(exposition.starts_with("HTTP/1.1 200 OK"));
    assert!(exposition.contains("satellite_temperature_celsius 36.5"));
    assert!(exposition.contains("satellite_packet_count 1"));
    assert!(exposition.contains("satellite_anomaly_count 0"));
    assert!(exposition.contains("satellite_dropped_datagram_count 1"));

    let missing = get(addr, "/nowhere").await;
    assert!(missing.starts_with("HTTP/1.1 404"));

    server.abort();
}

#[tokio::test]
async fn test_oversized_request_line_is_refused() {
    let metrics = Arc::new(TelemetryMetrics::new().unwrap());
    let listener = status::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(status::serve(listener, metrics));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // a single line with no newline, exactly as long as the server will read
    let flood = vec![b'A'; status::MAX_REQUEST_BYTES as usize];
    stream.write_all(&flood).await.unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 431"));

    // the server keeps answering other clients
    assert!(get(addr, "/health").await.ends_with("healthy"));
    server.abort();
}
