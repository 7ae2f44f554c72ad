//! Integration tests for helio-bridge.
//!
//! Exercises the device session, schedule runner, poller, and telemetry sink
//! against a scripted in-process mock light and a local UDP listener, so no
//! hardware is involved.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use helio_bridge::codec::ValueCodec;
use helio_bridge::config::{BridgeConfig, TelemetryConfig};
use helio_bridge::device::{DeviceError, DeviceSession};
use helio_bridge::poller::PollLoop;
use helio_bridge::runner::ScheduleRunner;
use helio_bridge::schedule::ScheduleEntry;
use helio_bridge::telemetry::TelemetrySink;

/// Scripted light: answers `getWl` with `labels`, `getAllRelPower` with
/// `power`, and records every `setWlsRelPower` line it accepts. The first
/// `fail_first` connections reject every command.
async fn spawn_mock_light(
    labels: &str,
    power: &str,
    fail_first: u32,
) -> (String, Arc<Mutex<Vec<String>>>, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock light");
    let address = listener.local_addr().expect("mock light addr").to_string();
    let sets = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicU32::new(0));

    let labels = labels.to_string();
    let power = power.to_string();
    let task_sets = sets.clone();
    let task_connections = connections.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let attempt = task_connections.fetch_add(1, Ordering::SeqCst) + 1;
            let failing = attempt <= fail_first;
            serve_connection(stream, &labels, &power, failing, &task_sets).await;
        }
    });

    (address, sets, connections)
}

async fn serve_connection(
    stream: TcpStream,
    labels: &str,
    power: &str,
    failing: bool,
    sets: &Mutex<Vec<String>>,
) {
    let mut stream = BufReader::new(stream);
    if stream.write_all(b"HelioOS 2.1\r\n> ").await.is_err() {
        return;
    }
    let mut line = String::new();
    loop {
        line.clear();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.trim().to_string();
        let reply = if failing {
            format!("{command}\r\nInvalid command\r\n> ")
        } else if command == "getWl" {
            format!("getWl\r\nOK {labels}\r\n> ")
        } else if command == "getAllRelPower" {
            format!("getAllRelPower\r\nOK {power}\r\n> ")
        } else if command.starts_with("setWlsRelPower") {
            sets.lock().expect("sets lock").push(command.clone());
            format!("{command}\r\nOK\r\n> ")
        } else {
            format!("{command}\r\nInvalid command\r\n> ")
        };
        if stream.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
        let _ = stream.flush().await;
    }
}

fn test_config(address: &str) -> BridgeConfig {
    json5::from_str(&format!(r#"{{ device: {{ address: "{address}" }} }}"#))
        .expect("test config")
}

fn disabled_sink() -> TelemetrySink {
    TelemetrySink::new(&TelemetryConfig {
        enabled: false,
        ..Default::default()
    })
}

fn entry_in(offset_ms: i64, targets: &[f64]) -> ScheduleEntry {
    ScheduleEntry {
        due: Local::now() + chrono::Duration::milliseconds(offset_ms),
        targets: targets.to_vec(),
    }
}

async fn udp_receiver() -> (UdpSocket, String) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind receiver");
    let endpoint = socket.local_addr().expect("receiver addr").to_string();
    (socket, endpoint)
}

async fn recv_line(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 1024];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .expect("recv failed");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Test that a session reads channel labels and decodes power levels.
#[tokio::test]
async fn test_session_reads_labels_and_power() {
    let (address, _, _) = spawn_mock_light("400 420 450", "500 750 250", 0).await;
    let mut session = DeviceSession::open(&address, ValueCodec::new(10.0))
        .await
        .expect("open session");
    let labels = session.wavelengths().await.expect("wavelengths");
    assert_eq!(labels, ["400", "420", "450"]);
    let power = session.relative_power().await.expect("relative power");
    assert_eq!(power, [50.0, 75.0, 25.0]);
}

/// Test that intensities are encoded into the set command.
#[tokio::test]
async fn test_session_encodes_set_command() {
    let (address, sets, _) = spawn_mock_light("400 735", "0 0", 0).await;
    let mut session = DeviceSession::open(&address, ValueCodec::new(10.0))
        .await
        .expect("open session");
    session
        .set_relative_power(&[50.0, 75.0])
        .await
        .expect("set power");
    assert_eq!(*sets.lock().expect("sets lock"), ["setWlsRelPower 500 750"]);
}

/// Test that a rejected command surfaces the device's reply text.
#[tokio::test]
async fn test_failed_command_carries_reply_text() {
    let (address, _, _) = spawn_mock_light("400", "0", 1).await;
    let mut session = DeviceSession::open(&address, ValueCodec::new(10.0))
        .await
        .expect("open session");
    let err = session.wavelengths().await.expect_err("command should fail");
    assert_eq!(err.to_string(), "getWl\r\nInvalid command\r\n>");
}

/// Test that a connection dropped before the prompt is an error.
#[tokio::test]
async fn test_closed_connection_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr").to_string();
    tokio::spawn(async move {
        let _ = listener.accept().await;
    });
    let err = DeviceSession::open(&address, ValueCodec::new(10.0))
        .await
        .expect_err("open should fail");
    assert!(matches!(err, DeviceError::UnexpectedEof));
}

/// Test that the runner applies the most recent past entry once, then walks
/// the remaining entries at their due times.
#[tokio::test]
async fn test_runner_catches_up_then_follows_schedule() {
    let (address, sets, _) = spawn_mock_light("400 735", "500 750", 0).await;
    let entries = vec![
        entry_in(-90_000, &[1.0, 1.0]),
        entry_in(-30_000, &[11.0, 12.0]),
        entry_in(500, &[21.0, 22.0]),
        entry_in(1000, &[31.0, 32.0]),
    ];
    ScheduleRunner::new(&test_config(&address), disabled_sink())
        .run(entries)
        .await;
    assert_eq!(
        *sets.lock().expect("sets lock"),
        [
            "setWlsRelPower 110 120",
            "setWlsRelPower 210 220",
            "setWlsRelPower 310 320",
        ]
    );
}

/// Test that a failed entry is retried on a fresh connection until it lands.
#[tokio::test]
async fn test_runner_retries_failed_entries() {
    let (address, sets, connections) = spawn_mock_light("400", "0", 2).await;
    let entries = vec![entry_in(200, &[50.0])];
    ScheduleRunner::new(&test_config(&address), disabled_sink())
        .run(entries)
        .await;
    assert_eq!(*sets.lock().expect("sets lock"), ["setWlsRelPower 500"]);
    assert_eq!(connections.load(Ordering::SeqCst), 3);
}

/// Test that an entry is abandoned after ten attempts and the run goes on.
#[tokio::test]
async fn test_runner_gives_up_after_ten_attempts() {
    let (address, sets, connections) = spawn_mock_light("400", "0", u32::MAX).await;
    let entries = vec![entry_in(200, &[50.0])];
    ScheduleRunner::new(&test_config(&address), disabled_sink())
        .run(entries)
        .await;
    assert!(sets.lock().expect("sets lock").is_empty());
    assert_eq!(connections.load(Ordering::SeqCst), 10);
}

/// Test that targets beyond the light's channel count are dropped.
#[tokio::test]
async fn test_runner_truncates_to_channel_count() {
    let (address, sets, _) = spawn_mock_light("400 735", "0 0", 0).await;
    let entries = vec![entry_in(200, &[10.0, 20.0, 30.0])];
    ScheduleRunner::new(&test_config(&address), disabled_sink())
        .run(entries)
        .await;
    assert_eq!(*sets.lock().expect("sets lock"), ["setWlsRelPower 100 200"]);
}

/// Test that a schedule with no future entries touches nothing.
#[tokio::test]
async fn test_runner_ignores_fully_past_schedule() {
    let (address, sets, connections) = spawn_mock_light("400", "0", 0).await;
    let entries = vec![entry_in(-60_000, &[50.0])];
    ScheduleRunner::new(&test_config(&address), disabled_sink())
        .run(entries)
        .await;
    assert!(sets.lock().expect("sets lock").is_empty());
    assert_eq!(connections.load(Ordering::SeqCst), 0);
}

/// Test that a telemetry write failure does not fail the schedule entry.
#[tokio::test]
async fn test_telemetry_failure_does_not_fail_entry() {
    let (address, sets, connections) = spawn_mock_light("400", "0", 0).await;
    let sink = TelemetrySink::new(&TelemetryConfig {
        enabled: true,
        endpoint: "127.0.0.1:0".to_string(),
        ..Default::default()
    });
    let entries = vec![entry_in(200, &[50.0])];
    ScheduleRunner::new(&test_config(&address), sink)
        .run(entries)
        .await;
    assert_eq!(*sets.lock().expect("sets lock"), ["setWlsRelPower 500"]);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

/// Test the line-protocol datagram the sink emits.
#[tokio::test]
async fn test_sink_writes_line_protocol() {
    let (socket, endpoint) = udp_receiver().await;
    let sink = TelemetrySink::new(&TelemetryConfig {
        enabled: true,
        endpoint,
        host_tag: Some("chamber-3".to_string()),
        group_tag: Some("nonspc".to_string()),
        user_tag: None,
    });
    let labels = vec!["450".to_string(), "6500".to_string()];
    sink.forward(&labels, &[1.2, 3.4]).await.expect("forward");

    let line = recv_line(&socket).await;
    assert!(
        line.starts_with("helio-light,host=chamber-3,group=nonspc "),
        "{line}"
    );
    assert!(line.contains("450nm=1.2"), "{line}");
    assert!(line.contains("6500k=3.4"), "{line}");
}

/// Test that a zero interval polls exactly once and exits.
#[tokio::test]
async fn test_poll_once_when_interval_is_zero() {
    let (address, _, connections) = spawn_mock_light("450 6500", "12 34", 0).await;
    let (socket, endpoint) = udp_receiver().await;
    let config: BridgeConfig = json5::from_str(&format!(
        r#"{{
        device: {{ address: "{address}" }},
        run: {{ interval_secs: 0 }},
        telemetry: {{ endpoint: "{endpoint}", group_tag: "g1" }},
    }}"#
    ))
    .expect("poll config");
    let sink = TelemetrySink::new(&config.telemetry);
    PollLoop::new(&config, sink).run().await;

    assert_eq!(connections.load(Ordering::SeqCst), 1);
    let line = recv_line(&socket).await;
    assert!(line.starts_with("helio-light,group=g1 "), "{line}");
    assert!(line.contains("450nm=1.2"), "{line}");
    assert!(line.contains("6500k=3.4"), "{line}");
}
