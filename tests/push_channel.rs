//! Push channel against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio_tungstenite::tungstenite::Message;

use fatigue_dashboard::config::BackendConfig;
use fatigue_dashboard::frames::{FrameSink, OutboundFrame};
use fatigue_dashboard::push::push_channel;
use fatigue_dashboard::telemetry::{lock, new_shared_reconciler, SharedReconciler};

const POLL_BODY: &str = r#"{
    "sensor": {"temperature": 36.6, "hr": 70, "spo2": 98},
    "perclos": {"status": "Open", "perclos": 10.0},
    "head_position": {"angle_x": 0, "angle_y": 0, "angle_z": 0, "calibrated": true},
    "prediction": {"status": "Alert", "confidence": 0.8},
    "system_status": "Active"
}"#;

fn config(port: u16) -> BackendConfig {
    BackendConfig {
        push_url: format!("ws://127.0.0.1:{port}/ws"),
        request_timeout_ms: 1_000,
        push_reconnect_ms: 50,
        ..BackendConfig::default()
    }
}

fn primed_reconciler() -> SharedReconciler {
    let reconciler = new_shared_reconciler(20);
    lock(&reconciler).apply_poll_message(POLL_BODY);
    reconciler
}

async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn inbound_updates_merge_and_frames_flow_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let reconciler = primed_reconciler();

    let (channel, handle) = push_channel(&config(port), Arc::clone(&reconciler));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(channel.run(shutdown_rx));

    let (stream, _) = listener.accept().await.unwrap();
    let mut server = tokio_tungstenite::accept_async(stream).await.unwrap();

    assert!(wait_for(|| handle.is_open()).await, "channel never opened");
    assert!(lock(&reconciler).health().push_ok);

    // Inbound partial update.
    server
        .send(Message::text(
            r#"{"head_pose": {"pitch": 25.0, "yaw": -15.0}, "perclos": {"perclos": 55.0}}"#,
        ))
        .await
        .unwrap();
    assert!(
        wait_for(|| lock(&reconciler).current().perclos == Some(55.0)).await,
        "push update never merged"
    );
    let snap = lock(&reconciler).current();
    assert_eq!(snap.head_pose.angle_x, 25.0);
    assert_eq!(snap.head_pose.position_label, "Down Left");
    assert_eq!(snap.heart_rate, Some(70.0));

    // A malformed message is dropped without closing the channel.
    server.send(Message::text("{not json")).await.unwrap();

    // Outbound frame; its permit comes back once written.
    let slots = Arc::new(Semaphore::new(1));
    let frame = OutboundFrame {
        message: r#"{"image_data":"data:image/jpeg;base64,AAAA"}"#.into(),
        permit: Arc::clone(&slots).try_acquire_owned().unwrap(),
    };
    assert!(handle.submit(frame));

    let received = tokio::time::timeout(Duration::from_secs(2), server.next())
        .await
        .expect("no frame received")
        .unwrap()
        .unwrap();
    match received {
        Message::Text(text) => assert!(text.contains("image_data")),
        other => panic!("unexpected message {other:?}"),
    }
    assert!(wait_for(|| slots.available_permits() == 1).await);
    assert!(handle.is_open());

    // Teardown closes the socket.
    shutdown_tx.send(true).unwrap();
    let closing = tokio::time::timeout(Duration::from_secs(2), server.next())
        .await
        .expect("server saw nothing on shutdown");
    assert!(matches!(closing, Some(Ok(Message::Close(_))) | None | Some(Err(_))));

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("push task did not stop")
        .unwrap();
    assert!(!handle.is_open());
    assert!(!lock(&reconciler).health().push_ok);
}

#[tokio::test]
async fn dropped_connection_is_redialed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let reconciler = primed_reconciler();

    let (channel, handle) = push_channel(&config(port), Arc::clone(&reconciler));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(channel.run(shutdown_rx));

    let (stream, _) = listener.accept().await.unwrap();
    let mut first = tokio_tungstenite::accept_async(stream).await.unwrap();
    assert!(wait_for(|| handle.is_open()).await);
    first.close(None).await.unwrap();
    drop(first);

    let (stream, _) = tokio::time::timeout(Duration::from_secs(2), listener.accept())
        .await
        .expect("channel did not redial")
        .unwrap();
    let mut second = tokio_tungstenite::accept_async(stream).await.unwrap();
    assert!(wait_for(|| handle.is_open()).await);

    second
        .send(Message::text(r#"{"perclos": {"perclos": 42.0}}"#))
        .await
        .unwrap();
    assert!(wait_for(|| lock(&reconciler).current().perclos == Some(42.0)).await);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("push task did not stop")
        .unwrap();
}
