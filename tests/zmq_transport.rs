//! ZeroMQ round trip over loopback TCP.

use std::sync::Arc;
use std::time::{Duration, Instant};
use streamplt::{DataListener, ListenerConfig, ListenerState, Record, StreamError, ZmqTransport};
use zeromq::{PubSocket, Socket, SocketSend, ZmqMessage};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn receives_records_from_zmq_publisher() {
    let mut publisher = PubSocket::new();
    let endpoint = publisher
        .bind("tcp://127.0.0.1:0")
        .await
        .expect("bind publisher");

    let config = ListenerConfig::new(endpoint.to_string())
        .with_buffer_width(2)
        .with_buffer_length(10);
    let listener = Arc::new(DataListener::new(ZmqTransport::new(), config).unwrap());

    let starter = Arc::clone(&listener);
    tokio::task::spawn_blocking(move || starter.start())
        .await
        .unwrap()
        .expect("listener connects");

    // The subscription reaches the publisher asynchronously, so keep sending
    // until the first record lands.
    let deadline = Instant::now() + Duration::from_secs(10);
    while listener.is_empty() && Instant::now() < deadline {
        publisher
            .send(ZmqMessage::from("1.5, 2.5".to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(listener.latest(), Some(Record::from([1.5, 2.5])));

    publisher
        .send(ZmqMessage::from("garbage".to_string()))
        .await
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while listener.stats().invalid_data == 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(listener.stats().invalid_data, 1);
    assert!(listener.is_running());

    let stopper = Arc::clone(&listener);
    tokio::task::spawn_blocking(move || stopper.stop())
        .await
        .unwrap();
    assert!(!listener.is_running());
}

#[test]
fn malformed_endpoint_fails_start() {
    let config = ListenerConfig::new("definitely not an endpoint").with_buffer_width(2);
    let listener = DataListener::new(ZmqTransport::new(), config).unwrap();

    assert!(matches!(
        listener.start(),
        Err(StreamError::Connection { .. })
    ));
    assert!(!listener.is_running());
}

#[test]
fn unreachable_endpoint_fails_start_within_timeout() {
    let port = {
        let socket = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        socket.local_addr().unwrap().port()
    };
    let config = ListenerConfig::new(format!("tcp://127.0.0.1:{port}"))
        .with_connect_timeout(Duration::from_millis(500));
    let listener = Arc::new(DataListener::new(ZmqTransport::new(), config).unwrap());

    let starter = Arc::clone(&listener);
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = done_tx.send(starter.start());
    });

    let outcome = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("start blocked on an unreachable endpoint");
    match outcome {
        Err(StreamError::Connection { address, .. }) => {
            assert_eq!(address, format!("tcp://127.0.0.1:{port}"));
        }
        other => panic!("expected a connection error, got {other:?}"),
    }
    assert_eq!(listener.state(), ListenerState::Idle);
}
