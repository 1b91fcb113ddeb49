mod common;

use std::time::Duration;

use common::{LineClient, TestServer};

#[tokio::test]
async fn test_shutdown_waits_for_every_session() {
    let server = TestServer::start().await;

    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(LineClient::connect_welcomed(server.tcp_addr).await);
    }
    clients[0].send("/join lobby").await;
    clients[0].expect("현재 멤버").await;
    assert_eq!(server.handle.status().await.unwrap().sessions, 5);

    let report = server
        .handle
        .shutdown(Some(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.remaining, 0);
    assert!(!report.timed_out);

    // Every leave has run by the time shutdown returns
    let status = server.handle.status().await.unwrap();
    assert_eq!(status.sessions, 0);
    assert_eq!(status.rooms, 0);
    assert!(status.stopped);

    for client in &mut clients {
        assert!(client.closed().await);
    }
}

#[tokio::test]
async fn test_connections_rejected_after_shutdown() {
    let server = TestServer::start().await;
    let report = server.handle.shutdown(None).await.unwrap();
    assert_eq!(report.total, 0);

    // The listener still accepts, but the orchestrator refuses admission
    let mut late = LineClient::connect(server.tcp_addr).await;
    assert!(late.next_line().await.is_none());
    assert_eq!(server.handle.status().await.unwrap().sessions, 0);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let server = TestServer::start().await;
    let mut client = LineClient::connect_welcomed(server.tcp_addr).await;

    let first = server.handle.shutdown(None).await.unwrap();
    let second = server.handle.shutdown(None).await.unwrap();

    assert_eq!(first.total, 1);
    assert_eq!(second.total, 1);
    assert_eq!(second.remaining, 0);
    assert!(client.closed().await);
}
