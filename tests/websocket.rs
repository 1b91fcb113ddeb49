mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use cherry_chat::{server, tls, Listener, ServerConfig, Transport};
use common::{LineClient, TestServer, TIMEOUT};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

/// Next text message, or `None` on close / timeout
async fn next_text<S>(ws: &mut WebSocketStream<S>) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match tokio::time::timeout(TIMEOUT, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(text.to_string()),
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) | Err(_) => return None,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

async fn expect<S>(ws: &mut WebSocketStream<S>, needle: &str) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut seen = Vec::new();
    while let Some(text) = next_text(ws).await {
        if text.contains(needle) {
            return text;
        }
        seen.push(text);
    }
    panic!("never received {needle:?}; got {seen:?}");
}

async fn send<S>(ws: &mut WebSocketStream<S>, text: &str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    ws.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn test_ws_welcome_one_message_per_line() {
    let server = TestServer::start().await;
    let mut ws = connect(server.ws_addr).await;

    let mut messages = Vec::new();
    for _ in 0..6 {
        messages.push(next_text(&mut ws).await.expect("welcome message"));
    }

    assert_eq!(messages[0], "Welcome to the CherryRecorder Chat Server!");
    assert!(messages.iter().all(|m| !m.contains('\n')));
    assert!(messages[5].ends_with("님이 입장했습니다."));
}

#[tokio::test]
async fn test_ws_nickname_and_errors() {
    let server = TestServer::start().await;
    let mut ws = connect(server.ws_addr).await;
    expect(&mut ws, "님이 입장했습니다.").await;

    send(&mut ws, "/nick wsuser\r\n").await;
    expect(&mut ws, "닉네임이 'wsuser'(으)로 변경되었습니다.").await;

    send(&mut ws, "/join bad room").await;
    expect(&mut ws, "Error: 방 이름에 공백 문자를 포함할 수 없습니다").await;
}

#[tokio::test]
async fn test_ws_and_line_clients_share_rooms() {
    let server = TestServer::start().await;
    let mut ws = connect(server.ws_addr).await;
    expect(&mut ws, "님이 입장했습니다.").await;
    let mut line = LineClient::connect_welcomed(server.tcp_addr).await;

    send(&mut ws, "/nick W").await;
    expect(&mut ws, "* 닉네임이 'W'").await;
    line.send("/nick L").await;
    line.expect("* 닉네임이 'L'").await;

    send(&mut ws, "/join mixed").await;
    expect(&mut ws, "현재 멤버 (1): W (You)").await;
    line.send("/join mixed").await;
    line.expect("현재 멤버 (2): W, L (You)").await;
    expect(&mut ws, "사용자 'L'님이 방에 들어왔습니다.").await;

    send(&mut ws, "from ws").await;
    line.expect("[W @ mixed]: from ws").await;

    line.send("from line").await;
    expect(&mut ws, "[L @ mixed]: from line").await;
}

#[tokio::test]
async fn test_ws_binary_utf8_is_accepted() {
    let server = TestServer::start().await;
    let mut ws = connect(server.ws_addr).await;
    expect(&mut ws, "님이 입장했습니다.").await;

    ws.send(Message::Binary(b"/nick binary".to_vec().into()))
        .await
        .unwrap();
    expect(&mut ws, "닉네임이 'binary'(으)로 변경되었습니다.").await;
}

#[tokio::test]
async fn test_ws_close_announces_departure() {
    let server = TestServer::start().await;
    let mut ws = connect(server.ws_addr).await;
    expect(&mut ws, "님이 입장했습니다.").await;
    let mut observer = LineClient::connect_welcomed(server.tcp_addr).await;

    send(&mut ws, "/nick closer").await;
    observer.expect("'closer'(으)로 변경되었습니다.").await;

    ws.close(None).await.unwrap();

    observer.expect("* 사용자 'closer'님이 퇴장했습니다.").await;
}

#[tokio::test]
async fn test_ws_oversized_message_ends_session() {
    let server = TestServer::with_config(ServerConfig {
        max_message_size: 64,
        ..ServerConfig::default()
    })
    .await;
    let mut ws = connect(server.ws_addr).await;
    expect(&mut ws, "님이 입장했습니다.").await;

    send(&mut ws, &"x".repeat(1024)).await;

    // The server drops the session instead of replying
    while next_text(&mut ws).await.is_some() {}

    // The leave is processed right after the transport closes
    let drained = tokio::time::timeout(TIMEOUT, async {
        while server.handle.status().await.unwrap().sessions != 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(drained.is_ok());
}

#[tokio::test]
async fn test_wss_welcome_and_nickname() {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("cert.pem");
    let key_path = dir.path().join("key.pem");
    std::fs::write(&cert_path, generated.cert.pem()).unwrap();
    std::fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();

    let acceptor = tls::load_acceptor(&cert_path, &key_path).unwrap();
    let handle = server::spawn(ServerConfig::default(), None);
    let listener = Listener::bind(
        "127.0.0.1:0".parse().unwrap(),
        Transport::SecureWebSocket,
        Some(acceptor),
        handle.clone(),
    )
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = CancellationToken::new();
    tokio::spawn(listener.run(stop.clone()));

    let mut roots = RootCertStore::empty();
    roots.add(generated.cert.der().clone()).unwrap();
    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let tcp = TcpStream::connect(addr).await.unwrap();
    let stream = connector
        .connect(ServerName::try_from("localhost").unwrap(), tcp)
        .await
        .unwrap();
    let (mut ws, _) = tokio_tungstenite::client_async(format!("wss://localhost:{}", addr.port()), stream)
        .await
        .unwrap();

    let first = next_text(&mut ws).await.expect("welcome message");
    assert_eq!(first, "Welcome to the CherryRecorder Chat Server!");
    expect(&mut ws, "님이 입장했습니다.").await;

    send(&mut ws, "/nick secure").await;
    expect(&mut ws, "닉네임이 'secure'(으)로 변경되었습니다.").await;

    let status = handle.status().await.unwrap();
    assert_eq!(status.sessions, 1);
    assert_eq!(status.identified, 1);

    stop.cancel();
}
