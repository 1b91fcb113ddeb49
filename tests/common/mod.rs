#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use cherry_chat::{server, Listener, MessageHistory, ServerConfig, ServerHandle, Transport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

pub const TIMEOUT: Duration = Duration::from_secs(3);

/// A running server with one listener per plain transport
pub struct TestServer {
    pub handle: ServerHandle,
    pub tcp_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub stop: CancellationToken,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_config(ServerConfig::default()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        Self::build(config, None).await
    }

    pub async fn with_history(history: MessageHistory) -> Self {
        Self::build(ServerConfig::default(), Some(history)).await
    }

    async fn build(config: ServerConfig, history: Option<MessageHistory>) -> Self {
        let handle = server::spawn(config, history);
        let stop = CancellationToken::new();
        let localhost: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let tcp = Listener::bind(localhost, Transport::Line, None, handle.clone())
            .await
            .unwrap();
        let ws = Listener::bind(localhost, Transport::WebSocket, None, handle.clone())
            .await
            .unwrap();
        let tcp_addr = tcp.local_addr().unwrap();
        let ws_addr = ws.local_addr().unwrap();
        tokio::spawn(tcp.run(stop.clone()));
        tokio::spawn(ws.run(stop.clone()));

        Self {
            handle,
            tcp_addr,
            ws_addr,
            stop,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Line-protocol test client
pub struct LineClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl LineClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Connect and consume the welcome sequence including the own arrival notice
    pub async fn connect_welcomed(addr: SocketAddr) -> Self {
        let mut client = Self::connect(addr).await;
        client.expect("님이 입장했습니다.").await;
        client
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    /// Next line, or `None` on EOF / timeout
    pub async fn next_line(&mut self) -> Option<String> {
        match tokio::time::timeout(TIMEOUT, self.lines.next_line()).await {
            Ok(Ok(line)) => line,
            _ => None,
        }
    }

    /// Read lines until one contains `needle`; returns every line read
    pub async fn read_until(&mut self, needle: &str) -> Vec<String> {
        let mut seen = Vec::new();
        loop {
            match self.next_line().await {
                Some(line) => {
                    let done = line.contains(needle);
                    seen.push(line);
                    if done {
                        return seen;
                    }
                }
                None => panic!("never received {needle:?}; got {seen:?}"),
            }
        }
    }

    /// Read until a line containing `needle` and return it
    pub async fn expect(&mut self, needle: &str) -> String {
        self.read_until(needle).await.pop().unwrap()
    }

    /// True once the server has closed the connection
    pub async fn closed(&mut self) -> bool {
        loop {
            match tokio::time::timeout(TIMEOUT, self.lines.next_line()).await {
                Ok(Ok(Some(_))) => continue,
                Ok(Ok(None)) | Ok(Err(_)) => return true,
                Err(_) => return false,
            }
        }
    }
}
