//! Transport listeners
//!
//! One `Listener` per transport. Each accepted connection is handshaken
//! in its own task, wrapped in a `SessionHandle`, admitted through the
//! orchestrator and then driven by `handler::run_session`.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::handler::run_session;
use crate::server::ServerHandle;
use crate::session::framing::{Framing, LineFraming, WsFraming};
use crate::session::{Session, SessionHandle};
use crate::types::Transport;

/// Accept loop for one transport
pub struct Listener {
    listener: TcpListener,
    transport: Transport,
    tls: Option<TlsAcceptor>,
    server: ServerHandle,
}

impl Listener {
    /// Bind `addr` for `transport`.
    ///
    /// `SecureWebSocket` requires a TLS acceptor.
    pub async fn bind(
        addr: SocketAddr,
        transport: Transport,
        tls: Option<TlsAcceptor>,
        server: ServerHandle,
    ) -> Result<Self, AppError> {
        if transport == Transport::SecureWebSocket && tls.is_none() {
            return Err(AppError::Config(
                "secure WebSocket listener needs TLS credentials".into(),
            ));
        }
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            transport,
            tls,
            server,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let transport = self.transport;
        match self.listener.local_addr() {
            Ok(addr) => info!("{} listener on {}", transport, addr),
            Err(e) => warn!("{} listener address unavailable: {}", transport, e),
        }

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    debug!("New {} connection from {}", transport, addr);
                    let server = self.server.clone();
                    let tls = self.tls.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, transport, tls, server).await {
                            warn!("{} connection from {} failed: {}", transport, addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept {} connection: {}", transport, e);
                }
            }
        }

        info!("{} listener stopped", transport);
    }
}

/// Handshake one connection and drive its session
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    transport: Transport,
    tls: Option<TlsAcceptor>,
    server: ServerHandle,
) -> Result<(), AppError> {
    let max_message_size = server.config().max_message_size;

    match transport {
        Transport::Line => {
            let framed = Framed::new(stream, LineFraming::codec(max_message_size));
            start::<LineFraming, _>(framed, addr, transport, server).await
        }
        Transport::WebSocket => {
            let ws = tokio_tungstenite::accept_async_with_config(
                stream,
                Some(WsFraming::config(max_message_size)),
            )
            .await?;
            start::<WsFraming, _>(ws, addr, transport, server).await
        }
        Transport::SecureWebSocket => {
            let acceptor = tls.ok_or_else(|| AppError::Tls("no TLS acceptor".into()))?;
            let tls_stream = acceptor.accept(stream).await?;
            let ws = tokio_tungstenite::accept_async_with_config(
                tls_stream,
                Some(WsFraming::config(max_message_size)),
            )
            .await?;
            start::<WsFraming, _>(ws, addr, transport, server).await
        }
    }
}

/// Create the session, admit it, and run it to completion
async fn start<F, T>(
    framed: T,
    addr: SocketAddr,
    transport: Transport,
    server: ServerHandle,
) -> Result<(), AppError>
where
    F: Framing,
    T: futures_util::Stream<Item = Result<F::Frame, F::Error>>
        + futures_util::Sink<F::Frame, Error = F::Error>
        + Send
        + Unpin,
{
    let (session, outbox) = SessionHandle::new(
        addr.to_string(),
        transport,
        server.config().outbound_queue_capacity,
    );

    server.join(Arc::clone(&session) as Arc<dyn Session>).await?;
    info!(session = %session.id(), peer = %addr, "{} session started", transport);

    run_session::<F, T>(framed, session, outbox, server).await;
    Ok(())
}
