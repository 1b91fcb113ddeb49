//! Multi-transport chat server library
//!
//! Clients connect over newline-delimited TCP, WebSocket, or WebSocket
//! over TLS, and talk through global chat or named rooms using one
//! shared command vocabulary (`/nick`, `/join`, `/leave`, `/users`,
//! `/pm`, `/history`, `/help`, `/quit`).
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `server::ChatServer` is the central actor owning the session set,
//!   the nickname index and the room map
//! - each connection runs one task (`handler::run_session`) that owns
//!   its transport and talks to the actor through a `ServerHandle`
//! - sessions are shared as `Arc<dyn Session>`; only the session set
//!   holds strong references, rooms and the nickname index hold `Weak`s
//! - shutdown stops every session and waits on a countdown barrier
//!   until each one has left
//!
//! # Example
//! ```ignore
//! use cherry_chat::{server, Listener, ServerConfig, Transport};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = server::spawn(ServerConfig::default(), None);
//!     let addr = "127.0.0.1:33334".parse().unwrap();
//!     let listener = Listener::bind(addr, Transport::Line, None, handle.clone())
//!         .await
//!         .unwrap();
//!
//!     let stop = CancellationToken::new();
//!     tokio::spawn(listener.run(stop.clone()));
//!
//!     tokio::signal::ctrl_c().await.unwrap();
//!     stop.cancel();
//!     handle.shutdown(None).await.unwrap();
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod health;
pub mod history;
pub mod listener;
pub mod message;
pub mod room;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod tls;
pub mod types;

// Re-export main types for convenience
pub use command::ClientCommand;
pub use config::{Cli, ServerConfig};
pub use error::{AppError, SendError};
pub use history::MessageHistory;
pub use listener::Listener;
pub use message::ServerMessage;
pub use room::Room;
pub use server::{ChatServer, ServerCommand, ServerHandle, ServerStatus};
pub use session::{Session, SessionHandle};
pub use shutdown::ShutdownReport;
pub use types::{SessionId, Transport};
