//! Command-line and runtime configuration
//!
//! `Cli` is what the binary parses; `ServerConfig` is the plain struct
//! the library and tests work with.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::AppError;

/// Maximum nickname / room name length, in characters
pub const MAX_NAME_LEN: usize = 20;

/// Default per-session outbound queue depth
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default maximum inbound unit size (1 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1 << 20;

/// Default member limit per room
pub const DEFAULT_MAX_ROOM_MEMBERS: usize = 100;

/// Channel buffer size for orchestrator commands
pub const COMMAND_BUFFER: usize = 256;

/// Multi-transport chat server
#[derive(Debug, Parser)]
#[command(name = "cherry_chat", version, about)]
pub struct Cli {
    /// Line-protocol TCP listen address
    #[arg(long, env = "CHAT_TCP_ADDR", default_value = "0.0.0.0:33334")]
    pub tcp_addr: SocketAddr,

    /// WebSocket listen address
    #[arg(long, env = "CHAT_WS_ADDR", default_value = "0.0.0.0:33335")]
    pub ws_addr: SocketAddr,

    /// WebSocket-over-TLS listen address (requires --tls-cert and --tls-key)
    #[arg(long, env = "CHAT_WSS_ADDR")]
    pub wss_addr: Option<SocketAddr>,

    /// PEM certificate chain for the TLS listener
    #[arg(long, env = "CHAT_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for the TLS listener
    #[arg(long, env = "CHAT_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Directory for message history files
    #[arg(long, env = "HISTORY_DIR", default_value = "history")]
    pub history_dir: PathBuf,

    /// Disable message history
    #[arg(long)]
    pub no_history: bool,

    /// Runtime worker threads (defaults to the number of CPUs)
    #[arg(long, env = "CHAT_WORKERS")]
    pub workers: Option<usize>,

    /// Health/status HTTP listen address
    #[arg(long, env = "CHAT_HEALTH_ADDR")]
    pub health_addr: Option<SocketAddr>,

    /// Seconds to wait for sessions to drain on shutdown
    #[arg(long, default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Per-session outbound queue depth
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub max_queue: usize,

    /// Maximum inbound line / message size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Maximum members per room
    #[arg(long, default_value_t = DEFAULT_MAX_ROOM_MEMBERS)]
    pub max_room_members: usize,
}

impl Cli {
    /// Validate limits and build the runtime config
    pub fn server_config(&self) -> Result<ServerConfig, AppError> {
        for (flag, value) in [
            ("--max-queue", self.max_queue),
            ("--max-message-size", self.max_message_size),
            ("--max-room-members", self.max_room_members),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{flag} must be greater than 0")));
            }
        }
        if self.workers == Some(0) {
            return Err(AppError::Config("--workers must be greater than 0".into()));
        }

        Ok(ServerConfig {
            outbound_queue_capacity: self.max_queue,
            max_message_size: self.max_message_size,
            max_room_members: self.max_room_members,
            ..ServerConfig::default()
        })
    }

    /// Certificate and key paths, when the TLS listener is enabled
    pub fn tls_paths(&self) -> Result<Option<(PathBuf, PathBuf)>, AppError> {
        if self.wss_addr.is_none() {
            return Ok(None);
        }
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Ok(Some((cert.clone(), key.clone()))),
            _ => Err(AppError::Config(
                "--wss-addr requires both --tls-cert and --tls-key".into(),
            )),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// History directory, unless history is disabled
    pub fn history_root(&self) -> Option<PathBuf> {
        (!self.no_history).then(|| self.history_dir.clone())
    }
}

/// Limits used by the orchestrator and sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub max_name_len: usize,
    pub max_room_members: usize,
    pub outbound_queue_capacity: usize,
    pub max_message_size: usize,
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_name_len: MAX_NAME_LEN,
            max_room_members: DEFAULT_MAX_ROOM_MEMBERS,
            outbound_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            command_buffer: COMMAND_BUFFER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["cherry_chat"]).unwrap();

        assert_eq!(cli.tcp_addr, "0.0.0.0:33334".parse().unwrap());
        assert_eq!(cli.ws_addr, "0.0.0.0:33335".parse().unwrap());
        assert!(cli.wss_addr.is_none());
        assert_eq!(cli.history_root(), Some(PathBuf::from("history")));
        assert_eq!(cli.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(cli.server_config().unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_no_history() {
        let cli = Cli::try_parse_from(["cherry_chat", "--no-history"]).unwrap();
        assert!(cli.history_root().is_none());
    }

    #[test]
    fn test_wss_requires_tls_material() {
        let cli = Cli::try_parse_from(["cherry_chat", "--wss-addr", "127.0.0.1:33336"]).unwrap();
        assert!(matches!(cli.tls_paths(), Err(AppError::Config(_))));

        let cli = Cli::try_parse_from([
            "cherry_chat",
            "--wss-addr",
            "127.0.0.1:33336",
            "--tls-cert",
            "cert.pem",
            "--tls-key",
            "key.pem",
        ])
        .unwrap();
        assert_eq!(
            cli.tls_paths().unwrap(),
            Some((PathBuf::from("cert.pem"), PathBuf::from("key.pem")))
        );
    }

    #[test]
    fn test_zero_limits_rejected() {
        let cli = Cli::try_parse_from(["cherry_chat", "--max-queue", "0"]).unwrap();
        assert!(matches!(cli.server_config(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_custom_limits() {
        let cli = Cli::try_parse_from(["cherry_chat", "--max-room-members", "2", "--max-queue", "8"])
            .unwrap();
        let config = cli.server_config().unwrap();

        assert_eq!(config.max_room_members, 2);
        assert_eq!(config.outbound_queue_capacity, 8);
        assert_eq!(config.max_name_len, MAX_NAME_LEN);
    }
}
