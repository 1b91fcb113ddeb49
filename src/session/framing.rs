//! Transport framing
//!
//! Maps a transport's native unit (a line, a WebSocket message) to and
//! from chat text. Line TCP uses `LinesCodec`; both WebSocket variants
//! share `WsFraming` since TLS sits below the WebSocket layer.

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::codec::{LinesCodec, LinesCodecError};

use crate::error::AppError;

/// One decoded inbound unit
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Text to parse as a command or chat payload
    Text(String),
    /// Control traffic with no chat meaning
    Skip,
    /// The peer asked to close
    Close,
}

/// Per-transport unit conversion
pub trait Framing: Send + 'static {
    type Frame: Send + Unpin + 'static;
    type Error: Into<AppError> + std::fmt::Display + Send + 'static;

    fn decode(frame: Self::Frame) -> Inbound;

    fn encode(text: String) -> Self::Frame;
}

/// Newline-delimited UTF-8 text
pub struct LineFraming;

impl LineFraming {
    /// Codec capped at `max_len` bytes per line
    pub fn codec(max_len: usize) -> LinesCodec {
        LinesCodec::new_with_max_length(max_len)
    }
}

impl Framing for LineFraming {
    type Frame = String;
    type Error = LinesCodecError;

    fn decode(frame: String) -> Inbound {
        // LinesCodec already strips "\n" and a trailing "\r"
        Inbound::Text(frame)
    }

    fn encode(text: String) -> String {
        text
    }
}

/// One chat unit per WebSocket message
pub struct WsFraming;

impl WsFraming {
    /// Handshake config enforcing the maximum message size
    pub fn config(max_message_size: usize) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(max_message_size);
        config.max_frame_size = Some(max_message_size);
        config
    }
}

impl Framing for WsFraming {
    type Frame = Message;
    type Error = tokio_tungstenite::tungstenite::Error;

    fn decode(frame: Message) -> Inbound {
        match frame {
            Message::Text(text) => Inbound::Text(text.trim_end_matches(['\r', '\n']).to_string()),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => Inbound::Text(text.trim_end_matches(['\r', '\n']).to_string()),
                Err(_) => Inbound::Skip,
            },
            Message::Close(_) => Inbound::Close,
            // Pong is answered by tungstenite itself
            _ => Inbound::Skip,
        }
    }

    fn encode(text: String) -> Message {
        Message::Text(text.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_text_strips_line_ending() {
        assert_eq!(
            WsFraming::decode(Message::Text("/nick bob\r\n".into())),
            Inbound::Text("/nick bob".to_string())
        );
    }

    #[test]
    fn test_ws_binary_must_be_utf8() {
        assert_eq!(
            WsFraming::decode(Message::Binary(b"hello".to_vec().into())),
            Inbound::Text("hello".to_string())
        );
        assert_eq!(
            WsFraming::decode(Message::Binary(vec![0xff, 0xfe].into())),
            Inbound::Skip
        );
    }

    #[test]
    fn test_ws_control_frames() {
        assert_eq!(WsFraming::decode(Message::Ping(vec![1].into())), Inbound::Skip);
        assert_eq!(WsFraming::decode(Message::Close(None)), Inbound::Close);
    }

    #[test]
    fn test_ws_config_limits() {
        let config = WsFraming::config(1024);
        assert_eq!(config.max_message_size, Some(1024));
        assert_eq!(config.max_frame_size, Some(1024));
    }
}
