//! Server → client message vocabulary
//!
//! Every line the server emits is a `ServerMessage`. Its `Display`
//! impl produces the exact wire text, which is shared by all three
//! transports (one line per message over TCP, one text frame per
//! message over WebSocket).

use std::fmt;

use crate::error::AppError;
use crate::types::{NameError, NameKind};

/// Lines of the `/help` block, between the delimiters
pub const HELP_LINES: [&str; 7] = [
    "/nick <닉네임> - 닉네임 변경",
    "/join <방이름> - 방 입장/생성",
    "/leave - 현재 방 퇴장",
    "/users - 현재 접속자 목록 보기",
    "/pm <닉네임> <메시지> - 개인 메시지",
    "/history [개수] - 최근 대화 기록 보기",
    "/quit - 채팅 종료",
];

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// First line of the welcome sequence
    Banner,
    /// Temporary identity assigned on connect
    TemporaryId { id: String },
    /// Welcome hint: set a nickname
    NicknameHint,
    /// Welcome hint: /help
    HelpHint,
    /// Welcome hint: /join
    JoinHint,
    /// Global arrival notice
    Arrived { name: String },
    /// Global departure notice
    Departed { name: String },
    /// Confirmation to the session that changed its nickname
    NicknameChanged { nickname: String },
    /// Nickname change announced to everyone else
    NicknameAnnounced { old: String, new: String },
    /// Confirmation of a room join
    RoomJoined { room: String },
    /// Room roster sent to a joiner; entries are already decorated
    RoomRoster { members: Vec<String> },
    /// Already in the requested room
    AlreadyHere { room: String },
    /// Another member entered the room
    MemberJoined { name: String },
    /// Confirmation of leaving a room
    RoomLeft { room: String },
    /// Another member left the room
    MemberLeft { name: String, room: String },
    /// Chat inside a room
    RoomChat { from: String, room: String, body: String },
    /// Global chat
    Chat { from: String, body: String },
    /// Private message, receiver side
    PrivateFrom { from: String, body: String },
    /// Private message, sender confirmation
    PrivateSent { to: String, body: String },
    /// Header of the /users listing
    UserListHeader { count: usize },
    /// One /users entry
    UserEntry { name: String, is_self: bool },
    /// `--- 도움말 ---`
    HelpBegin,
    /// One line of help text
    HelpLine(&'static str),
    /// `-------------`
    HelpEnd,
    /// Header of a /history listing
    HistoryHeader { scope: String, count: usize },
    /// One stored history line
    HistoryLine(String),
    /// Reply to /quit before the connection closes
    Goodbye,
    /// Wrong arguments for a command
    Usage(&'static str),
    /// Leading `/` token that is not a command
    UnknownCommand(String),
    /// Validation/state error text (already prefixed)
    Error(String),
}

impl ServerMessage {
    /// Messages sent to a session right after it is admitted
    pub fn welcome(remote_id: &str) -> Vec<ServerMessage> {
        vec![
            ServerMessage::Banner,
            ServerMessage::TemporaryId {
                id: remote_id.to_string(),
            },
            ServerMessage::NicknameHint,
            ServerMessage::HelpHint,
            ServerMessage::JoinHint,
        ]
    }

    /// The full /help block
    pub fn help() -> Vec<ServerMessage> {
        let mut lines = Vec::with_capacity(HELP_LINES.len() + 2);
        lines.push(ServerMessage::HelpBegin);
        lines.extend(HELP_LINES.iter().map(|line| ServerMessage::HelpLine(line)));
        lines.push(ServerMessage::HelpEnd);
        lines
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Banner => f.write_str("Welcome to the CherryRecorder Chat Server!"),
            ServerMessage::TemporaryId { id } => write!(f, "Your temporary ID is: {id}"),
            ServerMessage::NicknameHint => {
                f.write_str("Please set your nickname using /nick <nickname>")
            }
            ServerMessage::HelpHint => f.write_str("Enter /help for a list of commands."),
            ServerMessage::JoinHint => {
                f.write_str("Enter /join <roomname> to join or create a room.")
            }
            ServerMessage::Arrived { name } => write!(f, "{name} 님이 입장했습니다."),
            ServerMessage::Departed { name } => write!(f, "* 사용자 '{name}'님이 퇴장했습니다."),
            ServerMessage::NicknameChanged { nickname } => {
                write!(f, "* 닉네임이 '{nickname}'(으)로 변경되었습니다.")
            }
            ServerMessage::NicknameAnnounced { old, new } => {
                write!(f, "* 사용자 '{old}'의 닉네임이 '{new}'(으)로 변경되었습니다.")
            }
            ServerMessage::RoomJoined { room } => write!(f, "* '{room}' 방에 입장했습니다."),
            ServerMessage::RoomRoster { members } => {
                write!(f, "* 현재 멤버 ({}): {}", members.len(), members.join(", "))
            }
            ServerMessage::AlreadyHere { room } => write!(f, "* 이미 '{room}' 방에 있습니다."),
            ServerMessage::MemberJoined { name } => {
                write!(f, "* 사용자 '{name}'님이 방에 들어왔습니다.")
            }
            ServerMessage::RoomLeft { room } => write!(f, "* '{room}' 방에서 퇴장했습니다."),
            ServerMessage::MemberLeft { name, room } => {
                write!(f, "* 사용자 '{name}'님이 '{room}' 방에서 나갔습니다.")
            }
            ServerMessage::RoomChat { from, room, body } => write!(f, "[{from} @ {room}]: {body}"),
            ServerMessage::Chat { from, body } => write!(f, "[{from}]: {body}"),
            ServerMessage::PrivateFrom { from, body } => write!(f, "[PM from {from}]: {body}"),
            ServerMessage::PrivateSent { to, body } => write!(f, "* To {to}: {body}"),
            ServerMessage::UserListHeader { count } => {
                write!(f, "* 현재 접속 중인 사용자 ({count}):")
            }
            ServerMessage::UserEntry { name, is_self } => {
                if *is_self {
                    write!(f, "  - {name} (You)")
                } else {
                    write!(f, "  - {name}")
                }
            }
            ServerMessage::HelpBegin => f.write_str("--- 도움말 ---"),
            ServerMessage::HelpLine(line) => f.write_str(line),
            ServerMessage::HelpEnd => f.write_str("-------------"),
            ServerMessage::HistoryHeader { scope, count } => {
                write!(f, "* {scope} 최근 기록 ({count}):")
            }
            ServerMessage::HistoryLine(line) => write!(f, "  {line}"),
            ServerMessage::Goodbye => f.write_str("* 연결을 종료합니다..."),
            ServerMessage::Usage(usage) => write!(f, "Error: 사용법: {usage}"),
            ServerMessage::UnknownCommand(cmd) => write!(
                f,
                "Error: 알 수 없는 명령어 '{cmd}'. '/help'를 입력하여 도움말을 확인하세요."
            ),
            ServerMessage::Error(text) => f.write_str(text),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let text = match &err {
            AppError::InvalidName { kind, name, reason } => {
                let subject = match kind {
                    NameKind::Nickname => "닉네임",
                    NameKind::Room => "방 이름",
                };
                match reason {
                    NameError::Empty => format!("Error: {subject}은 비어있을 수 없습니다."),
                    NameError::Whitespace => {
                        format!("Error: {subject}에 공백 문자를 포함할 수 없습니다.")
                    }
                    NameError::TooLong(max) => {
                        format!("Error: {subject}은 {max}자를 초과할 수 없습니다.")
                    }
                    NameError::Reserved => {
                        format!("Error: {subject} '{name}'은(는) 사용할 수 없습니다.")
                    }
                }
            }
            AppError::NicknameTaken(nickname) => {
                format!("Error: 닉네임 '{nickname}'은(는) 이미 사용 중입니다.")
            }
            AppError::NotInRoom => "Error: 현재 어떤 방에도 없습니다.".to_string(),
            AppError::AlreadyInRoom(room) => {
                format!("Error: 이미 '{room}' 방에 있습니다. 먼저 /leave 로 나가주세요.")
            }
            AppError::RoomFull(room) => format!("Error: '{room}' 방이 가득 찼습니다."),
            AppError::UserNotFound(nickname) => {
                format!("Error: 사용자 '{nickname}'을(를) 찾을 수 없거나 오프라인 상태입니다.")
            }
            AppError::ShuttingDown => "Error: 서버가 종료 중입니다.".to_string(),
            AppError::HistoryDisabled => {
                "Error: 메시지 기록 기능이 비활성화되어 있습니다.".to_string()
            }
            AppError::HistoryUnavailable => "Error: 메시지 기록을 불러올 수 없습니다.".to_string(),
            // Fatal errors are not typically converted (connection closes)
            _ => "Error: 서버 내부 오류가 발생했습니다.".to_string(),
        };
        ServerMessage::Error(text)
    }
}
