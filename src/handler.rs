//! Session driver
//!
//! Runs one admitted session to completion: a reader half that decodes
//! inbound units and dispatches commands to the orchestrator, and a
//! writer half that drains the outbound queue onto the transport. Both
//! halves run inside a single task and watch the session's cancellation
//! token, so read completions, write completions and stop requests for
//! one session are never processed concurrently.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::ClientCommand;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::server::ServerHandle;
use crate::session::framing::{Framing, Inbound};
use crate::session::{Outgoing, Session, SessionHandle};

/// How long a closing session may take to flush and close its transport
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Whether the reader keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Drive a session over an already handshaken transport.
///
/// Returns after the session has stopped, its transport is closed and
/// the orchestrator has processed its leave.
pub async fn run_session<F, T>(
    transport: T,
    session: Arc<SessionHandle>,
    mut outbox: mpsc::Receiver<Outgoing>,
    server: ServerHandle,
) where
    F: Framing,
    T: Stream<Item = Result<F::Frame, F::Error>> + Sink<F::Frame, Error = F::Error> + Send + Unpin,
{
    let id = session.id();
    let cancel = session.cancel_token();
    let (mut sink, mut stream) = transport.split();

    // Transport -> orchestrator
    let read_loop = async {
        // Set once /quit has queued the close; the flush must finish by then
        let mut quit_deadline: Option<Instant> = None;
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(quit_deadline.unwrap_or_else(Instant::now)),
                    if quit_deadline.is_some() =>
                {
                    debug!(session = %id, "Flush after quit timed out");
                    session.stop();
                    break;
                }
                frame = stream.next() => frame,
            };

            match frame {
                Some(Ok(frame)) => match F::decode(frame) {
                    // Input after /quit is discarded; only EOF matters now
                    Inbound::Text(_) if quit_deadline.is_some() => {}
                    Inbound::Text(text) => {
                        let flow = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            flow = dispatch(&session, &server, &text) => flow,
                        };
                        if flow == Flow::Quit {
                            quit_deadline = Some(Instant::now() + CLOSE_TIMEOUT);
                        }
                    }
                    Inbound::Skip => {}
                    Inbound::Close => {
                        debug!(session = %id, "Peer sent close");
                        session.stop();
                        break;
                    }
                },
                Some(Err(e)) => {
                    let e: AppError = e.into();
                    debug!(session = %id, "Read failed: {}", e);
                    session.stop();
                    break;
                }
                None => {
                    debug!(session = %id, "Peer closed the connection");
                    session.stop();
                    break;
                }
            }
        }
        debug!(session = %id, "Read half finished");
    };

    // Outbound queue -> transport
    let write_loop = async {
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = outbox.recv() => item,
            };

            match item {
                Some(Outgoing::Text(text)) => {
                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = sink.send(F::encode(text)) => sent,
                    };
                    if let Err(e) = sent {
                        debug!(session = %id, "Write failed: {}", e);
                        break;
                    }
                }
                Some(Outgoing::Close) | None => break,
            }
        }
        session.stop();
        if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
            debug!(session = %id, "Transport close timed out");
        }
        debug!(session = %id, "Write half finished");
    };

    tokio::join!(read_loop, write_loop);

    if let Err(e) = server.leave(id).await {
        warn!(session = %id, "Leave not processed: {}", e);
    }
    info!(session = %id, peer = %session.remote_id(), "Session closed");
}

/// Handle one inbound unit of text
async fn dispatch(session: &SessionHandle, server: &ServerHandle, input: &str) -> Flow {
    let id = session.id();
    let command = ClientCommand::parse(input);
    debug!(session = %id, ?command, "Dispatching");

    let result = match command {
        ClientCommand::Nick(nickname) => server
            .register_nickname(id, nickname.clone())
            .await
            .map(|()| vec![ServerMessage::NicknameChanged { nickname }]),
        ClientCommand::Join(room) => {
            if session.current_room().as_deref() == Some(room.as_str()) {
                Ok(vec![ServerMessage::AlreadyHere { room }])
            } else {
                server.join_room(id, room.clone()).await.map(|members| {
                    vec![
                        ServerMessage::RoomJoined { room },
                        ServerMessage::RoomRoster { members },
                    ]
                })
            }
        }
        ClientCommand::Leave => match session.current_room() {
            Some(room) => server
                .leave_room(id, room.clone())
                .await
                .map(|()| vec![ServerMessage::RoomLeft { room }]),
            None => Err(AppError::NotInRoom),
        },
        ClientCommand::Users => server.list_users(id).await.map(|users| {
            let mut lines = Vec::with_capacity(users.len() + 1);
            lines.push(ServerMessage::UserListHeader { count: users.len() });
            lines.extend(users.into_iter().map(|u| ServerMessage::UserEntry {
                name: u.name,
                is_self: u.is_self,
            }));
            lines
        }),
        ClientCommand::Help => Ok(ServerMessage::help()),
        ClientCommand::Quit => {
            let _ = session.send(&ServerMessage::Goodbye);
            session.close_after_flush();
            return Flow::Quit;
        }
        ClientCommand::PrivateMessage { target, body } => server
            .private_message(id, target.clone(), body.clone())
            .await
            .map(|()| vec![ServerMessage::PrivateSent { to: target, body }]),
        ClientCommand::History(limit) => recent_history(session, server, limit).await,
        ClientCommand::Chat(body) => server.chat(id, body).await.map(|()| Vec::new()),
        ClientCommand::Usage(usage) => Ok(vec![ServerMessage::Usage(usage)]),
        ClientCommand::Unknown(cmd) => Ok(vec![ServerMessage::UnknownCommand(cmd)]),
        ClientCommand::Empty => Ok(Vec::new()),
    };

    match result {
        Ok(replies) => {
            for reply in &replies {
                let _ = session.send(reply);
            }
            Flow::Continue
        }
        Err(AppError::ChannelSend) => {
            warn!(session = %id, "Orchestrator unavailable, stopping session");
            session.stop();
            Flow::Quit
        }
        Err(e) => {
            let _ = session.send(&ServerMessage::from(e));
            Flow::Continue
        }
    }
}

/// `/history`: the current room's log, or the global one
async fn recent_history(
    session: &SessionHandle,
    server: &ServerHandle,
    limit: usize,
) -> Result<Vec<ServerMessage>, AppError> {
    let (room, lines) = server.recent_history(session.id(), limit).await?;
    let scope = match room {
        Some(room) => format!("'{room}' 방"),
        None => String::from("전체 채팅"),
    };

    let mut replies = Vec::with_capacity(lines.len() + 1);
    replies.push(ServerMessage::HistoryHeader {
        scope,
        count: lines.len(),
    });
    replies.extend(lines.into_iter().map(ServerMessage::HistoryLine));
    Ok(replies)
}
