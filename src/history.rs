//! Message history sink
//!
//! Appends timestamped chat lines to text files and reads back the
//! most recent ones. A single writer task owns all file access, so a
//! load always observes every append submitted before it.
//!
//! Layout under the history root:
//! - `global/history.txt`
//! - `rooms/<room>.txt`
//! - `private/<a>_<b>.txt` (the two nicknames sorted)

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::AppError;

const GLOBAL_DIR: &str = "global";
const ROOMS_DIR: &str = "rooms";
const PRIVATE_DIR: &str = "private";
const GLOBAL_FILE: &str = "history.txt";

/// Pending requests the writer task may hold before appends are dropped
const HISTORY_BUFFER: usize = 1024;

#[derive(Debug)]
enum HistoryCommand {
    Append {
        path: PathBuf,
        line: String,
    },
    Load {
        path: PathBuf,
        limit: usize,
        reply: oneshot::Sender<Result<Vec<String>, AppError>>,
    },
}

/// A load already queued on the writer task
#[derive(Debug)]
pub struct PendingLoad(oneshot::Receiver<Result<Vec<String>, AppError>>);

impl PendingLoad {
    /// Wait for the writer task to read the lines
    pub async fn lines(self) -> Result<Vec<String>, AppError> {
        self.0.await.map_err(|_| AppError::HistoryUnavailable)?
    }
}

/// Handle to the history writer task
#[derive(Debug, Clone)]
pub struct MessageHistory {
    root: PathBuf,
    tx: mpsc::Sender<HistoryCommand>,
}

impl MessageHistory {
    /// Create the directory layout under `root` and start the writer task
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        for dir in [GLOBAL_DIR, ROOMS_DIR, PRIVATE_DIR] {
            fs::create_dir_all(root.join(dir)).await?;
        }

        let (tx, rx) = mpsc::channel(HISTORY_BUFFER);
        tokio::spawn(run_writer(rx));
        info!("Message history at {}", root.display());

        Ok(Self { root, tx })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record a global chat line
    pub fn log_global(&self, sender: &str, message: &str) {
        self.append(self.global_path(), sender, message);
    }

    /// Record a room chat line
    pub fn log_room(&self, room: &str, sender: &str, message: &str) {
        self.append(self.room_path(room), sender, message);
    }

    /// Record a private message between two nicknames
    pub fn log_private(&self, from: &str, to: &str, message: &str) {
        self.append(self.private_path(from, to), from, message);
    }

    /// Last `limit` global lines, oldest first
    pub async fn load_global(&self, limit: usize) -> Result<Vec<String>, AppError> {
        self.queue_global(limit)?.lines().await
    }

    /// Last `limit` lines of a room log, oldest first
    pub async fn load_room(&self, room: &str, limit: usize) -> Result<Vec<String>, AppError> {
        self.queue_room(room, limit)?.lines().await
    }

    /// Last `limit` lines exchanged between two nicknames, oldest first
    pub async fn load_private(
        &self,
        a: &str,
        b: &str,
        limit: usize,
    ) -> Result<Vec<String>, AppError> {
        self.queue_load(self.private_path(a, b), limit)?.lines().await
    }

    /// Queue a global load behind every append submitted so far
    pub fn queue_global(&self, limit: usize) -> Result<PendingLoad, AppError> {
        self.queue_load(self.global_path(), limit)
    }

    /// Queue a room load behind every append submitted so far
    pub fn queue_room(&self, room: &str, limit: usize) -> Result<PendingLoad, AppError> {
        self.queue_load(self.room_path(room), limit)
    }

    fn append(&self, path: PathBuf, sender: &str, message: &str) {
        let line = format_line(sender, message);
        if let Err(e) = self.tx.try_send(HistoryCommand::Append { path, line }) {
            warn!("History append dropped: {}", e);
        }
    }

    fn queue_load(&self, path: PathBuf, limit: usize) -> Result<PendingLoad, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(HistoryCommand::Load { path, limit, reply })
            .map_err(|e| {
                warn!("History load rejected: {}", e);
                AppError::HistoryUnavailable
            })?;
        Ok(PendingLoad(rx))
    }

    fn global_path(&self) -> PathBuf {
        self.root.join(GLOBAL_DIR).join(GLOBAL_FILE)
    }

    fn room_path(&self, room: &str) -> PathBuf {
        self.root
            .join(ROOMS_DIR)
            .join(format!("{}.txt", sanitize(room)))
    }

    fn private_path(&self, a: &str, b: &str) -> PathBuf {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        self.root
            .join(PRIVATE_DIR)
            .join(format!("{}_{}.txt", sanitize(first), sanitize(second)))
    }
}

/// `YYYY-MM-DD HH:MM:SS [sender]: message`
fn format_line(sender: &str, message: &str) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("{now} [{sender}]: {message}")
}

/// Make a name safe to use as a single file name component
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '.' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

async fn run_writer(mut rx: mpsc::Receiver<HistoryCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            HistoryCommand::Append { path, line } => {
                if let Err(e) = append_line(&path, &line).await {
                    warn!("Failed to write history to {}: {}", path.display(), e);
                }
            }
            HistoryCommand::Load { path, limit, reply } => {
                let _ = reply.send(read_tail(&path, limit).await);
            }
        }
    }
    debug!("History writer stopped");
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{line}\n").as_bytes()).await?;
    file.flush().await
}

async fn read_tail(path: &Path, limit: usize) -> Result<Vec<String>, AppError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(limit);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}
