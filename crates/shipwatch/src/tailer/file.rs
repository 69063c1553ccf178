use std::{
    collections::VecDeque,
    io::SeekFrom,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncSeekExt},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lines::LineAssembler;
use crate::error::TailError;

const CHUNK_SIZE_BYTES: usize = 8192;
const HEAD_FINGERPRINT_BYTES: usize = 64;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailOptions {
    /// How long to sleep when the file has no new data.
    pub poll_interval: Duration,
    pub max_line_bytes: usize,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(metadata: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    #[cfg(not(unix))]
    fn of(_metadata: &std::fs::Metadata) -> Self {
        Self { dev: 0, ino: 0 }
    }
}

/// Follows a growing file, yielding lines appended after it was opened.
///
/// The tailer never reaches end-of-stream on its own: when the file is idle it
/// sleeps for the poll interval and tries again. [`FileTailer::next_line`]
/// returns `None` only once the cancellation token fires.
///
/// While idle it also checks whether the file was truncated, rewritten in
/// place or replaced (rotation), and if so restarts from the beginning of the
/// new content. In-place rewrites are recognised by the first
/// [`HEAD_FINGERPRINT_BYTES`] of the file changing.
pub struct FileTailer {
    path: PathBuf,
    file: File,
    identity: FileIdentity,
    position: u64,
    head: Vec<u8>,
    assembler: LineAssembler,
    ready: VecDeque<String>,
    buffer: Vec<u8>,
    options: TailOptions,
    cancel: CancellationToken,
}

impl FileTailer {
    /// Opens `path` and seeks to its end; existing content is never yielded.
    pub async fn open(
        path: impl Into<PathBuf>,
        options: TailOptions,
        cancel: CancellationToken,
    ) -> Result<Self, TailError> {
        let path = path.into();
        let open_err = |source: std::io::Error| TailError::Open {
            path: path.clone(),
            source,
        };

        let mut file = File::open(&path).await.map_err(open_err)?;
        let metadata = file.metadata().await.map_err(open_err)?;
        if !metadata.is_file() {
            return Err(TailError::NotAFile { path });
        }

        let mut head = vec![0u8; (metadata.len() as usize).min(HEAD_FINGERPRINT_BYTES)];
        file.read_exact(&mut head).await.map_err(open_err)?;

        let position = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|source| TailError::Seek {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), position, "tailing log");

        Ok(Self {
            identity: FileIdentity::of(&metadata),
            path,
            file,
            position,
            head,
            assembler: LineAssembler::new(options.max_line_bytes),
            ready: VecDeque::new(),
            buffer: vec![0u8; CHUNK_SIZE_BYTES],
            options,
            cancel,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset of the next read.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Waits for the next complete line.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            if let Some(line) = self.ready.pop_front() {
                return Some(line);
            }

            match self.file.read(&mut self.buffer).await {
                Ok(0) => {
                    if !self.wait().await {
                        return None;
                    }
                    self.reopen_if_replaced().await;
                }
                Ok(n) => {
                    self.record_head(n);
                    self.position += n as u64;
                    self.assembler.push(&self.buffer[..n], &mut self.ready);
                }
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "failed reading log; retrying");
                    if !self.wait().await {
                        return None;
                    }
                }
            }
        }
    }

    async fn wait(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = time::sleep(self.options.poll_interval) => true,
        }
    }

    /// Keeps the first bytes of the file as they are read.
    fn record_head(&mut self, n: usize) {
        let offset = self.head.len();
        if offset as u64 != self.position || offset >= HEAD_FINGERPRINT_BYTES {
            return;
        }
        let take = n.min(HEAD_FINGERPRINT_BYTES - offset);
        self.head.extend_from_slice(&self.buffer[..take]);
    }

    async fn reopen_if_replaced(&mut self) {
        // The path can briefly vanish mid-rotation; just try again later.
        let Ok(metadata) = fs::metadata(&self.path).await else {
            return;
        };

        let identity = FileIdentity::of(&metadata);
        if identity != self.identity {
            match File::open(&self.path).await {
                Ok(file) => {
                    info!(path = %self.path.display(), "log file was replaced; reading from start");
                    self.file = file;
                    self.identity = identity;
                    self.restart();
                }
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "failed to reopen replaced log");
                }
            }
            return;
        }

        if metadata.len() < self.position {
            info!(
                path = %self.path.display(),
                previous_position = self.position,
                len = metadata.len(),
                "log file was truncated; reading from start"
            );
            self.rewind().await;
        } else if self.head_changed().await {
            info!(path = %self.path.display(), "log file was rewritten; reading from start");
            self.rewind().await;
        }
    }

    async fn head_changed(&self) -> bool {
        if self.head.is_empty() {
            return false;
        }
        let Ok(mut file) = File::open(&self.path).await else {
            return false;
        };
        let mut current = vec![0u8; self.head.len()];
        match file.read_exact(&mut current).await {
            Ok(_) => current != self.head,
            Err(err) => err.kind() == std::io::ErrorKind::UnexpectedEof,
        }
    }

    async fn rewind(&mut self) {
        match self.file.seek(SeekFrom::Start(0)).await {
            Ok(_) => self.restart(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to rewind log");
            }
        }
    }

    fn restart(&mut self) {
        if self.assembler.has_partial() {
            debug!(path = %self.path.display(), "dropping partial line from previous file");
        }
        self.assembler.reset();
        self.head.clear();
        self.position = 0;
    }
}
