//! Interaction feed adapters
//!
//! Decode raw feed lines into `InteractionEvent`s for the ingestion loop.
//! The JSONL reader reads a file from the start and, in follow mode, keeps
//! polling for appended lines and reopens the file when it is rotated.

use crate::aggregation::InteractionEvent;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

#[derive(Debug)]
pub enum FeedError {
    Io(std::io::Error),
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        FeedError::Io(err)
    }
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Io(e) => write!(f, "Feed IO error: {}", e),
        }
    }
}

impl std::error::Error for FeedError {}

/// Source of decoded interactions
#[async_trait]
pub trait InteractionSource: Send {
    /// Next event, or `None` once the source is exhausted
    async fn next_event(&mut self) -> Result<Option<InteractionEvent>, FeedError>;

    /// Number of lines skipped because they could not be decoded
    fn skipped(&self) -> u64;
}

pub struct JsonlInteractionReader {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    follow: bool,
    poll_interval: Duration,
    skipped: u64,
    /// Text read so far for a line whose newline has not been written yet
    pending: String,
}

impl JsonlInteractionReader {
    pub fn new(path: PathBuf, follow: bool) -> Self {
        Self {
            path,
            file: None,
            inode: None,
            follow,
            poll_interval: Duration::from_millis(100),
            skipped: 0,
            pending: String::new(),
        }
    }

    /// Open the file at its beginning
    pub async fn open(&mut self) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;

        #[cfg(unix)]
        {
            let metadata = file.metadata().await?;
            self.inode = Some(metadata.ino());
        }

        self.file = Some(BufReader::new(file));

        log::info!("📖 Reading interactions: {}", self.path.display());
        Ok(())
    }

    /// Read the next non-empty line
    ///
    /// Returns `Ok(None)` at end of file unless following. When following,
    /// a line is only returned once its newline has been written; a partial
    /// tail is kept and completed by later reads.
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        if self.file.is_none() {
            self.open().await?;
        }

        loop {
            let reader = match self.file.as_mut() {
                Some(reader) => reader,
                None => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "File not opened",
                    ))
                }
            };

            // Appends to whatever partial line is already pending
            if reader.read_line(&mut self.pending).await? == 0 {
                if !self.follow {
                    return Ok(None);
                }
                if self.detect_rotation().await? {
                    log::info!("🔄 File rotation detected, reopening: {}", self.path.display());
                    if !self.pending.trim().is_empty() {
                        log::warn!(
                            "Dropping unterminated line from rotated file: {}",
                            self.pending.trim()
                        );
                    }
                    self.pending.clear();
                    self.open().await?;
                    continue;
                }
                sleep(self.poll_interval).await;
                continue;
            }

            if self.follow && !self.pending.ends_with('\n') {
                continue;
            }

            let line = std::mem::take(&mut self.pending);
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    /// Detect if the file has been replaced (inode changed)
    async fn detect_rotation(&self) -> std::io::Result<bool> {
        #[cfg(unix)]
        {
            let metadata = match tokio::fs::metadata(&self.path).await {
                Ok(metadata) => metadata,
                // Mid-rotation: the new file is not there yet
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e),
            };
            Ok(self.inode.map_or(false, |old| old != metadata.ino()))
        }

        #[cfg(not(unix))]
        {
            Ok(false)
        }
    }
}

#[async_trait]
impl InteractionSource for JsonlInteractionReader {
    async fn next_event(&mut self) -> Result<Option<InteractionEvent>, FeedError> {
        while let Some(line) = self.read_line().await? {
            match InteractionEvent::from_jsonl(&line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("Failed to parse interaction ({}): {}", e, line);
                }
            }
        }
        Ok(None)
    }

    fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reads_events_and_skips_garbage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("interactions.jsonl");
        tokio::fs::write(
            &file_path,
            concat!(
                "{\"resource\":\"R\",\"actor\":\"A1\",\"ordinal\":100,\"timestamp\":500}\n",
                "\n",
                "not json\n",
                "{\"contract\":\"R\",\"wallet\":\"A2\",\"block_number\":101,\"timestamp\":600}\n",
            ),
        )
        .await
        .unwrap();

        let mut reader = JsonlInteractionReader::new(file_path, false);

        let first = reader.next_event().await.unwrap().unwrap();
        assert_eq!(first, InteractionEvent::new("R", "A1", 100, 500));
        let second = reader.next_event().await.unwrap().unwrap();
        assert_eq!(second, InteractionEvent::new("R", "A2", 101, 600));
        assert!(reader.next_event().await.unwrap().is_none());
        assert_eq!(reader.skipped(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut reader = JsonlInteractionReader::new(temp_dir.path().join("absent.jsonl"), false);

        assert!(matches!(reader.next_event().await, Err(FeedError::Io(_))));
    }

    #[tokio::test]
    async fn test_follow_mode_picks_up_appended_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("interactions.jsonl");
        tokio::fs::write(&file_path, b"").await.unwrap();

        let mut reader = JsonlInteractionReader::new(file_path.clone(), true);
        reader.open().await.unwrap();

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&file_path)
            .await
            .unwrap();
        file.write_all(b"{\"resource\":\"R\",\"actor\":\"A\",\"ordinal\":1,\"timestamp\":2}\n")
            .await
            .unwrap();
        file.flush().await.unwrap();
        drop(file);

        let event = tokio::time::timeout(Duration::from_secs(2), reader.next_event())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(event, InteractionEvent::new("R", "A", 1, 2));
    }

    #[tokio::test]
    async fn test_follow_mode_waits_for_line_terminator() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("interactions.jsonl");
        tokio::fs::write(&file_path, b"").await.unwrap();

        let mut reader = JsonlInteractionReader::new(file_path.clone(), true);
        reader.open().await.unwrap();

        // Writer flushes half a line, pauses past a poll interval, then finishes it
        let writer = tokio::spawn(async move {
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&file_path)
                .await
                .unwrap();
            file.write_all(b"{\"resource\":\"R\",\"actor\":\"A\",").await.unwrap();
            file.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            file.write_all(b"\"ordinal\":1,\"timestamp\":2}\n").await.unwrap();
            file.flush().await.unwrap();
        });

        let event = tokio::time::timeout(Duration::from_secs(3), reader.next_event())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        writer.await.unwrap();

        assert_eq!(event, InteractionEvent::new("R", "A", 1, 2));
        assert_eq!(reader.skipped(), 0);
    }

    #[tokio::test]
    async fn test_last_line_without_newline_read_at_eof() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("interactions.jsonl");
        tokio::fs::write(&file_path, b"{\"resource\":\"R\",\"actor\":\"A\",\"ordinal\":1,\"timestamp\":2}")
            .await
            .unwrap();

        let mut reader = JsonlInteractionReader::new(file_path, false);

        assert_eq!(
            reader.next_event().await.unwrap(),
            Some(InteractionEvent::new("R", "A", 1, 2))
        );
        assert!(reader.next_event().await.unwrap().is_none());
    }
}
