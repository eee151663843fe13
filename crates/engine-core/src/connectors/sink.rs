use crate::{connectors::format::DelimitedLineAggregator, error::WriteError};
use async_trait::async_trait;
use model::records::record::Record;
use serde::{Deserialize, Serialize};
use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};

/// Acknowledgement that a chunk reached durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteAck {
    pub lines: usize,
    pub bytes: u64,
}

/// Destination for committed chunks.
///
/// One writer, one run: `write` is called strictly sequentially by a single
/// chunk assembler and implementations need no internal locking. Sharing a
/// writer between concurrent callers is outside this contract.
#[async_trait]
pub trait SinkWriter: Send {
    /// Appends `records` in the given order and makes them durable before
    /// returning. Either every record of the call is persisted or none is.
    async fn write(&mut self, records: &[Record]) -> Result<WriteAck, WriteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Truncate any existing file when the sink opens.
    #[default]
    Overwrite,
    /// Keep existing content and append after it.
    Append,
}

/// Writes chunks as delimited text lines to a local file.
pub struct DelimitedFileSink {
    path: PathBuf,
    file: File,
    aggregator: DelimitedLineAggregator,
    committed_len: u64,
}

impl DelimitedFileSink {
    pub async fn open(
        path: impl AsRef<Path>,
        aggregator: DelimitedLineAggregator,
        mode: OpenMode,
    ) -> Result<Self, WriteError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = OpenOptions::new();
        options.create(true).write(true);
        if mode == OpenMode::Overwrite {
            options.truncate(true);
        }
        let mut file = options.open(&path).await?;
        let committed_len = file.seek(SeekFrom::End(0)).await?;

        debug!(path = %path.display(), ?mode, offset = committed_len, "Opened output file");

        Ok(Self {
            path,
            file,
            aggregator,
            committed_len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the file up to the end of the last committed chunk.
    pub fn committed_len(&self) -> u64 {
        self.committed_len
    }

    async fn append(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        self.file.write_all(bytes).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(())
    }

    /// Cuts the file back to the last committed chunk after a failed append.
    async fn rollback(&mut self) {
        let len = self.committed_len;
        let result = async {
            self.file.set_len(len).await?;
            self.file.seek(SeekFrom::Start(len)).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Failed to roll back partial chunk");
        }
    }
}

#[async_trait]
impl SinkWriter for DelimitedFileSink {
    async fn write(&mut self, records: &[Record]) -> Result<WriteAck, WriteError> {
        // Serialize everything first so a bad value never leaves half a chunk behind.
        let buffer = self.aggregator.render(records)?;
        let bytes = buffer.as_slice();

        if let Err(e) = self.append(bytes).await {
            self.rollback().await;
            return Err(e);
        }

        self.committed_len += bytes.len() as u64;
        Ok(WriteAck {
            lines: records.len(),
            bytes: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    async fn open_default(path: &Path) -> DelimitedFileSink {
        DelimitedFileSink::open(path, DelimitedLineAggregator::default(), OpenMode::Overwrite)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn writes_lines_and_acknowledges() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut sink = DelimitedFileSink::open(
            &path,
            DelimitedLineAggregator::default(),
            OpenMode::Overwrite,
        )
        .await
        .unwrap();

        let ack = sink
            .write(&[Record::new(1, "A", "R1"), Record::new(2, "B", "R2")])
            .await
            .unwrap();

        assert_eq!(ack.lines, 2);
        assert_eq!(ack.bytes, 14);
        assert_eq!(sink.committed_len(), 14);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,A,R1\n2,B,R2\n");
    }

    #[tokio::test]
    async fn overwrite_truncates_and_append_keeps_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("data.csv");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale\n").unwrap();

        let mut sink = DelimitedFileSink::open(
            &path,
            DelimitedLineAggregator::default(),
            OpenMode::Overwrite,
        )
        .await
        .unwrap();
        sink.write(&[Record::new(1, "A", "R1")]).await.unwrap();
        drop(sink);

        let mut sink = DelimitedFileSink::open(
            &path,
            DelimitedLineAggregator::default(),
            OpenMode::Append,
        )
        .await
        .unwrap();
        assert_eq!(sink.committed_len(), 7);
        sink.write(&[Record::new(2, "B", "R2")]).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,A,R1\n2,B,R2\n");
    }

    #[tokio::test]
    async fn unrepresentable_record_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut sink = DelimitedFileSink::open(
            &path,
            DelimitedLineAggregator::default(),
            OpenMode::Overwrite,
        )
        .await
        .unwrap();
        sink.write(&[Record::new(1, "A", "R1")]).await.unwrap();

        let err = sink
            .write(&[Record::new(2, "B", "R2"), Record::new(3, "C", "Doe, J")])
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::DelimiterInField { id: 3, .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,A,R1\n");
        assert_eq!(sink.committed_len(), 7);
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch").join("nested").join("data.csv");
        DelimitedFileSink::open(
            &path,
            DelimitedLineAggregator::default(),
            OpenMode::Overwrite,
        )
        .await
        .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn rollback_cuts_a_torn_tail_back_to_the_last_commit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut sink = open_default(&path).await;
        sink.write(&[Record::new(1, "A", "R1")]).await.unwrap();

        // Half a line lands on disk before the failure.
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"2,B,")
            .unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 11);

        sink.rollback().await;

        assert_eq!(std::fs::metadata(&path).unwrap().len(), sink.committed_len());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,A,R1\n");

        sink.write(&[Record::new(3, "C", "R3")]).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,A,R1\n3,C,R3\n");
    }

    #[tokio::test]
    async fn io_failure_during_append_keeps_committed_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut sink = open_default(&path).await;
        sink.write(&[Record::new(1, "A", "R1")]).await.unwrap();

        // Swap in a read-only handle so the next append fails at the OS level.
        sink.file = File::open(&path).await.unwrap();

        let err = sink
            .write(&[Record::new(2, "B", "R2"), Record::new(3, "C", "R3")])
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::Io(_)));
        assert_eq!(sink.committed_len(), 7);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), sink.committed_len());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,A,R1\n");
    }
}
