//! Disk side of file transfers.
//!
//! [`SourceFile`] reads an outgoing file in fixed-size chunks. [`PartialFile`]
//! collects an incoming file under a `.part` name and only moves it to its
//! final name once the transfer completed; an aborted transfer leaves nothing
//! behind.

use std::{
    io,
    path::{Path, PathBuf},
};

use bytes::{Bytes, BytesMut};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};

/// Suffix of files still being received.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Outgoing file opened for chunked reading.
#[derive(Debug)]
pub struct SourceFile {
    file: File,
}

impl SourceFile {
    /// Open `path` for reading.
    pub async fn open(path: &Path) -> io::Result<Self> {
        Ok(Self { file: File::open(path).await? })
    }

    /// Next chunk of at most `size` bytes, or `None` at end of file.
    ///
    /// Short reads are retried so every chunk but the last is exactly `size`
    /// bytes long.
    pub async fn next_chunk(&mut self, size: usize) -> io::Result<Option<Bytes>> {
        let mut buf = BytesMut::with_capacity(size);
        while buf.len() < size {
            let mut limited = (&mut self.file).take((size - buf.len()) as u64);
            if limited.read_buf(&mut buf).await? == 0 {
                break;
            }
        }

        if buf.is_empty() { Ok(None) } else { Ok(Some(buf.freeze())) }
    }
}

/// Incoming file being written next to its final location.
#[derive(Debug)]
pub struct PartialFile {
    file: File,
    part_path: PathBuf,
    final_path: PathBuf,
}

impl PartialFile {
    /// Create `<dir>/<name>.part`.
    ///
    /// The final name is chosen now: `name` if free, otherwise `name (1)`,
    /// `name (2)` and so on, with the extension kept last.
    pub async fn create(dir: &Path, name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir).await?;
        let final_path = unused_path(dir, name).await?;

        let mut part_name = final_path.file_name().unwrap_or_default().to_os_string();
        part_name.push(PARTIAL_SUFFIX);
        let part_path = final_path.with_file_name(part_name);

        let file = File::create(&part_path).await?;
        Ok(Self { file, part_path, final_path })
    }

    /// Path of the partial file on disk.
    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    /// Append `data`. Returns once the bytes reached the file.
    pub async fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data).await?;
        self.file.flush().await
    }

    /// Flush and move to the final name.
    pub async fn complete(mut self) -> io::Result<PathBuf> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        if let Err(e) = fs::rename(&self.part_path, &self.final_path).await {
            let _ = fs::remove_file(&self.part_path).await;
            return Err(e);
        }
        Ok(self.final_path)
    }

    /// Delete the partial file.
    pub async fn discard(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.part_path).await {
            tracing::warn!("failed to remove {}: {}", self.part_path.display(), e);
        }
    }
}

async fn unused_path(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let candidate = dir.join(name);
    if !fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    for n in 1..=u32::MAX {
        let numbered = match extension {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(numbered);
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
    }

    Err(io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"))
}
