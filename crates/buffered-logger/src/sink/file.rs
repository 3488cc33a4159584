//! Append-only files, one per group of levels

use super::Sink;
use crate::{Error, Level, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Routes flushed buffers into three files next to a base path:
///
/// - `<base>.error.log` for panic, fatal and error
/// - `<base>.info.log` for warn and info
/// - `<base>.debug.log` for debug and trace
///
/// A trailing `.log` on the base path is dropped first. Files are opened in
/// append mode and never rotated.
pub struct FileSink {
    base: PathBuf,
    error: Mutex<File>,
    info: Mutex<File>,
    debug: Mutex<File>,
}

impl FileSink {
    /// Open (creating if needed) the three files for `base`
    pub async fn open(base: impl AsRef<Path>) -> Result<Self> {
        let base = Self::strip_log_suffix(base.as_ref());

        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        Ok(Self {
            error: Mutex::new(Self::open_file(&Self::group_path(&base, "error")).await?),
            info: Mutex::new(Self::open_file(&Self::group_path(&base, "info")).await?),
            debug: Mutex::new(Self::open_file(&Self::group_path(&base, "debug")).await?),
            base,
        })
    }

    /// Path of the file that receives `level`
    pub fn path_for(&self, level: Level) -> PathBuf {
        Self::group_path(&self.base, Self::group(level))
    }

    fn group(level: Level) -> &'static str {
        match level {
            Level::Panic | Level::Fatal | Level::Error => "error",
            Level::Warn | Level::Info => "info",
            Level::Debug | Level::Trace => "debug",
        }
    }

    fn file_for(&self, level: Level) -> &Mutex<File> {
        match Self::group(level) {
            "error" => &self.error,
            "info" => &self.info,
            _ => &self.debug,
        }
    }

    fn strip_log_suffix(path: &Path) -> PathBuf {
        let text = path.to_string_lossy();
        match text.strip_suffix(".log") {
            Some(stripped) => PathBuf::from(stripped),
            None => path.to_path_buf(),
        }
    }

    fn group_path(base: &Path, group: &str) -> PathBuf {
        let mut name = base.as_os_str().to_owned();
        name.push(format!(".{group}.log"));
        PathBuf::from(name)
    }

    async fn open_file(path: &Path) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(file)
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn write(&self, level: Level, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }

        let mut file = self.file_for(level).lock().await;
        file.write_all(bytes).await?;
        // tokio's File hands writes to a blocking thread; wait for it to land
        file.flush().await?;
        Ok(bytes.len())
    }

    async fn flush(&self) -> Result<()> {
        for file in [&self.error, &self.info, &self.debug] {
            file.lock().await.flush().await?;
        }
        Ok(())
    }
}
