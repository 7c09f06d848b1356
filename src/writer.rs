use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::debug;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Returns a fresh `processed-<timestamp>` directory name under `base`.
#[must_use]
pub fn timestamped_output_dir(base: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S");
    base.join(format!("processed-{timestamp}"))
}

/// Writes processed outputs into one directory.
///
/// Each write goes to a temporary sibling first and is renamed into place,
/// so a crashed run never leaves a half-written output behind.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
}

impl OutputWriter {
    /// Resolves the output directory and makes sure it exists.
    ///
    /// Uses `custom` when given, otherwise a timestamped directory in the
    /// current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn create(custom: Option<&Path>) -> Result<Self> {
        let output_dir = custom.map_or_else(|| timestamped_output_dir(Path::new(".")), Path::to_path_buf);

        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| Error::io(&output_dir, e))?;

        Ok(Self { output_dir })
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `content` to `file_name` inside the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `file_name` is not a plain file name or if any
    /// file operation fails.
    pub async fn write(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        let is_plain = Path::new(file_name)
            .file_name()
            .is_some_and(|name| name == file_name);
        if !is_plain {
            return Err(Error::config(format!(
                "Output name must be a plain file name, got '{file_name}'"
            )));
        }

        let path = self.output_dir.join(file_name);
        self.write_file_atomic(&path, content).await?;

        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(path)
    }

    /// Writes a file atomically.
    ///
    /// # Process
    ///
    /// 1. Writes content to a uniquely named hidden temporary sibling
    /// 2. Syncs the temporary file to disk
    /// 3. Renames it over the target path
    ///
    /// Concurrent writes to the same target never share a temporary file;
    /// the last rename wins.
    async fn write_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let temp_path = self.temp_path_for(path);

        let result = Self::write_and_rename(&temp_path, path, content).await;
        if result.is_err() {
            // best effort, the original error is what matters
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn write_and_rename(temp_path: &Path, path: &Path, content: &str) -> Result<()> {
        let mut temp_file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| Error::io(temp_path, e))?;

        temp_file
            .write_all(content.as_bytes())
            .await
            .map_err(|e| Error::io(temp_path, e))?;

        temp_file
            .sync_all()
            .await
            .map_err(|e| Error::io(temp_path, e))?;

        drop(temp_file);

        tokio::fs::rename(temp_path, path)
            .await
            .map_err(|e| Error::io(path, e))?;

        Ok(())
    }

    /// `.<name>.<pid>-<seq>.tmp` next to `path`.
    fn temp_path_for(&self, path: &Path) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        self.output_dir
            .join(format!(".{name}.{}-{seq}.tmp", std::process::id()))
    }
}
