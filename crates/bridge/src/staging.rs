//! Request-scoped staging area for training images.
//!
//! A [`StagingArea`] owns a uniquely named temporary directory. Uploaded
//! images are written into it, zipped into a single archive, and the whole
//! directory is removed when the area is dropped, whichever way the request
//! ends.

use std::io::Write;
use std::path::{Path, PathBuf};

use headshot_core::finetune::{archive_entry_name, TRAINING_ARCHIVE_NAME};

use crate::error::BridgeError;

/// Prefix of every staging directory name.
pub const STAGING_DIR_PREFIX: &str = "finetune-";

/// An uploaded training image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Temporary directory holding one request's training images.
#[derive(Debug)]
pub struct StagingArea {
    dir: tempfile::TempDir,
    files: Vec<(String, PathBuf)>,
}

impl StagingArea {
    /// Create a fresh staging directory under `root`, creating `root` if needed.
    pub fn create(root: &Path) -> Result<Self, BridgeError> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir_in(root)?;
        tracing::debug!(path = %dir.path().display(), "Created staging directory");
        Ok(Self {
            dir,
            files: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Number of files staged so far.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every upload into the staging directory under a flat, unique name.
    pub async fn stage(&mut self, uploads: &[TrainingUpload]) -> Result<(), BridgeError> {
        for upload in uploads {
            let entry = archive_entry_name(self.files.len(), &upload.file_name);
            let dest = self.dir.path().join(&entry);
            tokio::fs::write(&dest, &upload.bytes).await?;
            self.files.push((entry, dest));
        }
        Ok(())
    }

    /// Zip the staged files into [`TRAINING_ARCHIVE_NAME`] inside the staging
    /// directory and return the archive path.
    ///
    /// Compression runs on the blocking thread pool.
    pub async fn archive(&self) -> Result<PathBuf, BridgeError> {
        let archive_path = self.dir.path().join(TRAINING_ARCHIVE_NAME);
        let files = self.files.clone();
        let target = archive_path.clone();

        tokio::task::spawn_blocking(move || write_zip(&target, &files))
            .await
            .map_err(|e| std::io::Error::other(format!("Archive task failed: {e}")))??;

        tracing::debug!(
            path = %archive_path.display(),
            files = self.files.len(),
            "Created training archive",
        );
        Ok(archive_path)
    }

    /// Remove the staging directory now, logging instead of failing if the
    /// removal does not succeed. Dropping the area has the same effect
    /// without the log line.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove staging directory");
        }
    }
}

fn write_zip(target: &Path, files: &[(String, PathBuf)]) -> Result<(), BridgeError> {
    let file = std::fs::File::create(target)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (entry, path) in files {
        let bytes = std::fs::read(path)?;
        writer.start_file(entry.as_str(), options)?;
        writer.write_all(&bytes)?;
    }
    writer.finish()?;
    Ok(())
}
