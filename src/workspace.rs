use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::JobError;
use crate::job::JobName;

#[cfg(unix)]
const SOURCE_FILE_PERMISSIONS: u32 = 0o600;

/// A job's working directory and the source file inside it.
///
/// The directory belongs to the guard from the moment it is created. Call
/// [`Workspace::cleanup`] to remove it and observe failures; any other exit
/// path releases it on drop, logging what could not be removed.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    file: PathBuf,
    file_name: String,
    released: bool,
}

impl Workspace {
    /// Creates the job's directory under `root`.
    ///
    /// Fails if it already exists, or if the name contains a path separator
    /// and would land outside `root`.
    pub async fn create(root: &Path, name: &JobName, extension: &str) -> Result<Self, JobError> {
        let dir_name = name.directory_name();
        if dir_name.contains(['/', '\\']) {
            return Err(JobError::CreateDir {
                dir: dir_name,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "key must not contain path separators",
                ),
            });
        }

        let dir = root.join(&dir_name);
        if let Err(e) = tokio::fs::create_dir(&dir).await {
            return Err(JobError::CreateDir {
                dir: dir_name,
                source: e,
            });
        }

        let file_name = name.file_name(extension);
        let file = dir.join(&file_name);
        log::debug!("Created working directory {}", dir.display());

        Ok(Self {
            dir,
            file,
            file_name,
            released: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Writes the first `declared_size` bytes of `payload` as the job's source file
    pub async fn write_source(&self, payload: &[u8], declared_size: usize) -> Result<(), JobError> {
        let Some(data) = payload.get(..declared_size) else {
            return Err(JobError::SaveFile(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "short read: got {} of {declared_size} bytes",
                    payload.len()
                ),
            )));
        };

        self.write_file(data).await.map_err(JobError::SaveFile)
    }

    async fn write_file(&self, data: &[u8]) -> io::Result<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(SOURCE_FILE_PERMISSIONS);

        let mut file = options.open(&self.file).await?;
        file.write_all(data).await?;
        file.flush().await
    }

    /// Removes the source file, then the directory, which must then be empty.
    ///
    /// Leaves the directory behind when the executed program created files of
    /// its own next to the source.
    pub async fn cleanup(mut self) -> Result<(), JobError> {
        self.released = true;

        tokio::fs::remove_file(&self.file)
            .await
            .map_err(JobError::Cleanup)?;
        tokio::fs::remove_dir(&self.dir)
            .await
            .map_err(JobError::Cleanup)?;

        log::debug!("Removed working directory {}", self.dir.display());
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // Drop cannot await; two unlink calls are cheap enough to block on
        match fs::remove_file(&self.file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("unable to remove file {}: {e}", self.file.display()),
        }
        if let Err(e) = fs::remove_dir(&self.dir) {
            log::warn!("unable to remove folder {}: {e}", self.dir.display());
        } else {
            log::info!("released working directory {}", self.dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn name(key: &str) -> JobName {
        JobName::new(key, Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    }

    #[tokio::test]
    async fn test_create_write_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), &name("job"), "go").await.unwrap();
        assert_eq!(ws.dir(), root.path().join("job20240102030405"));
        assert_eq!(ws.file_name(), "job20240102030405.go");

        ws.write_source(b"package main\n", 13).await.unwrap();
        assert_eq!(fs::read(ws.file()).unwrap(), b"package main\n");

        let (dir, file) = (ws.dir().to_path_buf(), ws.file().to_path_buf());
        ws.cleanup().await.unwrap();
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_source_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), &name("perm"), "go").await.unwrap();
        ws.write_source(b"x", 1).await.unwrap();
        let mode = fs::metadata(ws.file()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_same_name_collides() {
        let root = tempfile::tempdir().unwrap();
        let _first = Workspace::create(root.path(), &name("dup"), "go").await.unwrap();
        let second = Workspace::create(root.path(), &name("dup"), "go").await;
        match second {
            Err(JobError::CreateDir { dir, source }) => {
                assert_eq!(dir, "dup20240102030405");
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists);
            }
            other => panic!("expected CreateDir error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_separator_in_key_is_create_error() {
        let root = tempfile::tempdir().unwrap();
        let result = Workspace::create(root.path(), &name("../escape"), "go").await;
        match result {
            Err(JobError::CreateDir { dir, source }) => {
                assert_eq!(dir, "../escape20240102030405");
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("expected CreateDir error, got {other:?}"),
        }
        assert!(!root.path().parent().unwrap().join("escape20240102030405").exists());
    }

    #[tokio::test]
    async fn test_short_payload_fails_and_drop_releases_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), &name("short"), "go").await.unwrap();
        let dir = ws.dir().to_path_buf();

        let err = ws.write_source(b"abc", 10).await.unwrap_err();
        assert!(matches!(err, JobError::SaveFile(_)));
        assert!(!ws.file().exists());

        drop(ws);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_cleanup_fails_on_extra_files() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), &name("extra"), "go").await.unwrap();
        ws.write_source(b"x", 1).await.unwrap();
        fs::write(ws.dir().join("output.txt"), "left by the program").unwrap();

        let (dir, file) = (ws.dir().to_path_buf(), ws.file().to_path_buf());
        let err = ws.cleanup().await.unwrap_err();
        assert!(matches!(err, JobError::Cleanup(_)));
        assert!(!file.exists());
        assert!(dir.exists());
    }
}
