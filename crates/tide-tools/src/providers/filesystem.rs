//! Local disk through `tokio::fs`.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use crate::traits::{DirEntryInfo, FileStat, FileSystemOps};

/// [`FileSystemOps`] on the machine's own filesystem.
pub struct RealFileSystem;

/// Symlinks count as directories when their target is one.
async fn describe(entry: &fs::DirEntry) -> io::Result<DirEntryInfo> {
    let kind = entry.file_type().await?;
    let is_dir = if kind.is_symlink() {
        fs::metadata(entry.path()).await.map(|m| m.is_dir()).unwrap_or(false)
    } else {
        kind.is_dir()
    };
    Ok(DirEntryInfo {
        name: entry.file_name().to_string_lossy().into_owned(),
        is_dir,
        is_symlink: kind.is_symlink(),
    })
}

#[async_trait]
impl FileSystemOps for RealFileSystem {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        fs::write(path, content).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        fs::metadata(path).await.map(|m| FileStat {
            is_dir: m.is_dir(),
            len: m.len(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let mut dir = fs::read_dir(path).await?;
        let mut out = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            out.push(describe(&entry).await?);
        }
        Ok(out)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
