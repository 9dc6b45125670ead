//! In-memory fakes shared by the tool tests.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tide_core::tools::AgentToolResult;
use tokio_util::sync::CancellationToken;

use crate::traits::{DirEntryInfo, FileStat, FileSystemOps, ToolContext};

/// Filesystem held in a map. Directories are implied by file paths plus
/// any added explicitly.
#[derive(Default)]
pub struct MockFs {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<Vec<PathBuf>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let _ = self.files.lock().unwrap().insert(path.into(), content.into());
        self
    }

    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        self.dirs.lock().unwrap().push(path.into());
        self
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(Path::new(path))
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.lock().unwrap().iter().any(|d| d == path)
            || self.files.lock().unwrap().keys().any(|f| f.starts_with(path) && f != path)
    }
}

#[async_trait]
impl FileSystemOps for MockFs {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, io::Error> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), io::Error> {
        let _ = self.files.lock().unwrap().insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, io::Error> {
        if let Some(bytes) = self.files.lock().unwrap().get(path) {
            return Ok(FileStat {
                is_dir: false,
                len: bytes.len() as u64,
            });
        }
        if self.is_dir(path) {
            return Ok(FileStat { is_dir: true, len: 0 });
        }
        Err(io::Error::new(io::ErrorKind::NotFound, "not found"))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), io::Error> {
        self.dirs.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>, io::Error> {
        if !self.is_dir(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not found"));
        }
        let mut names: BTreeMap<String, bool> = BTreeMap::new();
        for file in self.files.lock().unwrap().keys() {
            if let Ok(rest) = file.strip_prefix(path) {
                let mut parts = rest.components();
                if let Some(first) = parts.next() {
                    let name = first.as_os_str().to_string_lossy().into_owned();
                    let is_dir = parts.next().is_some();
                    let entry = names.entry(name).or_insert(false);
                    *entry |= is_dir;
                }
            }
        }
        for dir in self.dirs.lock().unwrap().iter() {
            if dir.parent() == Some(path) {
                if let Some(name) = dir.file_name() {
                    let _ = names.insert(name.to_string_lossy().into_owned(), true);
                }
            }
        }
        Ok(names
            .into_iter()
            .map(|(name, is_dir)| DirEntryInfo {
                name,
                is_dir,
                is_symlink: false,
            })
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        let is_file = self.files.lock().unwrap().contains_key(path);
        is_file || self.is_dir(path)
    }
}

pub fn make_ctx() -> ToolContext {
    make_ctx_in("/tmp")
}

pub fn make_ctx_in(dir: &str) -> ToolContext {
    ToolContext {
        tool_call_id: "call-1".into(),
        session_id: "sess-1".into(),
        working_directory: dir.into(),
        cancellation: CancellationToken::new(),
    }
}

pub fn assert_error(result: &AgentToolResult, needle: &str) {
    assert!(result.is_error(), "expected error result, got: {}", result.content);
    assert!(
        result.content.contains(needle),
        "expected {needle:?} in {:?}",
        result.content
    );
}
