//! Filesystem tools.

pub mod glob;
pub mod list_dir;
pub mod read;
pub mod update;
pub mod write;

pub use glob::GlobTool;
pub use list_dir::ListDirTool;
pub use read::ReadFileTool;
pub use update::UpdateFileTool;
pub use write::WriteFileTool;
