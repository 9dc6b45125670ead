//! Content search tools.

pub mod grep;

pub use grep::GrepTool;
