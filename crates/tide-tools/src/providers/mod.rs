//! The seams as seen by the running binary: local disk and `bash`.

pub mod filesystem;
pub mod process;

pub use filesystem::RealFileSystem;
pub use process::TokioProcessRunner;
