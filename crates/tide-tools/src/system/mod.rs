//! System tools.

pub mod bash;

pub use bash::BashTool;
