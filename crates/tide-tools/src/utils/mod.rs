//! Path, argument and error helpers shared by the tools.

pub mod fs_errors;
pub mod path;
pub mod validation;
