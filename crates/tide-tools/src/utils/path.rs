//! Turning model-supplied paths into real ones, and what tree walks skip.

use std::path::{Path, PathBuf};

/// Build output, VCS metadata and virtualenvs that walks never enter.
const SKIP_DIRS: &[&str] = &["__pycache__", ".git", ".venv", "build", "dist", "node_modules", "target", "venv"];

/// Absolute form of `raw`.
///
/// A leading `~` (alone or followed by `/`) becomes `$HOME`; other relative
/// paths are taken from `working_directory`.
pub fn resolve_path(raw: &str, working_directory: &str) -> PathBuf {
    let home = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => std::env::var_os("HOME").map(|h| (h, rest)),
        _ => None,
    };
    let path = match home {
        Some((home, rest)) => PathBuf::from(home).join(rest.trim_start_matches('/')),
        None => PathBuf::from(raw),
    };
    if path.is_absolute() {
        path
    } else {
        Path::new(working_directory).join(path)
    }
}

/// Dot-files and dot-directories, apart from `.` and `..`.
pub fn is_hidden_name(name: &str) -> bool {
    name.len() > 1 && name.starts_with('.') && name != ".."
}

/// Whether a walk should stay out of a directory named `name`.
pub fn is_skipped_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_working_directory() {
        assert_eq!(resolve_path("src/lib.rs", "/work/app"), PathBuf::from("/work/app/src/lib.rs"));
        assert_eq!(resolve_path("/etc/hosts", "/work/app"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn only_the_current_users_home_is_expanded() {
        let Some(home) = std::env::var_os("HOME") else {
            return;
        };
        assert_eq!(resolve_path("~/notes.md", "/w"), PathBuf::from(&home).join("notes.md"));
        assert_eq!(resolve_path("~", "/w"), PathBuf::from(&home));
        assert_eq!(resolve_path("~bob/x", "/w"), PathBuf::from("/w/~bob/x"));
    }

    #[test]
    fn walk_filters() {
        assert!(is_hidden_name(".github"));
        assert!(!is_hidden_name("."));
        assert!(!is_hidden_name(".."));
        assert!(!is_hidden_name("README.md"));
        assert!(is_skipped_dir("target"));
        assert!(!is_skipped_dir("src"));
    }
}
