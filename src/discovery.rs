//! Project discovery: find the project root and the config file in it.

use std::path::{Path, PathBuf};

/// Find the project root by walking up from `start`.
///
/// The nearest directory holding any of `markers` wins. Without one, the
/// nearest `.git` checkout is used, and failing that `start` itself.
pub fn find_root(start: &Path, markers: &[&str]) -> PathBuf {
    let mut dir = start;
    loop {
        for marker in markers {
            if dir.join(marker).exists() {
                return dir.to_path_buf();
            }
        }
        match dir.parent() {
            Some(p) if p != dir => dir = p,
            _ => break,
        }
    }

    dir = start;
    loop {
        if dir.join(".git").exists() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(p) if p != dir => dir = p,
            _ => break,
        }
    }

    tracing::warn!(start = %start.display(), "no project root marker found, using start directory");
    start.to_path_buf()
}

/// Root discovered from the current working directory.
pub fn find_root_from_cwd(markers: &[&str]) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root(&cwd, markers)
}

/// First of `names` that exists directly under `root`.
pub fn find_config_file(root: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|n| root.join(n)).find(|p| p.is_file())
}
