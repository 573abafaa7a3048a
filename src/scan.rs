//! Full-scan file enumeration.
//!
//! Walks a project root and yields every indexable file path, relative to
//! the root. Version-control metadata, dependency/build output directories,
//! lock files, dotfiles, and image binaries are skipped.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/target/**",
    "**/.*",
    "**/.*/**",
    "**/*.lock",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.ico",
];

/// Enumerate indexable files under `root`, sorted for deterministic output.
pub fn list_files(root: &Path, extra_excludes: &[String]) -> Result<Vec<String>> {
    let exclude_set = build_exclude_set(extra_excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        files.push(rel_str);
    }

    files.sort();
    Ok(files)
}

fn build_exclude_set(extra: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_EXCLUDES {
        builder.add(Glob::new(pattern)?);
    }
    for pattern in extra {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn skips_vcs_lock_dot_and_image_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        fs::write(root.join(".env"), "SECRET=1").unwrap();
        fs::write(root.join("Cargo.lock"), "").unwrap();
        fs::write(root.join("logo.png"), [0u8; 4]).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("README.md"), "# hi").unwrap();

        let files = list_files(root, &[]).unwrap();
        assert_eq!(files, vec!["README.md".to_string(), "src/main.rs".to_string()]);
    }

    #[test]
    fn extra_excludes_are_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("keep.rs"), "k").unwrap();
        fs::write(root.join("skip.min.js"), "s").unwrap();

        let files = list_files(root, &["**/*.min.js".to_string()]).unwrap();
        assert_eq!(files, vec!["keep.rs".to_string()]);
    }
}
