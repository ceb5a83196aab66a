//! File-system helpers shared by the sync steps.

use std::fs;
use std::path::Path;

use crate::domain::{AppError, Result};

/// Whether a file is empty or whitespace only.
///
/// Unreadable files count as blank so they are never copied over good data.
#[must_use]
pub fn is_blank_file(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(content) => content.trim().is_empty(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Unreadable file treated as blank");
            true
        }
    }
}

/// Copy a file, creating the destination's parent directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the copy fails.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent(dst)?;
    fs::copy(src, dst).map_err(|e| {
        AppError::io(
            format!("Failed to copy {} to {}", src.display(), dst.display()),
            e,
        )
    })?;
    Ok(())
}

/// Write text to a file, creating the parent directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the write fails.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
}

/// Read a file to a string.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read {}", path.display()), e))
}

/// Recursively copy a directory tree.
///
/// When `skip_blank` is set, files that are empty or whitespace only are
/// left out so they never replace populated files at the destination.
/// Returns the number of files copied.
///
/// # Errors
///
/// Returns an error if any directory cannot be read or any file copy fails.
pub fn copy_dir(src: &Path, dst: &Path, skip_blank: bool) -> Result<usize> {
    fs::create_dir_all(dst)
        .map_err(|e| AppError::io(format!("Failed to create {}", dst.display()), e))?;

    let entries = fs::read_dir(src)
        .map_err(|e| AppError::io(format!("Failed to read {}", src.display()), e))?;

    let mut copied = 0;
    for entry in entries {
        let entry = entry.map_err(|e| AppError::io("Failed to read directory entry", e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if from.is_dir() {
            copied += copy_dir(&from, &to, skip_blank)?;
        } else if skip_blank && is_blank_file(&from) {
            tracing::debug!(path = %from.display(), "Skipping blank file");
        } else {
            copy_file(&from, &to)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Whether a directory holds at least one non-blank file, at any depth.
#[must_use]
pub fn has_content(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    entries.flatten().any(|entry| {
        let path = entry.path();
        if path.is_dir() {
            has_content(&path)
        } else {
            !is_blank_file(&path)
        }
    })
}

/// Remove a file or directory tree. Missing paths are not an error.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return Ok(());
    };

    result.map_err(|e| AppError::io(format!("Failed to remove {}", path.display()), e))
}

/// Create `path` and its parents.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| AppError::io(format!("Failed to create {}", path.display()), e))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
