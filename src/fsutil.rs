//! Small filesystem utilities.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{TestprofError, TestprofResult};

/// Creates `dir` if needed and returns its absolute, canonical form.
pub fn ensure_target_dir(dir: &Path) -> TestprofResult<PathBuf> {
    let invalid = |reason: String| TestprofError::InvalidTargetDirectory {
        path: dir.to_path_buf(),
        reason,
    };
    if let Err(err) = std::fs::create_dir_all(dir) {
        return Err(invalid(err.to_string()));
    }
    if !dir.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    dir.canonicalize().map_err(|err| invalid(err.to_string()))
}

/// `*.json` files directly inside `dir`, sorted by path.
pub fn list_artifacts(dir: &Path) -> TestprofResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            TestprofError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(msg)),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|s| s.to_str()) == Some("json") {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}
