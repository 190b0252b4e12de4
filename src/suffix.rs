//! Filename suffix convention
//!
//! Encrypted files are named `<original>.<id>.<extension>`. Decryption
//! recovers the original name by dropping the last two dot-separated
//! components. This is a heuristic: it cannot tell a suffix from dots that
//! were part of the original name, so it is only an inverse of [`append`]
//! when the suffix is still intact.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{EnvelockError, ErrorCategory, ErrorKind, Result};

/// Extension used when the caller does not supply one.
pub const DEFAULT_EXTENSION: &str = "locked";

/// Remove every `.` from a caller-supplied extension.
pub fn sanitize_extension(extension: &str) -> String {
    extension.replace('.', "")
}

/// Append `.<id>.<extension>` to `path`.
///
/// `extension` is expected to be sanitized already.
pub fn append(path: &Path, id: &str, extension: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(id);
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Strip the `.<id>.<extension>` suffix from a file name.
///
/// - no dot or a single dot: returned unchanged, the suffix is assumed to
///   have been removed already
/// - only one dot before the last: truncated before the last dot
/// - otherwise: truncated before the second-to-last dot
pub fn strip(name: &str) -> &str {
    let Some(last_dot) = name.rfind('.') else {
        return name;
    };
    if name.matches('.').count() == 1 {
        return name;
    }
    match name[..last_dot].rfind('.') {
        Some(before_last) => &name[..before_last],
        None => &name[..last_dot],
    }
}

/// Recover the original path of an encrypted file.
///
/// Only the final path component is considered, so dots in directory names
/// never take part in the heuristic.
pub fn original_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        EnvelockError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidArgument,
            format!("{} has no file name", path.display()),
        )
    })?;
    let file_name = file_name.to_str().ok_or_else(|| {
        EnvelockError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidArgument,
            format!("file name of {} is not valid UTF-8", path.display()),
        )
    })?;

    let stripped = strip(file_name);
    if stripped.is_empty() {
        return Err(EnvelockError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidArgument,
            format!("stripping the suffix from {} leaves no name", path.display()),
        ));
    }

    Ok(path.with_file_name(stripped))
}
