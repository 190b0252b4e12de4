//! Validated command objects
//!
//! The command line layer turns its arguments into one of these before any
//! file is touched. Everything below this point can assume the id and
//! extension are safe to splice into a file name.

use std::path::{Path, PathBuf};

use crate::envelope::Format;
use crate::error::{EnvelockError, ErrorCategory, ErrorKind, Result};
use crate::suffix;

/// What to do when the output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Fail with [`ErrorKind::OutputExists`].
    #[default]
    NoClobber,
    /// Replace the existing file.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptRequest {
    pub input: PathBuf,
    pub id: String,
    /// Sanitized: contains no `.`.
    pub extension: String,
    pub format: Format,
    pub policy: WritePolicy,
}

impl EncryptRequest {
    /// Validate and normalize the parts of an encrypt request.
    ///
    /// The extension has its dots removed and falls back to
    /// [`suffix::DEFAULT_EXTENSION`] when absent.
    pub fn new(
        input: PathBuf,
        id: &str,
        extension: Option<&str>,
        format: Format,
        policy: WritePolicy,
    ) -> Result<Self> {
        validate_input(&input)?;
        validate_component("id", id)?;

        let extension = suffix::sanitize_extension(extension.unwrap_or(suffix::DEFAULT_EXTENSION));
        validate_component("extension", &extension)?;

        Ok(Self {
            input,
            id: id.to_string(),
            extension,
            format,
            policy,
        })
    }

    /// Path the envelope is written to.
    pub fn output_path(&self) -> PathBuf {
        suffix::append(&self.input, &self.id, &self.extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptRequest {
    pub input: PathBuf,
    /// Explicit destination. When absent the suffix is stripped from `input`.
    pub output: Option<PathBuf>,
    pub legacy: bool,
    pub policy: WritePolicy,
}

impl DecryptRequest {
    pub fn new(
        input: PathBuf,
        output: Option<PathBuf>,
        legacy: bool,
        policy: WritePolicy,
    ) -> Result<Self> {
        validate_input(&input)?;
        Ok(Self {
            input,
            output,
            legacy,
            policy,
        })
    }

    /// Path the plaintext is written to.
    pub fn output_path(&self) -> Result<PathBuf> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }
        let recovered = suffix::original_path(&self.input)?;
        if recovered == self.input {
            return Err(EnvelockError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidArgument,
                format!(
                    "cannot recover an original name from {}; pass --output",
                    self.input.display()
                ),
            ));
        }
        Ok(recovered)
    }
}

/// A validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Encrypt(EncryptRequest),
    Decrypt(DecryptRequest),
}

fn validate_input(input: &Path) -> Result<()> {
    if input.as_os_str().is_empty() {
        return Err(invalid("input path must not be empty"));
    }
    if input.file_name().is_none() {
        return Err(invalid(format!("{} does not name a file", input.display())));
    }
    Ok(())
}

/// Ids and extensions are spliced into a file name between dots.
fn validate_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(format!("{} must not be empty", what)));
    }
    if value.contains('.') {
        return Err(invalid(format!("{} must not contain '.': {:?}", what, value)));
    }
    if value.contains('/') || value.contains('\\') || value.contains('\0') {
        return Err(invalid(format!(
            "{} must not contain path separators: {:?}",
            what, value
        )));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> EnvelockError {
    EnvelockError::with_kind(ErrorCategory::User, ErrorKind::InvalidArgument, msg)
}
