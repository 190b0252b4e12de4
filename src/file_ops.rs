//! File encryption/decryption operations
//!
//! This module reads whole files, runs them through the envelope codec and
//! writes the result next to the input. Outputs are written to a temporary
//! file in the destination directory and renamed into place, so a failure
//! never leaves a partial file behind.

use crate::command::{Command, DecryptRequest, EncryptRequest, WritePolicy};
use crate::envelope;
use crate::error::{EnvelockError, ErrorCategory, ErrorKind, Result};
use crate::passphrase::PassphraseReader;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run a validated command, returning the path that was written.
pub fn execute(command: &Command, passphrase_reader: &mut dyn PassphraseReader) -> Result<PathBuf> {
    match command {
        Command::Encrypt(req) => encrypt_file(req, passphrase_reader),
        Command::Decrypt(req) => decrypt_file(req, passphrase_reader),
    }
}

/// Encrypt a file with a password
///
/// Reads plaintext from `req.input` and writes the envelope to
/// `<input>.<id>.<extension>`. The input file is left untouched.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(
    req: &EncryptRequest,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<PathBuf> {
    let output_path = req.output_path();
    check_output(&output_path, req.policy)?;

    let plaintext = fs::read(&req.input).map_err(|e| read_error(&req.input, e))?;
    debug!(
        input = %req.input.display(),
        bytes = plaintext.len(),
        format = ?req.format,
        "read plaintext"
    );

    let passphrase = passphrase_reader.read_passphrase()?;
    let sealed = envelope::encrypt(req.format, &passphrase, &plaintext)
        .map_err(|e| e.with_context("encryption failed"))?;

    write_file_atomic(&output_path, &sealed, req.policy)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    info!(output = %output_path.display(), bytes = sealed.len(), "wrote envelope");

    Ok(output_path)
}

/// Decrypt a file with a password
///
/// Reads the envelope from `req.input` and writes the plaintext to the
/// explicit output path, or to the input path with its `.<id>.<extension>`
/// suffix stripped.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    req: &DecryptRequest,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<PathBuf> {
    let output_path = req.output_path()?;
    check_output(&output_path, req.policy)?;

    let sealed = fs::read(&req.input).map_err(|e| read_error(&req.input, e))?;
    debug!(
        input = %req.input.display(),
        bytes = sealed.len(),
        legacy = req.legacy,
        "read envelope"
    );

    let passphrase = passphrase_reader.read_passphrase()?;
    let plaintext = if req.legacy {
        envelope::decrypt_legacy(&passphrase, &sealed)
    } else {
        envelope::decrypt(&passphrase, &sealed)
    }
    .map_err(|e| e.with_context("failed to decrypt"))?;

    write_file_atomic(&output_path, &plaintext, req.policy)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    info!(output = %output_path.display(), bytes = plaintext.len(), "wrote plaintext");

    Ok(output_path)
}

/// Fail early, before any key derivation, when the output would be clobbered.
///
/// The final rename re-checks this, so a file appearing in between is still
/// not overwritten.
fn check_output(path: &Path, policy: WritePolicy) -> Result<()> {
    if policy == WritePolicy::NoClobber && path.exists() {
        return Err(output_exists(path));
    }
    Ok(())
}

/// Write `contents` to `path` via tempfile + fsync + rename.
///
/// Either the complete new file is in place afterwards, or nothing changed.
fn write_file_atomic(path: &Path, contents: &[u8], policy: WritePolicy) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        EnvelockError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create tempfile in {}", dir.display()),
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        EnvelockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        EnvelockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        EnvelockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                EnvelockError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    let persisted = match policy {
        WritePolicy::NoClobber => temp_file.persist_noclobber(path),
        WritePolicy::Overwrite => temp_file.persist(path),
    };
    persisted.map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            output_exists(path)
        } else {
            EnvelockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to rename to target file {}", path.display()),
                e.error,
            )
        }
    })?;
    Ok(())
}

fn output_exists(path: &Path) -> EnvelockError {
    EnvelockError::with_kind(
        ErrorCategory::User,
        ErrorKind::OutputExists,
        format!("{} already exists; use --force to overwrite", path.display()),
    )
}

fn read_error(path: &Path, err: io::Error) -> EnvelockError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    EnvelockError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Format;
    use crate::passphrase::ConstantPassphraseReader;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn reader(password: &[u8]) -> ConstantPassphraseReader {
        ConstantPassphraseReader::new(password.to_vec())
    }

    fn encrypt_req(input: &Path, id: &str, extension: Option<&str>) -> EncryptRequest {
        EncryptRequest::new(
            input.to_path_buf(),
            id,
            extension,
            Format::Salted,
            WritePolicy::NoClobber,
        )
        .unwrap()
    }

    fn decrypt_req(input: &Path, policy: WritePolicy) -> DecryptRequest {
        DecryptRequest::new(input.to_path_buf(), None, false, policy).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("report.txt");
        let plaintext = b"Hello, envelock!";
        fs::write(&plain_path, plaintext).unwrap();

        let crypt_path = encrypt_file(
            &encrypt_req(&plain_path, "abc123", Some("locked")),
            &mut reader(b"test password"),
        )
        .unwrap();
        assert_eq!(crypt_path, temp_dir.path().join("report.txt.abc123.locked"));
        assert!(crypt_path.exists());

        // Source untouched
        assert_eq!(fs::read(&plain_path).unwrap(), plaintext);

        fs::remove_file(&plain_path).unwrap();
        let decrypted_path = decrypt_file(
            &decrypt_req(&crypt_path, WritePolicy::NoClobber),
            &mut reader(b"test password"),
        )
        .unwrap();
        assert_eq!(decrypted_path, plain_path);
        assert_eq!(fs::read(&decrypted_path).unwrap(), plaintext);
    }

    #[test]
    fn test_multi_dot_name_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("a.b.c.txt");
        fs::write(&plain_path, b"dots").unwrap();

        let crypt_path = encrypt_file(
            &encrypt_req(&plain_path, "9", Some("enc")),
            &mut reader(b"pw"),
        )
        .unwrap();
        assert_eq!(crypt_path, temp_dir.path().join("a.b.c.txt.9.enc"));

        fs::remove_file(&plain_path).unwrap();
        let decrypted_path = decrypt_file(
            &decrypt_req(&crypt_path, WritePolicy::NoClobber),
            &mut reader(b"pw"),
        )
        .unwrap();
        assert_eq!(decrypted_path, plain_path);
        assert_eq!(fs::read(&decrypted_path).unwrap(), b"dots");
    }

    #[test]
    fn test_execute_dispatches() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("notes.md");
        fs::write(&plain_path, b"# notes").unwrap();

        let command = Command::Encrypt(encrypt_req(&plain_path, "n1", None));
        let crypt_path = execute(&command, &mut reader(b"pw")).unwrap();
        assert_eq!(crypt_path, temp_dir.path().join("notes.md.n1.locked"));

        let command = Command::Decrypt(decrypt_req(&crypt_path, WritePolicy::Overwrite));
        let out = execute(&command, &mut reader(b"pw")).unwrap();
        assert_eq!(fs::read(out).unwrap(), b"# notes");
    }

    #[test]
    fn test_decrypt_does_not_clobber_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("report.txt");
        fs::write(&plain_path, b"original").unwrap();

        let crypt_path =
            encrypt_file(&encrypt_req(&plain_path, "x", None), &mut reader(b"pw")).unwrap();
        fs::write(&plain_path, b"edited since").unwrap();

        let err = decrypt_file(
            &decrypt_req(&crypt_path, WritePolicy::NoClobber),
            &mut reader(b"pw"),
        )
        .expect_err("expected refusal to overwrite");
        assert_eq!(err.kind, Some(ErrorKind::OutputExists));
        assert_eq!(fs::read(&plain_path).unwrap(), b"edited since");

        decrypt_file(
            &decrypt_req(&crypt_path, WritePolicy::Overwrite),
            &mut reader(b"pw"),
        )
        .unwrap();
        assert_eq!(fs::read(&plain_path).unwrap(), b"original");
    }

    #[test]
    fn test_encrypt_does_not_clobber_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("report.txt");
        fs::write(&plain_path, b"data").unwrap();

        encrypt_file(&encrypt_req(&plain_path, "x", None), &mut reader(b"pw")).unwrap();
        let err = encrypt_file(&encrypt_req(&plain_path, "x", None), &mut reader(b"pw"))
            .expect_err("expected refusal to overwrite");
        assert_eq!(err.kind, Some(ErrorKind::OutputExists));
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        fs::write(&plain_path, b"test").unwrap();

        let crypt_path =
            encrypt_file(&encrypt_req(&plain_path, "p", None), &mut reader(b"test")).unwrap();

        let metadata = fs::metadata(&crypt_path).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_decrypt_wrong_password_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        fs::write(&plain_path, b"secret").unwrap();

        let crypt_path =
            encrypt_file(&encrypt_req(&plain_path, "id", None), &mut reader(b"correct")).unwrap();
        fs::remove_file(&plain_path).unwrap();

        let err = decrypt_file(
            &decrypt_req(&crypt_path, WritePolicy::NoClobber),
            &mut reader(b"wrong"),
        )
        .expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert!(!plain_path.exists());

        // Only the envelope is left in the directory, no stray tempfile.
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_decrypt_truncated_file() {
        let temp_dir = TempDir::new().unwrap();
        let crypt_path = temp_dir.path().join("short.txt.id.locked");
        fs::write(&crypt_path, [0x01u8, 0x02, 0x03]).unwrap();

        let err = decrypt_file(
            &decrypt_req(&crypt_path, WritePolicy::NoClobber),
            &mut reader(b"pw"),
        )
        .expect_err("expected truncation");
        assert_eq!(err.kind, Some(ErrorKind::TruncatedEnvelope));
        assert!(!temp_dir.path().join("short.txt").exists());
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");

        let err = encrypt_file(&encrypt_req(&missing, "id", None), &mut reader(b"pw"))
            .expect_err("expected read failure");
        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(err.category, ErrorCategory::User);
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("empty.txt");
        fs::write(&plain_path, b"").unwrap();

        let crypt_path =
            encrypt_file(&encrypt_req(&plain_path, "e", None), &mut reader(b"test")).unwrap();
        fs::remove_file(&plain_path).unwrap();

        let decrypted_path = decrypt_file(
            &decrypt_req(&crypt_path, WritePolicy::NoClobber),
            &mut reader(b"test"),
        )
        .unwrap();
        assert_eq!(fs::read(&decrypted_path).unwrap(), b"");
    }

    #[test]
    fn test_legacy_layout_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("old.txt");
        fs::write(&plain_path, b"from an earlier release").unwrap();

        let req = EncryptRequest::new(
            plain_path.clone(),
            "id",
            None,
            Format::Legacy,
            WritePolicy::NoClobber,
        )
        .unwrap();
        let crypt_path = encrypt_file(&req, &mut reader(b"pw")).unwrap();
        fs::remove_file(&plain_path).unwrap();

        let tagged = decrypt_file(
            &decrypt_req(&crypt_path, WritePolicy::NoClobber),
            &mut reader(b"pw"),
        );
        assert!(tagged.is_err());

        let legacy = DecryptRequest::new(crypt_path, None, true, WritePolicy::NoClobber).unwrap();
        let out = decrypt_file(&legacy, &mut reader(b"pw")).unwrap();
        assert_eq!(fs::read(out).unwrap(), b"from an earlier release");
    }
}
