//! envelock - password-based file encryption with AES-256-GCM
//!
//! Files are sealed into an envelope of `[format tag] ‖ [salt] ‖ nonce ‖
//! ciphertext ‖ tag` and renamed to `<original>.<id>.<extension>`.

#![forbid(unsafe_code)]

pub mod command;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
pub mod suffix;
