//! envelock CLI - password-based file encryption
//!
//! Command-line interface for encrypting and decrypting files using
//! AES-256-GCM with PBKDF2-HMAC-SHA256 key derivation.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use envelock::command::{Command, DecryptRequest, EncryptRequest, WritePolicy};
use envelock::envelope::Format;
use envelock::error::Result;
use envelock::{file_ops, passphrase};

#[derive(Parser)]
#[command(name = "envelock")]
#[command(version)]
#[command(about = "Password-based file encryption.", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt FILE into FILE.ID.EXTENSION
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Password, or '-' to read it from stdin
        #[arg(value_name = "PASSWORD", allow_hyphen_values = true)]
        password: String,

        /// Identifier placed in the output file name
        #[arg(value_name = "ID")]
        id: String,

        /// Final output file name component; dots are removed
        #[arg(value_name = "EXTENSION")]
        extension: Option<String>,

        /// Derive the key from an unsalted SHA-256 of the password
        #[arg(long, conflicts_with = "legacy")]
        unsalted: bool,

        /// Write the untagged layout of earlier releases
        #[arg(long)]
        legacy: bool,

        /// Replace the output file if it already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Decrypt FILE.ID.EXTENSION back into FILE
    #[command(alias = "d")]
    Decrypt {
        /// Path to the encrypted file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Password, or '-' to read it from stdin
        #[arg(value_name = "PASSWORD", allow_hyphen_values = true)]
        password: String,

        /// Read the untagged layout of earlier releases
        #[arg(long)]
        legacy: bool,

        /// Write the plaintext here instead of the name recovered from FILE
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Replace the output file if it already exists
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (command, password) = match build_command(cli.command) {
        Ok(parts) => parts,
        Err(e) => fail(e),
    };
    debug!(?command, "validated command");

    let mut reader = passphrase::from_argument(&password);
    match file_ops::execute(&command, &mut *reader) {
        Ok(path) => match command {
            Command::Encrypt(_) => {
                println!("File encrypted successfully: {}", path.display())
            }
            Command::Decrypt(_) => {
                println!("File decrypted successfully: {}", path.display())
            }
        },
        Err(e) => fail(e),
    }
}

fn fail(e: envelock::error::EnvelockError) -> ! {
    eprintln!("Error: {}", e.chain_message());
    process::exit(e.exit_code());
}

fn build_command(commands: Commands) -> Result<(Command, String)> {
    match commands {
        Commands::Encrypt {
            file,
            password,
            id,
            extension,
            unsalted,
            legacy,
            force,
        } => {
            let format = if unsalted {
                Format::Unsalted
            } else if legacy {
                Format::Legacy
            } else {
                Format::Salted
            };
            let req = EncryptRequest::new(file, &id, extension.as_deref(), format, policy(force))?;
            Ok((Command::Encrypt(req), password))
        }
        Commands::Decrypt {
            file,
            password,
            legacy,
            output,
            force,
        } => {
            let req = DecryptRequest::new(file, output, legacy, policy(force))?;
            Ok((Command::Decrypt(req), password))
        }
    }
}

fn policy(force: bool) -> WritePolicy {
    if force {
        WritePolicy::Overwrite
    } else {
        WritePolicy::NoClobber
    }
}

/// Logs go to stderr so stdout only carries the result line.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
