//! pwcrypt CLI - Password-based file encryption
//!
//! Command-line interface for encrypting and decrypting files using
//! AES-256-CBC with scrypt key derivation.

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::error::Error as StdError;
use std::path::PathBuf;
use std::process;

use pwcrypt::file_ops;
use pwcrypt::password::{PasswordReader, ReaderPasswordReader, TerminalPasswordReader};

#[derive(Parser)]
#[command(name = "pwcrypt")]
#[command(version)]
#[command(about = "Password-based file encryption.", long_about = None)]
struct Cli {
    /// Read password from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file into base64 envelope text
    #[command(alias = "e")]
    Encrypt {
        /// File to encrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Where to write the envelope text (created 0600 on Unix)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Decrypt base64 envelope text back into a file
    #[command(alias = "d")]
    Decrypt {
        /// File holding the envelope text
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Where to write the decrypted contents
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut reader = get_password_reader(cli.passphrase_stdin);
    let result = match cli.command {
        Commands::Encrypt { input, output } => {
            file_ops::encrypt_file(&input, &output, &mut *reader)
        }
        Commands::Decrypt { input, output } => {
            file_ops::decrypt_file(&input, &output, &mut *reader)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Renders an error and its sources as "outer: inner: innermost".
fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        source = inner.source();
    }
    rendered
}

fn get_password_reader(use_stdin: bool) -> Box<dyn PasswordReader> {
    if use_stdin {
        Box::new(ReaderPasswordReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPasswordReader)
    }
}
