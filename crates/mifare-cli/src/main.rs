use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use mifare_card::{AccessOption, CardError, ErrorKind, Sector, SectorKey, DEFAULT_LABEL};
use tracing_subscriber::EnvFilter;

mod commands;
mod formatters;
use commands::{parse_access, parse_key, parse_sector};
use formatters::FormatMode;

#[derive(Parser)]
#[command(name = "mifare")]
#[command(about = "MIFARE Classic 1K card operations over a PC/SC reader")]
#[command(version)]
struct Cli {
    /// Reader to use (default: first enumerated reader)
    #[arg(short, long, global = true, env = "MIFARE_READER")]
    reader: Option<String>,

    /// Open the card in exclusive mode instead of shared
    #[arg(long, global = true)]
    exclusive: bool,

    /// Output format for block contents
    #[arg(short, long, global = true, value_enum, default_value_t = FormatMode::Hex)]
    format: FormatMode,

    #[command(subcommand)]
    command: Command,
}

/// Master secret for per-card key derivation
#[derive(Args)]
struct SecretArgs {
    /// Master secret (UTF-8)
    #[arg(long, env = "MIFARE_MASTER_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Derivation label
    #[arg(long, default_value = DEFAULT_LABEL)]
    label: String,
}

#[derive(Subcommand)]
enum Command {
    /// List connected readers
    Readers,
    /// Show reader and card state
    Status,
    /// Read the UID of the card on the reader
    Uid,
    /// Read the first data block of a sector
    Read {
        #[arg(value_parser = parse_sector)]
        sector: Sector,
        /// Key A for the sector (12 hex digits)
        #[arg(short, long, value_parser = parse_key, default_value = "FFFFFFFFFFFF")]
        key: SectorKey,
    },
    /// Write up to 16 bytes of UTF-8 text to the first data block of a sector
    Write {
        #[arg(value_parser = parse_sector)]
        sector: Sector,
        text: String,
        #[arg(short, long, value_parser = parse_key, default_value = "FFFFFFFFFFFF")]
        key: SectorKey,
    },
    /// Replace the sector trailer with new keys and access conditions
    ChangeKeys {
        #[arg(value_parser = parse_sector)]
        sector: Sector,
        /// Current Key A
        #[arg(short, long, value_parser = parse_key, default_value = "FFFFFFFFFFFF")]
        key: SectorKey,
        #[arg(long, value_parser = parse_key)]
        new_key_a: SectorKey,
        #[arg(long, value_parser = parse_key)]
        new_key_b: SectorKey,
        /// Access option 0-7
        #[arg(long, value_parser = parse_access, default_value = "0")]
        access: AccessOption,
    },
    /// Restore factory keys and access option 0 on a sector
    Reset {
        #[arg(value_parser = parse_sector)]
        sector: Sector,
        #[arg(short, long, value_parser = parse_key)]
        key: SectorKey,
    },
    /// Derive Key A from a UID and the master secret
    DeriveKey {
        /// Card UID in hex (read from the card when omitted)
        #[arg(long)]
        uid: Option<String>,
        #[command(flatten)]
        secret: SecretArgs,
    },
    /// Issue a card: write the UID record and rotate both keys
    Encode {
        #[arg(value_parser = parse_sector)]
        sector: Sector,
        /// Exactly 5 trailing digits stored after the UID
        last_digits: String,
        #[arg(short, long, value_parser = parse_key, default_value = "FFFFFFFFFFFF")]
        key: SectorKey,
        #[arg(long, value_parser = parse_access, default_value = "0")]
        access: AccessOption,
        /// Derive Key A from the master secret instead of generating it
        #[arg(long)]
        derive: bool,
        #[command(flatten)]
        secret: SecretArgs,
    },
    /// Print reader and card events until interrupted
    Watch {
        /// Stop after this many events
        #[arg(long)]
        count: Option<usize>,
    },
}

fn main() -> ExitCode {
    // Set RUST_LOG=debug to see APDU headers and status words
    // Default: info level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = commands::ReaderOptions {
        reader: cli.reader,
        exclusive: cli.exclusive,
    };

    let result = match cli.command {
        Command::Readers => commands::readers::cmd_readers(&opts),
        Command::Status => commands::status::cmd_status(&opts),
        Command::Uid => commands::uid::cmd_uid(&opts),
        Command::Read { sector, key } => commands::read::cmd_read(&opts, sector, &key, cli.format),
        Command::Write { sector, text, key } => commands::write::cmd_write(&opts, sector, &key, &text),
        Command::ChangeKeys {
            sector,
            key,
            new_key_a,
            new_key_b,
            access,
        } => commands::change_keys::cmd_change_keys(&opts, sector, &key, &new_key_a, &new_key_b, access),
        Command::Reset { sector, key } => commands::reset::cmd_reset(&opts, sector, &key),
        Command::DeriveKey { uid, secret } => {
            commands::derive_key::cmd_derive_key(&opts, uid.as_deref(), secret.secret.as_deref(), &secret.label)
        }
        Command::Encode {
            sector,
            last_digits,
            key,
            access,
            derive,
            secret,
        } => {
            let key_source = if derive {
                commands::encode::derived_source(secret.secret, secret.label)
            } else {
                Ok(Default::default())
            };
            key_source.and_then(|source| {
                commands::encode::cmd_encode(&opts, sector, &last_digits, &key, access, &source)
            })
        }
        Command::Watch { count } => commands::watch::cmd_watch(&opts, count),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error ({:?}): {}", err.kind(), err);
            if err.kind() == ErrorKind::IndeterminateState {
                eprintln!("Do not reuse this sector until its keys have been verified");
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Distinct process exit status per failure class
fn exit_code(err: &CardError) -> u8 {
    match err.kind() {
        ErrorKind::InvalidInput => 2,
        ErrorKind::ReaderUnavailable => 3,
        ErrorKind::ConnectFailure => 4,
        ErrorKind::AuthenticationFailure => 5,
        ErrorKind::TransmitFailure => 6,
        ErrorKind::WriteFailure => 7,
        ErrorKind::IndeterminateState => 8,
    }
}
