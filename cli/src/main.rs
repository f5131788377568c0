//! LCP command-line tool
//!
//! Opens a license, checks it against the configured root certificate and
//! revocation lists, and decrypts publication resources with it.
//!
//! Usage:
//!   lcp-tool --root-cert root.der inspect book.lcpl
//!   lcp-tool --root-cert root.der decrypt book.lcpl --passphrase secret \
//!       --input chapter1.xhtml --output chapter1.plain.xhtml

use std::{fs::File, io::BufReader, io::BufWriter, path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lcp_crypto::AES256_CBC_URI;
use lcp_license::{HttpNetProvider, LicenseService, ServiceContext};
use lcp_tool::{LicenseSummary, Unlock};
use lcp_types::MemoryStorageProvider;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "lcp-tool")]
#[command(about = "Inspect, verify and decrypt LCP-protected publications")]
struct Args {
    /// Path to a TOML service configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root certificate, DER or base64
    #[arg(long)]
    root_cert: Option<PathBuf>,

    /// CRL fetched before any certificate has been seen
    #[arg(long)]
    crl_url: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print what a license grants, without verifying it
    Inspect { license: PathBuf },

    /// Verify the certificate chain, revocation status and signature
    Verify {
        license: PathBuf,

        /// Also fetch the license status document
        #[arg(long)]
        check_status: bool,
    },

    /// Decrypt one publication resource
    Decrypt {
        license: PathBuf,

        #[arg(long, conflicts_with = "user_key")]
        passphrase: Option<String>,

        /// Hex SHA-256 of the passphrase
        #[arg(long)]
        user_key: Option<String>,

        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = AES256_CBC_URI)]
        algorithm: String,

        #[arg(long)]
        check_status: bool,
    },

    /// Print the SHA-256 of a file
    Hash { file: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = lcp_tool::load_config(
        args.config.as_deref(),
        args.root_cert.as_deref(),
        args.crl_url.as_deref(),
    )?;
    let net = Arc::new(HttpNetProvider::new()?);
    let service = LicenseService::new(ServiceContext::new(
        config,
        net,
        Arc::new(MemoryStorageProvider::new()),
    ));

    let outcome = run(&service, args.command);
    service.shutdown();
    outcome
}

fn run(service: &LicenseService, command: Command) -> Result<()> {
    match command {
        Command::Inspect { license } => {
            let raw = lcp_tool::read_license(&license)?;
            let license = service.open_license(&raw)?;
            let summary = LicenseSummary::from_license(&license);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Verify {
            license,
            check_status,
        } => {
            let raw = lcp_tool::read_license(&license)?;
            let license = lcp_tool::open_verified(service, &raw, check_status)?;
            println!("{}: verified", license.id());
            if let Some(document) = license.status_document() {
                println!("status: {}", document.status);
            }
        }
        Command::Decrypt {
            license,
            passphrase,
            user_key,
            input,
            output,
            algorithm,
            check_status,
        } => {
            let raw = lcp_tool::read_license(&license)?;
            let license = lcp_tool::open_verified(service, &raw, check_status)?;
            let unlock = match (passphrase, user_key) {
                (Some(passphrase), _) => Unlock::Passphrase(passphrase),
                (None, Some(user_key)) => Unlock::UserKey(user_key),
                (None, None) => Unlock::Stored,
            };
            lcp_tool::unlock(service, &license, &unlock)?;

            let reader = BufReader::new(
                File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?,
            );
            let mut writer = BufWriter::new(
                File::create(&output)
                    .with_context(|| format!("Failed to create {}", output.display()))?,
            );
            let written =
                lcp_tool::decrypt_stream(service, &license, reader, &mut writer, &algorithm)?;
            info!(bytes = written, output = %output.display(), "resource decrypted");
        }
        Command::Hash { file } => {
            println!("{}", lcp_tool::file_hash(service, &file)?);
        }
    }
    Ok(())
}
