#![forbid(unsafe_code)]

//! duisign CLI — validate, sign, verify and serve DUIS messages.

mod server;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use duisign_core::Result;
use duisign_credentials::{
    CredentialStore, FileCredentials, SigningCredentials, VerifyingCredentials,
};
use duisign_dsig::Verified;

#[derive(Parser)]
#[command(
    name = "duisign",
    about = "DUIS XML digital signing for DCC Boxed",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schema-validate and sign a DUIS message
    Sign {
        /// Input XML file (stdin when omitted)
        file: Option<PathBuf>,

        /// Keep the RequestID counter instead of stamping a fresh one
        #[arg(long)]
        preserve_counter: bool,

        /// Directory holding the standard credential set
        #[arg(long, default_value = "credentials")]
        credentials: PathBuf,

        /// Sign with an explicit certificate instead of the store
        #[arg(long, requires = "key")]
        cert: Option<PathBuf>,

        /// Private key matching --cert
        #[arg(long, requires = "cert")]
        key: Option<PathBuf>,
    },

    /// Schema-validate a DUIS message and check its signature
    Verify {
        /// Input XML file (stdin when omitted)
        file: Option<PathBuf>,

        /// Directory holding the standard credential set
        #[arg(long, default_value = "credentials")]
        credentials: PathBuf,

        /// Verify against an explicit certificate instead of the store
        #[arg(long)]
        cert: Option<PathBuf>,
    },

    /// Schema-validate a DUIS message
    Validate {
        /// Input XML file (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Run the HTTP signing service
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Directory holding the standard credential set
        #[arg(long, default_value = "credentials")]
        credentials: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!("{e}");
        process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sign {
            file,
            preserve_counter,
            credentials,
            cert,
            key,
        } => cmd_sign(file.as_deref(), preserve_counter, &credentials, cert, key),
        Commands::Verify {
            file,
            credentials,
            cert,
        } => cmd_verify(file.as_deref(), &credentials, cert),
        Commands::Validate { file } => cmd_validate(file.as_deref()),
        Commands::Serve { port, credentials } => cmd_serve(port, &credentials),
    }
}

fn cmd_sign(
    file: Option<&Path>,
    preserve_counter: bool,
    credentials: &Path,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
) -> Result<()> {
    let document = read_input(file)?;
    duisign_schema::validate(&document)?;
    tracing::info!("passed schema validation");

    let resolver: Box<dyn SigningCredentials> = match (cert, key) {
        (Some(cert), Some(key)) => Box::new(FileCredentials::load(&cert, &key)?),
        _ => Box::new(CredentialStore::load_dir(credentials)?),
    };

    let (signed, certificate) = duisign_dsig::sign(preserve_counter, &document, resolver.as_ref())?;
    tracing::info!(serial = %certificate.serial(), "message signed");
    write_output(&signed)
}

fn cmd_verify(file: Option<&Path>, credentials: &Path, cert: Option<PathBuf>) -> Result<()> {
    let document = read_input(file)?;
    duisign_schema::validate(&document)?;
    tracing::info!("passed schema validation");

    let resolver: Box<dyn VerifyingCredentials> = match cert {
        Some(cert) => Box::new(FileCredentials::load_certificate(&cert)?),
        None => Box::new(CredentialStore::load_dir(credentials)?),
    };

    match duisign_dsig::verify(&document, resolver.as_ref())? {
        Verified::Payload(payload) => {
            tracing::info!("passed signature check");
            write_output(&payload)
        }
        Verified::Unsigned => {
            tracing::info!("response without signature, signature check skipped");
            write_output(&document)
        }
    }
}

fn cmd_validate(file: Option<&Path>) -> Result<()> {
    let document = read_input(file)?;
    let message = duisign_schema::validate(&document)?;
    tracing::info!(kind = ?message.kind, "passed schema validation");
    Ok(())
}

fn cmd_serve(port: u16, credentials: &Path) -> Result<()> {
    let store = Arc::new(CredentialStore::load_dir(credentials)?);
    tracing::info!(identities = store.len(), "credential store loaded");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(port, store))
}

fn read_input(file: Option<&Path>) -> Result<Vec<u8>> {
    match file {
        Some(path) => Ok(std::fs::read(path)?),
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn write_output(data: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(data)?;
    stdout.write_all(b"\n")?;
    Ok(())
}
