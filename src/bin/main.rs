//! Certificate store signer CLI
//!
//! Selects an identity from the certificate store, prints its certificate or
//! subject, signs files with its private key, and serves the operation
//! surface as JSON lines over stdio.

use base64::Engine as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use certstore_signer::{
    config::{BackendKind, ConfigManager, ExportFormat, SignerConfiguration},
    connect_backend,
    error::SigningError,
    services::{compute_digest, compute_digest_named},
    CertificateOperations, HashAlgorithm, MethodCall, MethodResponse, OperationOptions,
};

#[derive(Parser)]
#[command(name = "certstore-signer")]
#[command(about = "Sign data with identities from the user's certificate store")]
#[command(long_about = "
Certificate Store Signer - select a certificate and sign with its private key

EXAMPLES:
    # Pick a certificate from the personal store and print it
    certstore-signer select

    # Sign a file with SHA-384, writing the raw signature
    certstore-signer sign --input payload.bin --output payload.sig --algorithm sha-384

    # Use a PKCS#12 file instead of the system store
    certstore-signer sign --input payload.bin --pkcs12 identity.p12 --base64

    # Serve selectCertificate/certificateSubject/signData as JSON lines
    certstore-signer serve

ENVIRONMENT VARIABLES:
    CERTSTORE_PKCS12_PASSWORD   Password of the PKCS#12 file
    RUST_LOG                    Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that touches a store.
#[derive(Args, Clone)]
struct StoreArgs {
    /// Certificate store name (overrides config)
    #[arg(long, value_name = "STORE")]
    store: Option<String>,

    /// Load the identity from a PKCS#12 file instead of the system store
    #[arg(long, value_name = "FILE")]
    pkcs12: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reject unrecognized algorithm names
    #[arg(long)]
    strict: bool,

    /// Enable debug logging (overrides config)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a certificate and print it as PEM
    Select {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Select a certificate and print its display subject
    Subject {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Select a certificate and sign a file with its private key
    Sign {
        /// File whose contents are signed
        #[arg(short, long, value_name = "INPUT_FILE")]
        input: PathBuf,

        /// Signature output file (defaults to base64 on stdout)
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// Hash algorithm (sha-1, sha-256, sha-384, sha-512)
        #[arg(short, long, value_name = "ALGORITHM")]
        algorithm: Option<String>,

        /// Write the signature base64-encoded
        #[arg(long)]
        base64: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print the hex digest of a file
    Digest {
        /// File to hash
        #[arg(short, long, value_name = "INPUT_FILE")]
        input: PathBuf,

        /// Hash algorithm (sha-1, sha-256, sha-384, sha-512); unrecognized
        /// names hash with SHA-256
        #[arg(short, long, value_name = "ALGORITHM", default_value = "sha-256")]
        algorithm: String,

        /// Reject unrecognized algorithm names
        #[arg(long)]
        strict: bool,
    },

    /// Answer method calls read as JSON lines from stdin
    Serve {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
        }
    }
}

impl Commands {
    fn store_args(&self) -> Option<&StoreArgs> {
        match self {
            Commands::Select { store }
            | Commands::Subject { store }
            | Commands::Sign { store, .. }
            | Commands::Serve { store } => Some(store),
            Commands::Digest { .. } | Commands::Config(_) => None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(&cli.command)),
    )
    .init();

    match cli.command {
        Commands::Select { store } => {
            let operations = connect(&store)?;
            print!("{}", operations.select_certificate()?);
        }

        Commands::Subject { store } => {
            let operations = connect(&store)?;
            operations.select_certificate()?;
            println!("{}", operations.certificate_subject()?);
        }

        Commands::Sign {
            input,
            output,
            algorithm,
            base64,
            store,
        } => {
            handle_sign_command(&input, output, algorithm.as_deref(), base64, &store)?;
        }

        Commands::Digest {
            input,
            algorithm,
            strict,
        } => {
            let data = std::fs::read(&input)
                .into_diagnostic()
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let digest = if strict {
                compute_digest(&data, algorithm.parse::<HashAlgorithm>()?)
            } else {
                compute_digest_named(&data, Some(algorithm.as_str()))
            };
            println!("{}", digest.to_hex());
        }

        Commands::Serve { store } => {
            let operations = connect(&store)?;
            serve(&operations)?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(config_cmd)?;
        }
    }

    Ok(())
}

/// `debug` when verbose output is requested on the command line or in the
/// configuration file, `info` otherwise. `RUST_LOG` still takes precedence.
fn default_log_filter(command: &Commands) -> &'static str {
    let args = command.store_args();
    if args.is_some_and(|args| args.verbose) {
        return "debug";
    }
    let manager = match args {
        Some(args) => config_manager(args).ok(),
        None => ConfigManager::new().ok(),
    };
    let verbose = manager
        .and_then(|manager| manager.load_or_default().ok())
        .is_some_and(|config| config.verbose);
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn config_manager(args: &StoreArgs) -> Result<ConfigManager> {
    Ok(match &args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    })
}

/// Load configuration, apply command-line overrides and open the backend.
fn connect(args: &StoreArgs) -> Result<CertificateOperations> {
    let manager = config_manager(args)?;
    let mut config = manager
        .load_or_default()
        .wrap_err("Failed to load configuration")?;
    apply_overrides(&mut config, args);
    config.validate()?;

    let backend = connect_backend(&config)?;
    log::debug!("Connected to {}", backend.backend_type());
    let options = OperationOptions::from_config(&config)?;
    Ok(CertificateOperations::new(backend, options))
}

fn apply_overrides(config: &mut SignerConfiguration, args: &StoreArgs) {
    if let Some(store) = &args.store {
        config.store_name.clone_from(store);
    }
    if let Some(path) = &args.pkcs12 {
        config.backend = BackendKind::Pkcs12;
        config.pkcs12_path = Some(path.clone());
    }
    if args.strict {
        config.strict_algorithm_names = true;
    }
    if args.verbose {
        config.verbose = true;
    }
}

fn handle_sign_command(
    input: &Path,
    output: Option<PathBuf>,
    algorithm: Option<&str>,
    base64: bool,
    store: &StoreArgs,
) -> Result<()> {
    let data = std::fs::read(input)
        .into_diagnostic()
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let operations = connect(store)?;
    operations.select_certificate()?;
    let subject = operations.certificate_subject()?;
    let signature = operations.sign_data(algorithm, &data)?;
    log::info!("Signed {} as '{subject}'", input.display());

    let encoded = base64::engine::general_purpose::STANDARD.encode(&signature);
    match output {
        Some(path) => {
            let bytes = if base64 {
                encoded.into_bytes()
            } else {
                signature
            };
            std::fs::write(&path, bytes)
                .into_diagnostic()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Signature written to {}", path.display());
        }
        None => println!("{encoded}"),
    }
    Ok(())
}

/// One JSON `MethodCall` per input line, one JSON `MethodResponse` per
/// output line, until stdin closes.
fn serve(operations: &CertificateOperations) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.into_diagnostic().context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<MethodCall>(&line) {
            Ok(call) => operations.handle(&call),
            Err(e) => {
                MethodResponse::from(&SigningError::InvalidInput(format!("Malformed request: {e}")))
            }
        };
        let encoded = serde_json::to_string(&response).into_diagnostic()?;
        writeln!(stdout, "{encoded}").into_diagnostic()?;
        stdout.flush().into_diagnostic()?;
    }
    operations.clear();
    Ok(())
}

fn handle_config_command(config_cmd: ConfigCommands) -> Result<()> {
    let config_manager = ConfigManager::new()?;

    match config_cmd {
        ConfigCommands::Show => {
            let config = config_manager.load_or_default()?;
            println!("Current configuration ({}):", config_manager.config_path().display());
            println!("  Store: {}", config.store_name);
            println!("  Hash algorithm: {}", config.default_hash_algorithm);
            println!("  Strict algorithm names: {}", config.strict_algorithm_names);
            println!("  Backend: {:?}", config.backend);
            if let Some(path) = &config.pkcs12_path {
                println!("  PKCS#12 file: {}", path.display());
            }
            println!("  Verbose: {}", config.verbose);
        }

        ConfigCommands::Init => {
            let config = SignerConfiguration::default();
            config_manager.save(&config)?;
            println!(
                "Created default configuration: {}",
                config_manager.config_path().display()
            );
        }

        ConfigCommands::Set { key, value } => {
            config_manager.update_value(&key, &value)?;
            println!("Set {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager.export_config(format.into())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .into_diagnostic()
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Configuration exported to {}", path.display());
                }
                None => print!("{content}"),
            }
        }
    }

    Ok(())
}
