// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Biogate - a biometric-gated credential vault.
//!
//! This is the binary entry point. Every command opens the preference
//! database, picks the vault strategy once, and runs a single operation.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod console_auth;
mod doctor;

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use biogate_config::model::{BiogateConfig, KeyStoreBackend};
use biogate_core::{BiogateError, BiometryStatus, Identity, PreferenceStore};
use biogate_storage::SqlitePreferences;
use biogate_vault::{KeyringKeyStore, SecureKeyStore, SoftwareKeyStore, VaultService};
use clap::{Args, Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};

use crate::console_auth::ConsoleAuthenticator;

/// Biogate - a biometric-gated credential vault.
#[derive(Parser, Debug)]
#[command(name = "biogate", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the XDG lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Account and subject that own a credential.
#[derive(Args, Debug, Clone, Copy)]
struct Target {
    /// Account slot.
    #[arg(long)]
    account: i32,
    /// Subject (bot) id within the account.
    #[arg(long)]
    subject: i64,
}

impl Target {
    fn identity(self) -> Identity {
        Identity::new(self.account, self.subject)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show biometric availability and the credential's state.
    Status {
        #[command(flatten)]
        target: Target,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Authenticate and print the stored token.
    Request {
        #[command(flatten)]
        target: Target,
        /// Text shown in the prompt.
        #[arg(long, default_value = "")]
        reason: String,
        /// Prompt title; falls back to `auth.title`.
        #[arg(long)]
        name: Option<String>,
    },
    /// Authenticate and store or revoke the token.
    Update {
        #[command(flatten)]
        target: Target,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long)]
        name: Option<String>,
        /// Read the new token from stdin.
        #[arg(long, conflicts_with = "revoke", required_unless_present = "revoke")]
        token_stdin: bool,
        /// Remove the stored token.
        #[arg(long)]
        revoke: bool,
    },
    /// List identities of an account that granted access.
    List {
        #[arg(long)]
        account: i32,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Turn off biometric unlock for an identity without deleting its token.
    Disable {
        #[command(flatten)]
        target: Target,
    },
    /// Turn biometric unlock back on.
    Enable {
        #[command(flatten)]
        target: Target,
    },
    /// Delete an identity's record and key.
    Remove {
        #[command(flatten)]
        target: Target,
    },
    /// Wipe the records of accounts `0..N`.
    Clear {
        #[arg(long)]
        accounts: i32,
    },
    /// Print the identity's device identifier.
    DeviceId {
        #[command(flatten)]
        target: Target,
    },
    /// Hash a PIN for `auth.pin_hash`.
    PinHash,
    /// Run diagnostic checks.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => biogate_config::load_and_validate_path(path),
        None => biogate_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            biogate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.general.log_level);

    let Some(command) = cli.command else {
        println!("biogate: use --help for available commands");
        return;
    };

    match run(command, &config, cli.config.as_deref()).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// Run one command. `Ok(false)` maps to exit code 1.
async fn run(
    command: Commands,
    config: &BiogateConfig,
    config_path: Option<&std::path::Path>,
) -> Result<bool, BiogateError> {
    match command {
        Commands::PinHash => {
            let pin = read_new_pin()?;
            println!("{}", console_auth::hash_pin(&pin)?);
            Ok(true)
        }
        Commands::Doctor { plain } => {
            doctor::run_doctor(config, config_path, plain).await?;
            Ok(true)
        }
        command => {
            let service = build_service(config).await?;
            run_vault_command(command, &service).await
        }
    }
}

async fn run_vault_command(command: Commands, service: &VaultService) -> Result<bool, BiogateError> {
    match command {
        Commands::Status { target, json } => {
            let status = service.status(target.identity()).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                print_status(target, &status);
            }
            Ok(true)
        }
        Commands::Request {
            target,
            reason,
            name,
        } => {
            let reveal = service
                .request_token(target.identity(), &reason, name.as_deref())
                .await?;
            if !reveal.success {
                eprintln!("biogate: token not revealed");
                return Ok(false);
            }
            match reveal.token {
                Some(token) => println!("{}", token.expose_secret()),
                None => eprintln!("biogate: no token stored"),
            }
            Ok(true)
        }
        Commands::Update {
            target,
            reason,
            name,
            token_stdin,
            revoke: _,
        } => {
            let token = if token_stdin {
                Some(read_token_from_stdin()?)
            } else {
                None
            };
            let stored = service
                .update_token(target.identity(), &reason, name.as_deref(), token)
                .await?;
            if !stored {
                eprintln!("biogate: token not updated");
            }
            Ok(stored)
        }
        Commands::List { account, json } => {
            let identities = service.list_protected_identities(account).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&identities).unwrap_or_else(|_| "[]".to_string())
                );
            } else if identities.is_empty() {
                println!("  no protected identities for account {account}");
            } else {
                for entry in identities {
                    let state = if entry.enabled { "enabled" } else { "disabled" };
                    println!("  {:<20} {state}", entry.subject);
                }
            }
            Ok(true)
        }
        Commands::Disable { target } => {
            service.set_disabled(target.identity(), true).await?;
            Ok(true)
        }
        Commands::Enable { target } => {
            service.set_disabled(target.identity(), false).await?;
            Ok(true)
        }
        Commands::Remove { target } => {
            service.remove(target.identity()).await?;
            Ok(true)
        }
        Commands::Clear { accounts } => {
            service.clear_all(0..accounts.max(0)).await?;
            Ok(true)
        }
        Commands::DeviceId { target } => {
            println!("{}", service.device_id(target.identity()).await?);
            Ok(true)
        }
        Commands::PinHash | Commands::Doctor { .. } => {
            Err(BiogateError::Internal("command does not use the vault".to_string()))
        }
    }
}

fn print_status(target: Target, status: &BiometryStatus) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!();
    println!("  biogate status ({}/{})", target.account, target.subject);
    println!("  {}", "-".repeat(40));
    match &status.kind {
        Some(kind) if status.available => println!("  {:<18} {kind}", "authenticator"),
        _ => println!("  {:<18} unavailable", "authenticator"),
    }
    println!("  {:<18} {}", "access requested", yes_no(status.access_requested));
    println!("  {:<18} {}", "access granted", yes_no(status.access_granted));
    println!("  {:<18} {}", "token saved", yes_no(status.token_saved));
    println!("  {:<18} {}", "device id", status.device_id);
    println!();
}

/// Key store selected by `vault.keystore`.
pub(crate) fn build_keystore(backend: KeyStoreBackend) -> Option<Arc<dyn SecureKeyStore>> {
    match backend {
        KeyStoreBackend::Keyring => Some(Arc::new(KeyringKeyStore::default())),
        KeyStoreBackend::Memory => Some(Arc::new(SoftwareKeyStore::new())),
        KeyStoreBackend::None => None,
    }
}

async fn build_service(config: &BiogateConfig) -> Result<VaultService, BiogateError> {
    let prefs: Arc<dyn PreferenceStore> = Arc::new(SqlitePreferences::open(&config.storage).await?);
    let keystore = build_keystore(config.vault.keystore);
    let authenticator = Arc::new(ConsoleAuthenticator::from_config(&config.auth));
    Ok(VaultService::new(prefs, keystore, authenticator, config))
}

fn read_token_from_stdin() -> Result<SecretString, BiogateError> {
    let mut token = String::new();
    std::io::stdin()
        .read_to_string(&mut token)
        .map_err(|e| BiogateError::Internal(format!("failed to read token from stdin: {e}")))?;
    let trimmed_len = token.trim_end_matches(['\r', '\n']).len();
    token.truncate(trimmed_len);
    Ok(SecretString::from(token))
}

fn read_new_pin() -> Result<SecretString, BiogateError> {
    if !std::io::stdin().is_terminal() {
        let mut pin = String::new();
        std::io::stdin()
            .read_line(&mut pin)
            .map_err(|e| BiogateError::Internal(format!("failed to read PIN: {e}")))?;
        let pin = pin.trim_end_matches(['\r', '\n']).to_string();
        if pin.is_empty() {
            return Err(BiogateError::Config("PIN must not be empty".to_string()));
        }
        return Ok(SecretString::from(pin));
    }

    let pin = rpassword::prompt_password("New PIN: ")
        .map_err(|e| BiogateError::Internal(format!("failed to read PIN: {e}")))?;
    let confirm = rpassword::prompt_password("Confirm PIN: ")
        .map_err(|e| BiogateError::Internal(format!("failed to read PIN: {e}")))?;
    if pin.is_empty() {
        return Err(BiogateError::Config("PIN must not be empty".to_string()));
    }
    if pin != confirm {
        return Err(BiogateError::Config("PINs do not match".to_string()));
    }
    Ok(SecretString::from(pin))
}

/// Initialize tracing on stderr so stdout carries only command output.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("biogate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
