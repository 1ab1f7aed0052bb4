use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use safekey::config::{self, KEY_FILE_NAME};
use safekey::crypto::kdf;
use safekey::sync::{DirRemote, Snapshotter, latest_backup};
use safekey::{
    CredentialProvider, KdfParams, OsAccount, Status, VaultConfig, VaultError, VaultSession,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod auth;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KdfAlgorithm {
    Pbkdf2,
    Argon2id,
}

#[derive(Debug, clap::Args)]
struct KdfArgs {
    /// Key derivation function for the new key file
    #[arg(long, value_enum, default_value_t = KdfAlgorithm::Pbkdf2)]
    kdf: KdfAlgorithm,

    /// PBKDF2 iterations (default: 10000)
    #[arg(long)]
    iterations: Option<u32>,

    /// Argon2 memory cost in KiB (default: 65536)
    #[arg(long = "argon-mem")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations (default: 3)
    #[arg(long = "argon-time")]
    time_cost: Option<u32>,

    /// Argon2 parallelism (default: 1)
    #[arg(long = "argon-parallelism")]
    parallelism: Option<u32>,
}

impl KdfArgs {
    fn to_kdf_params(&self) -> Result<KdfParams> {
        let params = match self.kdf {
            KdfAlgorithm::Pbkdf2 => {
                KdfParams::pbkdf2(self.iterations.unwrap_or(kdf::DEFAULT_PBKDF2_ITERATIONS))?
            }
            KdfAlgorithm::Argon2id => KdfParams::argon2id(
                self.mem_cost_kib.unwrap_or(kdf::DEFAULT_ARGON2_MEM_KIB),
                self.time_cost.unwrap_or(kdf::DEFAULT_ARGON2_TIME_COST),
                self.parallelism.unwrap_or(kdf::DEFAULT_ARGON2_PARALLELISM),
            )?,
        };
        Ok(params)
    }
}

#[derive(Debug, Parser)]
#[command(name = "safekey")]
#[command(version, about = "Local secrets vault: master key management and encryption.")]
struct Cli {
    /// Path to the master key file
    #[arg(long, global = true, value_name = "PATH", env = "SAFEKEY_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Use the OS-account mode (no passphrase, the OS login is the only gate)
    #[arg(long, global = true, default_value_t = false)]
    os_account: bool,

    /// Increase log verbosity (-v info, -vv debug); SAFEKEY_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates the master key file
    Init {
        #[command(flatten)]
        kdf: KdfArgs,
    },

    /// Shows whether the vault is initialized and how it is protected
    Status,

    /// Checks the master password without changing anything
    Verify,

    /// Encrypts text and prints the envelope
    #[command(arg_required_else_help = true)]
    Encrypt { plaintext: String },

    /// Decrypts an envelope and prints the text
    #[command(arg_required_else_help = true)]
    Decrypt { envelope: String },

    /// Encrypts a whole file into an envelope file
    #[command(arg_required_else_help = true)]
    EncryptFile { input: PathBuf, output: PathBuf },

    /// Restores a file encrypted with encrypt-file
    #[command(arg_required_else_help = true)]
    DecryptFile { input: PathBuf, output: PathBuf },

    /// Replaces the master password; existing ciphertexts become unreadable
    Reset {
        /// Confirm that existing ciphertexts will be lost
        #[arg(long, default_value_t = false)]
        yes: bool,

        #[command(flatten)]
        kdf: KdfArgs,
    },

    /// Encrypted database snapshots in a sync directory
    #[command(subcommand)]
    Backup(BackupCommand),
}

#[derive(Debug, Subcommand)]
enum BackupCommand {
    /// Encrypts the database and uploads it
    Push {
        /// Sync directory acting as the remote
        #[arg(long, value_name = "DIR", env = "SAFEKEY_REMOTE_DIR")]
        remote: PathBuf,

        /// Database file to snapshot (default: platform data directory)
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,
    },

    /// Downloads the latest snapshot and decrypts it
    Pull {
        #[arg(long, value_name = "DIR", env = "SAFEKEY_REMOTE_DIR")]
        remote: PathBuf,

        output: PathBuf,
    },

    /// Shows the latest snapshot on the remote
    Status {
        #[arg(long, value_name = "DIR", env = "SAFEKEY_REMOTE_DIR")]
        remote: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("SAFEKEY_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn resolve_key_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None => Ok(config::data_dir()?.join(KEY_FILE_NAME)),
    }
}

fn provider(os_account: bool, new_password: bool) -> Result<Box<dyn CredentialProvider>> {
    if os_account {
        return Ok(Box::new(OsAccount::current()?));
    }
    Ok(if new_password {
        Box::new(auth::Prompt::new_password())
    } else {
        Box::new(auth::Prompt::existing())
    })
}

/// Loads the key. In OS-account mode a missing vault is created on the fly,
/// since that mode was chosen explicitly to avoid prompts.
fn open(session: &VaultSession, os_account: bool) -> Result<()> {
    let provider = provider(os_account, false)?;
    if os_account {
        session.ensure_ready(provider.as_ref())?;
    } else {
        session.unlock(&provider.password()?)?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = VaultConfig::new(resolve_key_path(cli.key_file)?);

    match cli.command {
        Commands::Init { kdf } => {
            let config = config.with_kdf(kdf.to_kdf_params()?);
            let session = VaultSession::new(&config);
            if session.status() != Status::Uninitialized {
                return Err(VaultError::AlreadyInitialized {
                    path: session.key_path().to_path_buf(),
                }
                .into());
            }

            session.initialize_with(provider(cli.os_account, true)?.as_ref())?;
            println!("vault initialized at {}", session.key_path().display());
        }
        Commands::Status => {
            let session = VaultSession::new(&config);
            println!("status: {}", session.status());
            println!("key file: {}", session.key_path().display());
            if session.status() != Status::Uninitialized {
                match session.key_store().key_file() {
                    Ok(file) => {
                        println!("protection: {}", file.protection());
                        println!("kdf: {}", file.kdf().algorithm());
                    }
                    Err(e) => println!("key file unreadable: {}", e.user_message()),
                }
            }
        }
        Commands::Verify => {
            let session = VaultSession::new(&config);
            open(&session, cli.os_account)?;
            println!("password verified");
        }
        Commands::Encrypt { plaintext } => {
            let session = VaultSession::new(&config);
            open(&session, cli.os_account)?;
            println!("{}", session.encrypt(&plaintext)?);
        }
        Commands::Decrypt { envelope } => {
            let session = VaultSession::new(&config);
            open(&session, cli.os_account)?;
            println!("{}", session.decrypt(&envelope)?.as_str());
        }
        Commands::EncryptFile { input, output } => {
            let session = VaultSession::new(&config);
            open(&session, cli.os_account)?;
            session.encrypt_file(&input, &output)?;
            println!("encrypted {} -> {}", input.display(), output.display());
        }
        Commands::DecryptFile { input, output } => {
            let session = VaultSession::new(&config);
            open(&session, cli.os_account)?;
            session.decrypt_file(&input, &output)?;
            println!("decrypted {} -> {}", input.display(), output.display());
        }
        Commands::Reset { yes, kdf } => {
            if !yes {
                bail!("reset makes every existing ciphertext unreadable; pass --yes to confirm");
            }
            let config = config.with_kdf(kdf.to_kdf_params()?);
            let session = VaultSession::new(&config);
            session.reset(provider(cli.os_account, true)?.as_ref())?;
            println!("master password reset");
        }
        Commands::Backup(BackupCommand::Push { remote, database }) => {
            let database = match database {
                Some(p) => p,
                None => config::default_database_path()?,
            };
            let session = VaultSession::new(&config);
            open(&session, cli.os_account)?;

            let remote = DirRemote::new(remote);
            let report = Snapshotter::new(&session, &remote)
                .push(&database)
                .with_context(|| format!("backup of {} failed", database.display()))?;
            println!(
                "uploaded {} (removed {} old snapshot(s))",
                report.name,
                report.pruned.len()
            );
        }
        Commands::Backup(BackupCommand::Pull { remote, output }) => {
            let session = VaultSession::new(&config);
            open(&session, cli.os_account)?;

            let remote = DirRemote::new(remote);
            let name = Snapshotter::new(&session, &remote).pull(&output)?;
            println!("restored {name} to {}", output.display());
        }
        Commands::Backup(BackupCommand::Status { remote }) => {
            match latest_backup(&DirRemote::new(remote))? {
                Some(name) => println!("latest snapshot: {name}"),
                None => println!("no snapshot found"),
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<VaultError>() {
                Some(e) => {
                    tracing::debug!(error = %e, "command failed");
                    eprintln!("error: {}", e.user_message());
                }
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
