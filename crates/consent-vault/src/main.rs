//! `consent-vault` operator CLI.
//!
//! - `consent-vault init` - create or load the master key pair
//! - `consent-vault policy` - show a subject's current policy
//! - `consent-vault seal` / `open` - write and read encrypted fields
//! - `consent-vault assign` / `attributes` / `clear` - attribute assignments
//! - `consent-vault erase` - delete a subject's fields

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use consent_vault::{telemetry, AccessOutcome, PrincipalId, Vault, VaultConfig};
use consent_vault_crypto::Keyring;

/// Consent-driven field encryption.
#[derive(Parser)]
#[command(name = "consent-vault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Directory holding the master key pair.
    #[arg(long, env = "CONSENT_VAULT_KEY_DIR", default_value = "./keys", global = true)]
    key_dir: PathBuf,

    /// SQLite database file.
    #[arg(long, env = "CONSENT_VAULT_DB", default_value = "consent-vault.db", global = true)]
    database: PathBuf,

    /// Hours a pending revocation keeps granting access.
    #[arg(long, env = "CONSENT_VAULT_GRACE_HOURS", default_value_t = 24, global = true)]
    grace_hours: i64,
}

impl From<ConfigArgs> for VaultConfig {
    fn from(args: ConfigArgs) -> Self {
        VaultConfig::new(args.key_dir, args.database).with_grace_hours(args.grace_hours)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the master key pair, or verify the existing one, and print its id.
    Init,

    /// Print the policy new fields of a subject would be sealed under.
    Policy {
        #[arg(long)]
        subject: PrincipalId,
    },

    /// Encrypt and store a field value.
    Seal {
        #[arg(long)]
        subject: PrincipalId,
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
    },

    /// Decrypt a stored field on behalf of a requester.
    ///
    /// Exits with status 2 when the requester is not authorized.
    Open {
        #[arg(long)]
        requester: PrincipalId,
        #[arg(long)]
        subject: PrincipalId,
        #[arg(long)]
        field: String,
    },

    /// Replace the attributes a principal holds.
    Assign {
        #[arg(long)]
        principal: PrincipalId,
        #[arg(long = "attribute", required = true)]
        attributes: Vec<String>,
    },

    /// Show the attributes a principal holds.
    Attributes {
        #[arg(long)]
        principal: PrincipalId,
    },

    /// Remove every attribute of a principal.
    Clear {
        #[arg(long)]
        principal: PrincipalId,
    },

    /// Delete every stored field of a subject.
    Erase {
        #[arg(long)]
        subject: PrincipalId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    telemetry::init()?;

    let cli = Cli::parse();
    let config = VaultConfig::from(cli.config);

    if let Commands::Init = cli.command {
        let keyring = Keyring::initialize(&config.key_dir)
            .with_context(|| format!("initializing keys in {}", config.key_dir.display()))?;
        println!("{}", keyring.key_id());
        return Ok(ExitCode::SUCCESS);
    }

    let vault = Vault::open(&config).context("opening vault")?;

    match cli.command {
        Commands::Init => {}
        Commands::Policy { subject } => {
            println!("{}", vault.current_policy(subject).await?);
        }
        Commands::Seal {
            subject,
            field,
            value,
        } => {
            let policy = vault.seal_field(subject, &field, &value).await?;
            println!("{policy}");
        }
        Commands::Open {
            requester,
            subject,
            field,
        } => match vault.open_field(requester, subject, &field).await? {
            AccessOutcome::Granted(plaintext) => println!("{plaintext}"),
            AccessOutcome::NotAuthorized => {
                eprintln!("not authorized");
                return Ok(ExitCode::from(2));
            }
        },
        Commands::Assign {
            principal,
            attributes,
        } => {
            let assignment = vault.assign_attributes(principal, attributes).await?;
            println!(
                "{} v{}: {}",
                principal,
                assignment.version,
                assignment.attributes.names().join(", ")
            );
        }
        Commands::Attributes { principal } => match vault.attributes_of(principal).await? {
            Some(assignment) => {
                for name in assignment.attributes.names() {
                    println!("{name}");
                }
            }
            None => eprintln!("no attributes assigned to {principal}"),
        },
        Commands::Clear { principal } => {
            if !vault.clear_attributes(principal).await? {
                eprintln!("no attributes assigned to {principal}");
            }
        }
        Commands::Erase { subject } => {
            let deleted = vault.erase_subject(subject).await?;
            println!("deleted {deleted} fields");
        }
    }

    Ok(ExitCode::SUCCESS)
}
