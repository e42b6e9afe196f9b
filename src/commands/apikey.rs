//! `warden api-key`: manage locally issued bearer credentials. Keys are
//! minted and revoked directly against the local admission database; there
//! is no hosted platform API involved.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use console::style;

use crate::admission::{apikey, ApiKeyRecord, AuthStore};
use crate::config;

#[derive(Args)]
pub struct ApiKeyArgs {
    #[command(subcommand)]
    pub command: ApiKeyCommand,
}

#[derive(Subcommand)]
pub enum ApiKeyCommand {
    /// Mint a new API key and print its secret once.
    Create(CreateApiKeyArgs),
    /// List known API keys (secrets are never shown again).
    List,
    /// Revoke an API key by id.
    Revoke(RevokeApiKeyArgs),
}

#[derive(Args)]
pub struct CreateApiKeyArgs {
    /// Human-readable label for this key.
    #[arg(long, default_value = "cli")]
    pub label: String,

    /// Owning principal id.
    #[arg(long, default_value = "operator")]
    pub owner: String,

    /// Per-key requests-per-minute override (falls back to the relay's global limit).
    #[arg(long)]
    pub rate_limit_rpm: Option<u32>,
}

#[derive(Args)]
pub struct RevokeApiKeyArgs {
    /// API key id to revoke.
    pub key_id: String,
}

pub fn run(args: ApiKeyArgs) -> Result<()> {
    let dir = config::ensure_data_dir()?;
    let store = AuthStore::open(&config::auth_db_path(&dir)).context("failed to open auth database")?;

    match args.command {
        ApiKeyCommand::Create(args) => run_create(&store, args),
        ApiKeyCommand::List => run_list(&store),
        ApiKeyCommand::Revoke(args) => run_revoke(&store, args),
    }
}

fn run_create(store: &AuthStore, args: CreateApiKeyArgs) -> Result<()> {
    let generated = apikey::generate();
    let id = apikey::short_id();

    store.insert_api_key(&ApiKeyRecord {
        id: id.clone(),
        secret_hash: generated.secret_hash,
        owner_id: args.owner,
        label: args.label,
        scopes: vec!["relay".to_string()],
        created_at: chrono::Utc::now().to_rfc3339(),
        expires_at: None,
        revoked: false,
        rate_limit_rpm: args.rate_limit_rpm,
    })?;

    println!("{}", style("API key created").green().bold());
    println!("  {} {}", style("Id:").dim(), id);
    println!();
    println!(
        "{}",
        style("Save this secret now - it will not be shown again:").yellow().bold()
    );
    println!("  {}", style(&generated.raw_secret).cyan().bold());

    Ok(())
}

fn run_list(store: &AuthStore) -> Result<()> {
    let keys = store.list_api_keys()?;
    if keys.is_empty() {
        println!("no API keys");
        return Ok(());
    }
    for key in keys {
        println!(
            "{:<16} {:<10} owner={:<12} label={:<16} {}",
            key.id,
            if key.revoked { "revoked" } else { "active" },
            key.owner_id,
            key.label,
            key.created_at,
        );
    }
    Ok(())
}

fn run_revoke(store: &AuthStore, args: RevokeApiKeyArgs) -> Result<()> {
    store.revoke_api_key(&args.key_id)?;
    println!("{} {}", style("revoked").green().bold(), args.key_id);
    Ok(())
}
