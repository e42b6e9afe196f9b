//! `warden keygen`: generate the operator Ed25519 keypair used to sign
//! ledger records.

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use crate::config;
use crate::crypto::ed25519::KeyPair;
use crate::crypto::hash::public_key_fingerprint;
use crate::crypto::keystore::{save_private_key, save_public_key};

#[derive(Args)]
pub struct KeygenArgs {
    /// Encrypt the private key with a passphrase instead of writing plaintext PEM.
    /// Falls back to WARDEN_KEYSTORE_PASSPHRASE if set and this flag is absent.
    #[arg(long)]
    pub passphrase: Option<String>,

    /// Overwrite an existing keypair.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: KeygenArgs) -> Result<()> {
    let dir = config::ensure_data_dir()?;
    let private_path = config::private_key_path(&dir);
    let public_path = config::public_key_path(&dir);

    if !args.force && (private_path.exists() || public_path.exists()) {
        anyhow::bail!(
            "key files already exist:\n  {}\n  {}\nrerun with --force to overwrite",
            private_path.display(),
            public_path.display()
        );
    }

    let passphrase = args.passphrase.or_else(config::keystore_passphrase);

    let keypair = KeyPair::generate();
    save_private_key(&private_path, &keypair, passphrase.as_deref())
        .with_context(|| format!("failed to write private key to {}", private_path.display()))?;
    save_public_key(&public_path, &keypair)
        .with_context(|| format!("failed to write public key to {}", public_path.display()))?;

    let fingerprint = public_key_fingerprint(&keypair.public_key_pem()?);

    println!("{}", style("Generated operator keypair").green().bold());
    println!("  {} {}", style("Private key:").dim(), private_path.display());
    println!("  {} {}", style("Public key:").dim(), public_path.display());
    println!("  {} {}", style("Fingerprint:").dim(), fingerprint);
    if passphrase.is_some() {
        println!(
            "  {}",
            style("Private key is passphrase-encrypted (WARDEN_KEYSTORE_PASSPHRASE required to start the relay).").dim()
        );
    } else {
        println!("  {}", style("Private key is plaintext PEM (mode 0600).").dim());
    }

    Ok(())
}
