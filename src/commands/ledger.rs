//! `warden ledger`: inspect and verify the signed audit ledger.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use console::style;

use crate::config;
use crate::crypto::hash::public_key_fingerprint;
use crate::ledger::{verify_chain, ChainViolation, LedgerStore};

#[derive(Args)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand)]
pub enum LedgerCommand {
    /// Walk the full chain and report any broken links or bad signatures.
    Verify,
    /// Print the last N records as JSON.
    Show {
        #[arg(long, default_value_t = 20)]
        last: i64,
    },
    /// Export the full ledger as a JSON array.
    Export {
        #[arg(long)]
        out: std::path::PathBuf,
    },
}

pub fn run(args: LedgerArgs) -> Result<()> {
    let dir = config::data_dir()?;
    let store = LedgerStore::open(&config::audit_db_path(&dir))
        .context("failed to open audit ledger")?;

    match args.command {
        LedgerCommand::Verify => run_verify(&store),
        LedgerCommand::Show { last } => run_show(&store, last),
        LedgerCommand::Export { out } => run_export(&store, &out),
    }
}

fn run_verify(store: &LedgerStore) -> Result<()> {
    let records = store.get_all()?;
    let violations = verify_chain(&records)?;

    if violations.is_empty() {
        println!(
            "{} {} record(s), chain intact",
            style("OK:").green().bold(),
            records.len()
        );
        return Ok(());
    }

    for violation in &violations {
        match violation {
            ChainViolation::BadSignature { id } => {
                let signer = records
                    .iter()
                    .find(|r| r.id == *id)
                    .map(|r| public_key_fingerprint(&r.public_key))
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "{} record {id} has an invalid signature (key {signer})",
                    style("FAIL:").red().bold()
                );
            }
            ChainViolation::BrokenLink { id, expected_prev_hash } => {
                println!(
                    "{} record {id} prev_hash does not match the previous record's signature (expected {expected_prev_hash})",
                    style("FAIL:").red().bold()
                );
            }
        }
    }
    anyhow::bail!("{} chain violation(s) found", violations.len());
}

fn run_show(store: &LedgerStore, last: i64) -> Result<()> {
    let records = store.get_last(last)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn run_export(store: &LedgerStore, out: &std::path::Path) -> Result<()> {
    let records = store.get_all()?;
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(out, json).with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "{} exported {} record(s) to {}",
        style("OK:").green().bold(),
        records.len(),
        out.display()
    );
    Ok(())
}
