//! `warden policy`: validate and inspect the policy file.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;

use crate::config;

#[derive(Args)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Parse and validate the policy file, printing any errors.
    Validate,
    /// Print the policy file and its content hash.
    Show,
}

pub fn run(args: PolicyArgs) -> Result<()> {
    match args.command {
        PolicyCommand::Validate => run_validate(),
        PolicyCommand::Show => run_show(),
    }
}

fn run_validate() -> Result<()> {
    let dir = config::data_dir()?;
    match config::load_policy(&dir) {
        Ok(policy) => {
            println!(
                "{} {} server polic{} loaded from {}",
                style("OK:").green().bold(),
                policy.servers.len(),
                if policy.servers.len() == 1 { "y" } else { "ies" },
                config::policy_path(&dir).display()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {e:#}", style("invalid policy:").red().bold());
            Err(e)
        }
    }
}

fn run_show() -> Result<()> {
    let dir = config::data_dir()?;
    let policy = config::load_policy(&dir)?;
    let hash = config::policy_hash(&policy)?;
    println!("{}", serde_json::to_string_pretty(&policy)?);
    println!();
    println!("{} {}", style("policy_hash:").dim(), hash);
    Ok(())
}
