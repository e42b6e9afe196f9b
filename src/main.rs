use anyhow::Result;
use clap::{Parser, Subcommand};
use warden::commands::{
    self, apikey::ApiKeyArgs, keygen::KeygenArgs, ledger::LedgerArgs, policy::PolicyArgs,
    run::RunArgs,
};

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Local mediation proxy for AI agent tool calls"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the operator Ed25519 keypair used to sign ledger records
    Keygen(KeygenArgs),
    /// Start the relay against one upstream server
    Run(RunArgs),
    /// Validate and inspect the policy file
    Policy(PolicyArgs),
    /// Inspect and verify the signed audit ledger
    Ledger(LedgerArgs),
    /// Manage locally issued bearer API keys
    ApiKey(ApiKeyArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Keygen(args) => commands::keygen::run(args)?,
        Command::Run(args) => commands::run::run(args)?,
        Command::Policy(args) => commands::policy::run(args)?,
        Command::Ledger(args) => commands::ledger::run(args)?,
        Command::ApiKey(args) => commands::apikey::run(args)?,
    };

    Ok(())
}
