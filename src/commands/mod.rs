//! CLI subcommands. Each module owns one `clap::Args` struct and a
//! `run(args) -> anyhow::Result<()>` entry point.

pub mod apikey;
pub mod keygen;
pub mod ledger;
pub mod policy;
pub mod run;
