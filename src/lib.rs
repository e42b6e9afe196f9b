//! `warden`: a local mediation proxy for AI agent tool calls, producing a
//! signed, hash-chained audit trail of every policy and risk decision.

pub mod admission;
pub mod canonical;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod relay;
pub mod risk;
