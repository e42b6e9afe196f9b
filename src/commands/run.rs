//! `warden run`: start the relay against one upstream server, over either
//! transport.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::admission::{AuthStore, RateLimitConfig, RateLimiter};
use crate::config;
use crate::crypto::keystore::{load_private_key, KeystoreLoad};
use crate::ledger::LedgerStore;
use crate::relay::http::{serve, HttpState};
use crate::relay::{stdio, AuditLogger, DecisionCore};
use crate::risk::{RiskEngine, SqliteBehaviorStore};

#[derive(Args)]
pub struct RunArgs {
    /// Name of the upstream server as it appears in the server policies.
    #[arg(long)]
    pub server: String,

    /// Passphrase for an encrypted keystore; falls back to WARDEN_KEYSTORE_PASSPHRASE.
    #[arg(long)]
    pub passphrase: Option<String>,

    #[command(subcommand)]
    pub transport: Transport,
}

#[derive(Subcommand)]
pub enum Transport {
    /// Spawn a child MCP server and mediate its stdio.
    Stdio {
        /// Command to spawn.
        command: String,
        /// Arguments passed to the spawned command.
        args: Vec<String>,
    },
    /// Serve a local JSON-RPC HTTP endpoint that forwards to an upstream URL.
    Http {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8787")]
        listen: String,
        /// Upstream JSON-RPC endpoint to forward allowed requests to.
        #[arg(long)]
        upstream: String,
        /// Require a bearer token (API key or session) on every request.
        #[arg(long)]
        require_auth: bool,
    },
}

pub fn run(args: RunArgs) -> Result<()> {
    let dir = config::data_dir()?;
    let policy = config::load_policy(&dir)?;
    let policy_hash = config::policy_hash(&policy)?;

    let passphrase = args.passphrase.clone().or_else(config::keystore_passphrase);
    let keypair = match load_private_key(&config::private_key_path(&dir), passphrase.as_deref()) {
        KeystoreLoad::Loaded(kp) => kp,
        KeystoreLoad::Absent => {
            anyhow::bail!("no operator key found at {}; run `warden keygen` first", config::private_key_path(&dir).display())
        }
        KeystoreLoad::NeedsPassphrase => {
            anyhow::bail!("operator key is passphrase-encrypted; pass --passphrase or set WARDEN_KEYSTORE_PASSPHRASE")
        }
        KeystoreLoad::BadPassphrase => anyhow::bail!("wrong passphrase for operator key"),
        KeystoreLoad::Malformed(msg) => anyhow::bail!("operator key is malformed: {msg}"),
    };

    let ledger_store = LedgerStore::open(&config::audit_db_path(&dir)).context("failed to open audit ledger")?;
    let behavior_store = SqliteBehaviorStore::open(&config::behavior_db_path(&dir)).context("failed to open behavior store")?;

    let logger = AuditLogger::new(ledger_store, keypair, policy_hash);
    let risk = RiskEngine::new(behavior_store);
    let core = DecisionCore {
        policy: Arc::new(policy.clone()),
        risk: Arc::new(risk),
        logger: Arc::new(logger),
        server_name: args.server.clone(),
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;

    match args.transport {
        Transport::Stdio { command, args: child_args } => {
            let exit_code = runtime.block_on(stdio::run(&command, &child_args, core, "local"))?;
            std::process::exit(exit_code);
        }
        Transport::Http { listen, upstream, require_auth } => {
            url::Url::parse(&upstream).context("--upstream must be a valid URL")?;

            let auth = if require_auth {
                Some(Arc::new(
                    AuthStore::open(&config::auth_db_path(&dir)).context("failed to open auth database")?,
                ))
            } else {
                None
            };
            let rate_limiter = policy.rate_limit.map(|rl| {
                Arc::new(RateLimiter::new(RateLimitConfig {
                    global_rpm: rl.requests_per_minute,
                    burst: rl.burst,
                }))
            });

            let state = HttpState {
                core,
                auth,
                rate_limiter,
                upstream_url: upstream,
                http_client: reqwest::Client::new(),
            };

            tracing::info!(listen = %listen, "warden relay listening");
            runtime.block_on(serve(&listen, state))?;
        }
    }

    Ok(())
}
