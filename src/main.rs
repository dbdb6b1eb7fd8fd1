use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

use wildmask_dns::config::{Config, Overrides};
use wildmask_dns::daemon;

#[derive(Parser)]
#[command(name = "wildmask-dns")]
#[command(about = "Local development DNS daemon", long_about = None)]
struct Args {
    /// TOML config file with domain, resolver settings and mappings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Local port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Domain the mappings live under
    #[arg(short, long)]
    domain: Option<String>,

    /// Upstream DNS server, repeatable (tried in order)
    #[arg(short, long)]
    upstream: Vec<String>,

    /// TTL in seconds for answers built from mappings
    #[arg(short, long)]
    ttl: Option<u32>,

    /// Log every query (domain, outcome, timing)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            bind: self.bind,
            port: self.port,
            domain: self.domain.clone(),
            upstream_dns: self.upstream.clone(),
            ttl: self.ttl,
            verbose: self.verbose,
        }
    }

    fn load_config(&self, overrides: &Overrides) -> wildmask_dns::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,wildmask_dns={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    let args = Args::parse();

    let overrides = args.overrides();
    let config = match args.load_config(&overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("wildmask-dns: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging.level);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(daemon::run(config, args.config, overrides)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "DNS daemon failed");
            ExitCode::FAILURE
        }
    }
}
