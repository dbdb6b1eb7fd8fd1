//! Daemon orchestration.
//!
//! Starts the DNS server from a [`Config`], runs periodic cache maintenance
//! and reacts to process signals until asked to shut down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{Config, Overrides};
use crate::error::Result;
use crate::server::DnsServer;

/// Run the daemon with the given configuration.
///
/// Returns once Ctrl-C or `SIGTERM` is received and the server has stopped.
/// On `SIGHUP` the mappings and upstream servers are re-read from
/// `config_path`, with `overrides` applied on top; other settings need a
/// restart.
pub async fn run(config: Config, config_path: Option<PathBuf>, overrides: Overrides) -> Result<()> {
    let server = Arc::new(DnsServer::new(config.server_options()?));
    server.start().await?;

    for mapping in server.resolver().matcher().mappings() {
        info!(
            host = %mapping.fqdn(&config.domain),
            target = %mapping.target,
            port = mapping.port,
            "Mapping active"
        );
    }
    let upstream_strs: Vec<_> = config.resolver.upstream_dns.iter().map(String::as_str).collect();
    info!(upstreams = %upstream_strs.join(", "), "Forwarding unmatched queries");

    let maintenance = spawn_maintenance(
        server.clone(),
        Duration::from_secs(config.options.cleanup_interval_secs),
    );

    let result = serve_until_shutdown(&server, config_path.as_deref(), &overrides).await;

    maintenance.abort();
    server.stop().await;
    result
}

/// Drop expired cache entries and log stats on every tick.
fn spawn_maintenance(server: Arc<DnsServer>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let expired = server.cleanup_cache();
            let stats = server.stats();
            let cache = server.cache_stats();
            info!(
                queries = stats.queries_total,
                matched = stats.queries_matched,
                forwarded = stats.queries_forwarded,
                cache_hits = stats.cache_hits,
                cache_misses = stats.cache_misses,
                hit_rate = cache.hit_rate,
                cache_size = cache.size,
                expired,
                errors = stats.errors,
                "stats"
            );
        }
    })
}

#[cfg(unix)]
async fn serve_until_shutdown(
    server: &DnsServer,
    config_path: Option<&Path>,
    overrides: &Overrides,
) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Interrupt received, shutting down");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("SIGTERM received, shutting down");
                return Ok(());
            }
            _ = hangup.recv() => reload(server, config_path, overrides),
        }
    }
}

#[cfg(not(unix))]
async fn serve_until_shutdown(
    _server: &DnsServer,
    _config_path: Option<&Path>,
    _overrides: &Overrides,
) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    Ok(())
}

/// Re-read mappings and upstreams from the config file.
///
/// Command-line overrides still apply on top of the file. A file that fails
/// to load or validate leaves the running tables alone.
pub fn reload(server: &DnsServer, config_path: Option<&Path>, overrides: &Overrides) {
    let Some(path) = config_path else {
        warn!("Reload requested but no config file was given");
        return;
    };

    let loaded = Config::load(path).and_then(|mut config| {
        overrides.apply(&mut config);
        config.validate().map(|()| config)
    });
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Config reload failed, keeping current mappings");
            return;
        }
    };

    server.update_mappings(&config.mappings);
    match config.upstreams() {
        Ok(upstreams) => server.set_upstream_servers(upstreams),
        Err(e) => warn!(error = %e, "Keeping current upstream servers"),
    }
}
