//! DNS server lifecycle.
//!
//! [`DnsServer`] owns the listening socket and the shared [`Resolver`], and
//! exposes the start/stop/status surface used by the daemon runner and by
//! anything embedding the server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::CacheStats;
use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::matcher::DomainMatcher;
use crate::resolver::Resolver;
use crate::stats::DaemonStats;
use crate::transport::udp::UdpTransport;
use crate::transport::upstream::{self, DNS_PORT, UpstreamForwarder};

pub const DEFAULT_PORT: u16 = 5353;
pub const DEFAULT_DOMAIN: &str = "test";
pub const DEFAULT_TTL: u32 = 60;

/// Construction parameters for [`DnsServer`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub bind: IpAddr,
    pub port: u16,
    /// Default domain the mappings live under.
    pub domain: String,
    pub mappings: Vec<Mapping>,
    /// TTL in seconds for synthesized answers.
    pub ttl: u32,
    pub upstream_dns: Vec<SocketAddr>,
    pub upstream_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            domain: DEFAULT_DOMAIN.to_string(),
            mappings: Vec::new(),
            ttl: DEFAULT_TTL,
            upstream_dns: vec![
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), DNS_PORT),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), DNS_PORT),
            ],
            upstream_timeout: upstream::DEFAULT_TIMEOUT,
        }
    }
}

/// Lifecycle states of a [`DnsServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct Lifecycle {
    state: ServerState,
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// The DNS daemon: a UDP listener wired to matcher, cache and forwarder.
pub struct DnsServer {
    bind_addr: SocketAddr,
    resolver: Arc<Resolver>,
    lifecycle: Mutex<Lifecycle>,
}

impl DnsServer {
    pub fn new(options: ServerOptions) -> Self {
        let matcher = DomainMatcher::new(&options.mappings, &options.domain);
        let forwarder = UpstreamForwarder::new(options.upstream_dns, options.upstream_timeout);

        Self {
            bind_addr: SocketAddr::new(options.bind, options.port),
            resolver: Arc::new(Resolver::new(matcher, forwarder, options.ttl)),
            lifecycle: Mutex::new(Lifecycle {
                state: ServerState::Stopped,
                local_addr: None,
                shutdown: None,
                task: None,
            }),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the socket and start serving. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != ServerState::Stopped {
                return Err(Error::AlreadyRunning);
            }
            lifecycle.state = ServerState::Starting;
        }

        let bound = UdpTransport::bind(self.bind_addr)
            .await
            .and_then(|transport| Ok((transport.local_addr()?, transport)));
        let (local_addr, transport) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                self.lifecycle().state = ServerState::Stopped;
                return Err(Error::Bind {
                    addr: self.bind_addr,
                    source,
                });
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = transport.start(self.resolver.clone(), shutdown_rx);

        let mut lifecycle = self.lifecycle();
        lifecycle.state = ServerState::Running;
        lifecycle.local_addr = Some(local_addr);
        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.task = Some(task);

        info!(
            addr = %local_addr,
            domain = %self.resolver.matcher().domain(),
            mappings = self.resolver.matcher().len(),
            "DNS server listening"
        );
        Ok(local_addr)
    }

    /// Stop serving and release the listening socket. Safe to call repeatedly.
    ///
    /// Datagrams already being handled finish on their own tasks, but their
    /// replies are dropped. The port can be bound again once this returns.
    pub async fn stop(&self) {
        let (shutdown, task) = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != ServerState::Running {
                return;
            }
            lifecycle.state = ServerState::Stopping;
            (lifecycle.shutdown.take(), lifecycle.task.take())
        };

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        if let Some(task) = task {
            let _ = task.await;
        }

        let mut lifecycle = self.lifecycle();
        lifecycle.state = ServerState::Stopped;
        lifecycle.local_addr = None;
        info!("DNS server stopped");
    }

    /// Replace the mapping table. Safe while running.
    pub fn update_mappings(&self, mappings: &[Mapping]) {
        self.resolver.update_mappings(mappings);
        info!(count = mappings.len(), "Mappings updated");
    }

    pub fn set_upstream_servers(&self, servers: Vec<SocketAddr>) {
        info!(count = servers.len(), "Upstream servers updated");
        self.resolver.set_upstream_servers(servers);
    }

    pub fn stats(&self) -> DaemonStats {
        self.resolver.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache_stats()
    }

    pub fn clear_cache(&self) {
        self.resolver.clear_cache();
        info!("Cache cleared");
    }

    /// Drop expired cache entries. Returns how many were removed.
    pub fn cleanup_cache(&self) -> usize {
        self.resolver.cleanup_cache()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle().state
    }

    /// Address the socket is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle().local_addr
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}
