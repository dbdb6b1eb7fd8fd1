//! WildMask DNS - a local development DNS daemon.
//!
//! Answers A queries for hostnames under a reserved domain (`*.test` by
//! default) from configured mappings, caches answers for their TTL, and
//! forwards everything else to upstream resolvers with failover.

pub mod cache;
pub mod config;
pub mod daemon;
pub mod dns;
pub mod error;
pub mod mapping;
pub mod matcher;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod transport;

pub use error::{Error, Result};
pub use mapping::{HealthCheck, Mapping, Protocol};
pub use server::{DnsServer, ServerOptions, ServerState};
pub use stats::DaemonStats;
