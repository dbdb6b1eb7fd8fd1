//! Transport layer for the DNS daemon.
//!
//! [`udp`] receives client queries and sends answers back; [`upstream`]
//! relays queries to real resolvers.

pub mod udp;
pub mod upstream;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Largest payload a single UDP datagram can carry.
///
/// Upstream replies are read into a buffer this size so EDNS answers above
/// [`MAX_DNS_PACKET_SIZE`] are relayed whole.
pub const MAX_UDP_PAYLOAD_SIZE: usize = 65535;

use std::net::SocketAddr;

use tracing::debug;

use crate::resolver::QueryAction;

/// Logger for DNS query events.
pub struct QueryLogger {
    client: SocketAddr,
}

impl QueryLogger {
    pub fn new(client: SocketAddr) -> Self {
        Self { client }
    }

    pub fn log(&self, action: &QueryAction, elapsed_ms: f64) {
        match action {
            QueryAction::Cached { domain, .. } => {
                debug!(client = %self.client, domain = %domain, total_ms = elapsed_ms, "CACHED");
            }
            QueryAction::Matched {
                domain, mapping, ..
            } => {
                debug!(
                    client = %self.client,
                    domain = %domain,
                    target = %mapping.target,
                    port = mapping.port,
                    total_ms = elapsed_ms,
                    "MATCHED"
                );
            }
            QueryAction::Forwarded {
                domain,
                upstream_ms,
                ..
            } => {
                debug!(
                    client = %self.client,
                    domain = %domain,
                    total_ms = elapsed_ms,
                    upstream_ms = *upstream_ms,
                    "FORWARDED"
                );
            }
            QueryAction::Dropped { domain: Some(domain) } => {
                debug!(client = %self.client, domain = %domain, total_ms = elapsed_ms, "UNANSWERED");
            }
            QueryAction::Dropped { domain: None } => {
                debug!(client = %self.client, "Query without question ignored");
            }
        }
    }
}
