//! DNS query resolution logic.
//!
//! Handles the core query processing pipeline:
//! 1. Non-A queries go straight upstream
//! 2. Cache lookup
//! 3. Local mapping match, synthesizing an authoritative answer
//! 4. Forward to upstream, caching whatever comes back
//!
//! Transports handle the actual I/O, resolver handles decisions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hickory_proto::rr::RecordType;
use tracing::debug;

use crate::cache::{CacheStats, ResponseCache};
use crate::dns::{DnsQuery, UpstreamAnswer};
use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::matcher::DomainMatcher;
use crate::stats::{DaemonStats, Stats};
use crate::transport::upstream::UpstreamForwarder;

/// Outcome of processing one inbound packet.
#[derive(Debug)]
pub enum QueryAction {
    /// Served from the cache.
    Cached { response: Vec<u8>, domain: String },
    /// Answered from a local mapping.
    Matched {
        response: Vec<u8>,
        domain: String,
        mapping: Arc<Mapping>,
    },
    /// Relayed from an upstream resolver.
    Forwarded {
        response: Vec<u8>,
        domain: String,
        upstream_ms: f64,
    },
    /// Nothing to send back.
    ///
    /// Either the packet carried no question or no upstream answered.
    Dropped { domain: Option<String> },
}

impl QueryAction {
    /// Bytes to send back to the client, if any.
    pub fn response(&self) -> Option<&[u8]> {
        match self {
            QueryAction::Cached { response, .. }
            | QueryAction::Matched { response, .. }
            | QueryAction::Forwarded { response, .. } => Some(response),
            QueryAction::Dropped { .. } => None,
        }
    }
}

/// Resolver handles DNS query processing decisions.
///
/// Shared by every in-flight datagram task; all state behind it is
/// synchronized, so `process_query` calls may overlap freely.
pub struct Resolver {
    matcher: DomainMatcher,
    cache: ResponseCache,
    forwarder: UpstreamForwarder,
    stats: Stats,
    ttl: u32,
}

impl Resolver {
    pub fn new(matcher: DomainMatcher, forwarder: UpstreamForwarder, ttl: u32) -> Self {
        Self {
            matcher,
            cache: ResponseCache::new(),
            forwarder,
            stats: Stats::new(),
            ttl,
        }
    }

    /// Process a raw DNS packet and decide what to answer.
    ///
    /// Only the first question is considered. Decode and synthesis failures
    /// are returned as errors; the transport counts and logs them.
    pub async fn process_query(&self, packet: &[u8]) -> Result<QueryAction> {
        let Some(query) = DnsQuery::parse(packet)? else {
            return Ok(QueryAction::Dropped { domain: None });
        };

        self.stats.record_query();

        if query.qtype != RecordType::A {
            return Ok(self.forward(packet, query.domain, false).await);
        }

        if let Some(cached) = self.cache.get(&query.domain, RecordType::A) {
            return Ok(QueryAction::Cached {
                response: query.response_from_cache(&cached),
                domain: query.domain,
            });
        }

        if let Some(mapping) = self.matcher.match_host(&query.domain) {
            let addr = mapping.target_ipv4().ok_or_else(|| Error::InvalidTarget {
                host: mapping.host.clone(),
                target: mapping.target.clone(),
            })?;
            let response = query.authoritative_response(addr, self.ttl)?;

            self.stats.record_matched();
            self.cache
                .set(&query.domain, RecordType::A, response.clone(), self.ttl);

            return Ok(QueryAction::Matched {
                response,
                domain: query.domain,
                mapping,
            });
        }

        Ok(self.forward(packet, query.domain, true).await)
    }

    async fn forward(&self, packet: &[u8], domain: String, cache_answer: bool) -> QueryAction {
        self.stats.record_forwarded();

        let start = Instant::now();
        let Some(response) = self.forwarder.forward(packet).await else {
            return QueryAction::Dropped {
                domain: Some(domain),
            };
        };
        let upstream_ms = start.elapsed().as_secs_f64() * 1000.0;

        if cache_answer {
            self.process_response(&response);
        }

        QueryAction::Forwarded {
            response,
            domain,
            upstream_ms,
        }
    }

    /// Cache an upstream response under its own question.
    ///
    /// Uses the smallest answer TTL, or the server TTL when there are no
    /// answers. Undecodable responses are still relayed, just not cached.
    pub fn process_response(&self, response: &[u8]) {
        match UpstreamAnswer::parse(response, self.ttl) {
            Some(answer) => {
                self.cache
                    .set(&answer.domain, answer.qtype, response.to_vec(), answer.ttl);
            }
            None => debug!("Upstream response not cacheable"),
        }
    }

    pub fn update_mappings(&self, mappings: &[Mapping]) {
        self.matcher.update_mappings(mappings);
    }

    pub fn set_upstream_servers(&self, servers: Vec<SocketAddr>) {
        self.forwarder.set_upstream_servers(servers);
    }

    pub fn record_error(&self) {
        self.stats.record_error();
    }

    pub fn stats(&self) -> DaemonStats {
        self.stats.snapshot(&self.cache.stats())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup()
    }

    pub fn matcher(&self) -> &DomainMatcher {
        &self.matcher
    }

    pub fn forwarder(&self) -> &UpstreamForwarder {
        &self.forwarder
    }
}
