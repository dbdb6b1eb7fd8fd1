//! Upstream forwarding over UDP.
//!
//! Relays raw queries to the configured resolvers one at a time, in order.
//! Each attempt uses a fresh socket and is bounded by a fixed timeout; the
//! first reply wins and a failed or silent server is never retried.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::net::UdpSocket;
use tracing::debug;

use super::MAX_UDP_PAYLOAD_SIZE;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Port used when an upstream is given without one.
pub const DNS_PORT: u16 = 53;

/// Forwards queries to a prioritized list of upstream resolvers.
pub struct UpstreamForwarder {
    servers: ArcSwap<Vec<SocketAddr>>,
    timeout: Duration,
}

impl UpstreamForwarder {
    pub fn new(servers: Vec<SocketAddr>, timeout: Duration) -> Self {
        Self {
            servers: ArcSwap::from_pointee(servers),
            timeout,
        }
    }

    /// Forward a raw query and return the first upstream reply.
    ///
    /// Returns `None` when every server errored or timed out.
    pub async fn forward(&self, query: &[u8]) -> Option<Vec<u8>> {
        let servers = self.servers.load_full();

        for &server in servers.iter() {
            let start = Instant::now();
            match tokio::time::timeout(self.timeout, exchange(query, server)).await {
                Ok(Ok(response)) => {
                    debug!(
                        upstream = %server,
                        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Upstream answered"
                    );
                    return Some(response);
                }
                Ok(Err(e)) => {
                    debug!(upstream = %server, error = %e, "Upstream failed, trying next");
                }
                Err(_) => {
                    debug!(
                        upstream = %server,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Upstream timed out, trying next"
                    );
                }
            }
        }

        None
    }

    /// Replace the server list for subsequent forwards.
    pub fn set_upstream_servers(&self, servers: Vec<SocketAddr>) {
        self.servers.store(Arc::new(servers));
    }

    pub fn upstream_servers(&self) -> Vec<SocketAddr> {
        self.servers.load().as_ref().clone()
    }
}

/// One query/response exchange on a transient socket.
async fn exchange(query: &[u8], server: SocketAddr) -> std::io::Result<Vec<u8>> {
    let local: SocketAddr = match server.ip() {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(server).await?;
    socket.send(query).await?;

    let mut buf = vec![0u8; MAX_UDP_PAYLOAD_SIZE];
    let len = socket.recv(&mut buf).await?;
    buf.truncate(len);

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MAX_DNS_PACKET_SIZE;

    const SHORT_TIMEOUT: Duration = Duration::from_millis(200);

    /// A resolver that answers every query with `reply`.
    async fn answering_upstream(reply: Vec<u8>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
            while let Ok((_, src)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(&reply, src).await;
            }
        });
        addr
    }

    /// Next datagram waiting on `socket`, if one arrives shortly.
    async fn received(socket: &UdpSocket) -> Option<Vec<u8>> {
        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_millis(50), socket.recv_from(&mut buf))
            .await
            .ok()?
            .ok()?;
        Some(buf[..len].to_vec())
    }

    #[tokio::test]
    async fn falls_over_to_next_server_after_timeout() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let answering = answering_upstream(b"from-b".to_vec()).await;
        let forwarder =
            UpstreamForwarder::new(vec![silent.local_addr().unwrap(), answering], SHORT_TIMEOUT);

        let response = forwarder.forward(b"query").await;

        assert_eq!(response.as_deref(), Some(&b"from-b"[..]));

        // The silent server saw the query exactly once.
        assert_eq!(received(&silent).await.as_deref(), Some(&b"query"[..]));
        assert!(received(&silent).await.is_none());
    }

    #[tokio::test]
    async fn first_answer_wins() {
        let first = answering_upstream(b"from-a".to_vec()).await;
        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let forwarder =
            UpstreamForwarder::new(vec![first, second.local_addr().unwrap()], SHORT_TIMEOUT);

        let response = forwarder.forward(b"query").await;

        assert_eq!(response.as_deref(), Some(&b"from-a"[..]));
        assert!(received(&second).await.is_none());
    }

    #[tokio::test]
    async fn all_servers_timing_out_returns_none() {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let forwarder = UpstreamForwarder::new(
            vec![a.local_addr().unwrap(), b.local_addr().unwrap()],
            SHORT_TIMEOUT,
        );

        let start = Instant::now();
        assert!(forwarder.forward(b"query").await.is_none());
        assert!(start.elapsed() >= SHORT_TIMEOUT * 2);
    }

    #[tokio::test]
    async fn large_reply_is_relayed_whole() {
        let reply: Vec<u8> = (0..6000u32).map(|i| i as u8).collect();
        let upstream = answering_upstream(reply.clone()).await;
        let forwarder = UpstreamForwarder::new(vec![upstream], SHORT_TIMEOUT);

        let response = forwarder.forward(b"query").await.unwrap();

        assert!(response.len() > MAX_DNS_PACKET_SIZE);
        assert_eq!(response, reply);
    }

    #[tokio::test]
    async fn empty_server_list_returns_none() {
        let forwarder = UpstreamForwarder::new(Vec::new(), SHORT_TIMEOUT);

        assert!(forwarder.forward(b"query").await.is_none());
    }

    #[tokio::test]
    async fn set_upstream_servers_applies_to_next_forward() {
        let a = answering_upstream(b"from-a".to_vec()).await;
        let b = answering_upstream(b"from-b".to_vec()).await;
        let forwarder = UpstreamForwarder::new(vec![a], SHORT_TIMEOUT);

        forwarder.set_upstream_servers(vec![b]);

        assert_eq!(forwarder.upstream_servers(), vec![b]);
        assert_eq!(forwarder.forward(b"query").await.as_deref(), Some(&b"from-b"[..]));
    }
}
