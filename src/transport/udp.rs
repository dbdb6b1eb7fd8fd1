//! UDP transport for DNS queries.
//!
//! Receives datagrams on the listening socket and hands each one to its own
//! task, so a slow upstream forward never holds up the receive loop.
//!
//! Only the receive loop owns the socket. Query tasks hold a weak handle, so
//! the port is released as soon as the loop exits, and replies still pending
//! at that point are dropped.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::resolver::Resolver;

use super::{MAX_DNS_PACKET_SIZE, QueryLogger};

/// UDP transport for the DNS daemon.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the UDP transport.
    ///
    /// Spawns the receive loop, which runs until `shutdown` fires or its
    /// sender is dropped.
    pub fn start(self, resolver: Arc<Resolver>, shutdown: oneshot::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(run(self.socket, resolver, shutdown))
    }
}

/// Receive loop: one task per datagram.
async fn run(socket: Arc<UdpSocket>, resolver: Arc<Resolver>, mut shutdown: oneshot::Receiver<()>) {
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("UDP receive loop stopping");
                break;
            }
            result = socket.recv_from(&mut buf) => {
                let (len, src) = match result {
                    Ok(r) => r,
                    Err(e) => {
                        // ICMP errors from earlier sends surface here on some platforms.
                        warn!(error = %e, "UDP recv error");
                        continue;
                    }
                };

                let packet = buf[..len].to_vec();
                let socket = Arc::downgrade(&socket);
                let resolver = resolver.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_datagram(&socket, &resolver, &packet, src).await {
                        resolver.record_error();
                        error!(client = %src, error = %e, "Error handling query");
                    }
                });
            }
        }
    }
}

/// Resolve one datagram and send the answer, if there is one.
async fn handle_datagram(
    socket: &Weak<UdpSocket>,
    resolver: &Resolver,
    packet: &[u8],
    src: SocketAddr,
) -> Result<()> {
    let start_time = Instant::now();
    let action = resolver.process_query(packet).await?;

    if let Some(response) = action.response() {
        let Some(socket) = socket.upgrade() else {
            debug!(client = %src, "Listener closed, dropping reply");
            return Ok(());
        };
        socket.send_to(response, src).await?;
    }

    QueryLogger::new(src).log(&action, start_time.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}
