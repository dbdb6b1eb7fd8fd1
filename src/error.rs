//! Error types for the DNS daemon.

use std::io;
use std::net::SocketAddr;

use hickory_proto::error::ProtoError;
use thiserror::Error;

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running the daemon.
#[derive(Debug, Error)]
pub enum Error {
    /// `start()` was called while the server was not stopped.
    #[error("DNS server is already running")]
    AlreadyRunning,

    /// The listening socket could not be bound.
    #[error("failed to bind DNS server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// An inbound datagram was not a valid DNS message.
    #[error("malformed DNS message: {0}")]
    Decode(#[source] ProtoError),

    /// A synthesized response could not be serialized.
    #[error("failed to encode DNS response: {0}")]
    Encode(#[source] ProtoError),

    /// A matched mapping has a target that cannot be served as an A record.
    #[error("mapping {host:?} has no IPv4 target (got {target:?})")]
    InvalidTarget { host: String, target: String },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Config file is not valid TOML for the expected schema.
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}
