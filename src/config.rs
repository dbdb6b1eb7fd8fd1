//! Daemon configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file is a
//! valid configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::server::{DEFAULT_DOMAIN, DEFAULT_PORT, DEFAULT_TTL, ServerOptions};
use crate::transport::upstream::{DEFAULT_TIMEOUT, DNS_PORT};

const MAX_TTL: u32 = 86_400;
const MIN_LISTEN_PORT: u16 = 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default domain, a single label such as `test`.
    pub domain: String,
    pub resolver: ResolverConfig,
    pub options: OptionsConfig,
    pub logging: LoggingConfig,
    pub mappings: Vec<Mapping>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            resolver: ResolverConfig::default(),
            options: OptionsConfig::default(),
            logging: LoggingConfig::default(),
            mappings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Upstream resolvers, tried in order. Port 53 unless given.
    pub upstream_dns: Vec<String>,
    /// Per-upstream attempt timeout.
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            upstream_dns: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    pub ttl: u32,
    pub cleanup_interval_secs: u64,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            cleanup_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        let domain_ok = !self.domain.is_empty()
            && self
                .domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !domain_ok {
            return Err(Error::Config(format!("invalid domain {:?}", self.domain)));
        }

        if !(1..=MAX_TTL).contains(&self.options.ttl) {
            return Err(Error::Config(format!(
                "ttl must be between 1 and {MAX_TTL}, got {}",
                self.options.ttl
            )));
        }

        if self.resolver.port < MIN_LISTEN_PORT {
            return Err(Error::Config(format!(
                "resolver port must be at least {MIN_LISTEN_PORT}, got {}",
                self.resolver.port
            )));
        }

        if self.resolver.timeout_ms == 0 {
            return Err(Error::Config("resolver timeout_ms must be non-zero".to_string()));
        }

        if self.options.cleanup_interval_secs == 0 {
            return Err(Error::Config(
                "options cleanup_interval_secs must be non-zero".to_string(),
            ));
        }

        if !matches!(
            self.logging.level.as_str(),
            "debug" | "info" | "warn" | "error"
        ) {
            return Err(Error::Config(format!(
                "unknown log level {:?}",
                self.logging.level
            )));
        }

        self.upstreams()?;
        for mapping in &self.mappings {
            mapping.validate()?;
        }

        Ok(())
    }

    pub fn upstreams(&self) -> Result<Vec<SocketAddr>> {
        self.resolver
            .upstream_dns
            .iter()
            .map(|s| parse_upstream(s))
            .collect()
    }

    pub fn server_options(&self) -> Result<ServerOptions> {
        Ok(ServerOptions {
            bind: self.resolver.bind,
            port: self.resolver.port,
            domain: self.domain.clone(),
            mappings: self.mappings.clone(),
            ttl: self.options.ttl,
            upstream_dns: self.upstreams()?,
            upstream_timeout: Duration::from_millis(self.resolver.timeout_ms),
        })
    }
}

/// Parse an upstream resolver address, defaulting to port 53.
///
/// Settings given on the command line.
///
/// They take precedence over the config file, both at startup and when the
/// file is re-read on reload.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub domain: Option<String>,
    pub upstream_dns: Vec<String>,
    pub ttl: Option<u32>,
    pub verbose: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.resolver.bind = bind;
        }
        if let Some(port) = self.port {
            config.resolver.port = port;
        }
        if let Some(domain) = &self.domain {
            config.domain = domain.clone();
        }
        if !self.upstream_dns.is_empty() {
            config.resolver.upstream_dns = self.upstream_dns.clone();
        }
        if let Some(ttl) = self.ttl {
            config.options.ttl = ttl;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}

/// Accepts `8.8.8.8`, `8.8.8.8:5353`, `2001:4860:4860::8888` and
/// `[2001:4860:4860::8888]:53`.
pub fn parse_upstream(s: &str) -> Result<SocketAddr> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| Error::Config(format!("invalid upstream DNS server {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.domain, "test");
        assert_eq!(config.resolver.port, 5353);
        assert_eq!(config.options.ttl, 60);
        assert_eq!(
            config.upstreams().unwrap(),
            vec![
                "8.8.8.8:53".parse::<SocketAddr>().unwrap(),
                "1.1.1.1:53".parse().unwrap()
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_mappings_with_defaults() {
        let config = Config::from_toml(
            r#"
            domain = "local"

            [[mappings]]
            id = "1"
            host = "api"
            target = "localhost"
            port = 3000

            [[mappings]]
            id = "2"
            host = "*.cdn"
            target = "127.0.0.1"
            port = 8080
            protocol = "https"
            enabled = false
            health = { path = "/health" }
            "#,
        )
        .unwrap();

        assert_eq!(config.domain, "local");
        assert_eq!(config.mappings.len(), 2);
        assert!(config.mappings[0].enabled);
        assert_eq!(config.mappings[1].protocol, crate::mapping::Protocol::Https);
        let health = config.mappings[1].health.as_ref().unwrap();
        assert!(health.enabled);
        assert_eq!(health.interval, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[options]\nttl = 120\n\n[resolver]\nupstream_dns = [\"9.9.9.9\"]").unwrap();

        let config = Config::load(file.path()).unwrap();
        let options = config.server_options().unwrap();

        assert_eq!(options.ttl, 120);
        assert_eq!(options.upstream_dns, vec!["9.9.9.9:53".parse().unwrap()]);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.options.ttl = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.resolver.port = 53;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.domain = "my.test".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.resolver.upstream_dns = vec!["dns.google".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mappings.push(Mapping::new("1", "bad host", "127.0.0.1", 80));
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_protocol_is_a_toml_error() {
        let result = Config::from_toml(
            "[[mappings]]\nid = \"1\"\nhost = \"a\"\ntarget = \"127.0.0.1\"\nport = 1\nprotocol = \"ftp\"\n",
        );

        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn parse_upstream_defaults_port() {
        assert_eq!(parse_upstream("8.8.8.8").unwrap(), "8.8.8.8:53".parse().unwrap());
        assert_eq!(
            parse_upstream("127.0.0.1:5300").unwrap(),
            "127.0.0.1:5300".parse().unwrap()
        );
        assert_eq!(parse_upstream("::1").unwrap(), "[::1]:53".parse().unwrap());
        assert_eq!(parse_upstream("[::1]:5353").unwrap(), "[::1]:5353".parse().unwrap());
        assert!(parse_upstream("not-an-ip").is_err());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut config = Config::from_toml(
            "domain = \"local\"\n[resolver]\nupstream_dns = [\"9.9.9.9\"]\nport = 5300\n",
        )
        .unwrap();
        let overrides = Overrides {
            upstream_dns: vec!["127.0.0.1:5301".to_string()],
            ttl: Some(30),
            verbose: true,
            ..Overrides::default()
        };

        overrides.apply(&mut config);

        assert_eq!(config.domain, "local");
        assert_eq!(config.resolver.port, 5300);
        assert_eq!(config.options.ttl, 30);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.upstreams().unwrap(),
            vec!["127.0.0.1:5301".parse::<SocketAddr>().unwrap()]
        );
    }
}
