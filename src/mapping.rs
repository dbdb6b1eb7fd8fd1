//! Hostname mappings supplied by the configuration layer.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Protocol spoken by the mapped service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
    Tcp,
}

/// Reachability probe settings for a mapping.
///
/// The daemon does not probe anything itself; the settings travel with the
/// mapping so external health checkers can read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Seconds between probes.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Probe timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            interval: default_interval(),
            timeout: default_timeout(),
        }
    }
}

/// A rule binding a hostname pattern to a local service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: String,
    /// Subdomain label(s) under the served domain; may contain `*`.
    pub host: String,
    /// Optional domain override, used only when building the FQDN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// IP address or the literal `localhost`.
    pub target: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Mapping {
    /// Create an enabled HTTP mapping with no overrides.
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        target: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            domain: None,
            target: target.into(),
            port,
            protocol: Protocol::default(),
            enabled: true,
            health: None,
            description: None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.host.contains('*')
    }

    /// Address served in A answers. `localhost` maps to `127.0.0.1`.
    pub fn target_ipv4(&self) -> Option<Ipv4Addr> {
        if self.target.eq_ignore_ascii_case("localhost") {
            return Some(Ipv4Addr::LOCALHOST);
        }
        self.target.parse().ok()
    }

    /// Fully qualified name, preferring the mapping's own domain override.
    pub fn fqdn(&self, default_domain: &str) -> String {
        let domain = self.domain.as_deref().unwrap_or(default_domain);
        format!("{}.{}", self.host, domain)
    }

    pub fn validate(&self) -> Result<()> {
        let host_ok = !self.host.is_empty()
            && self
                .host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '*' | '.'));
        if !host_ok {
            return Err(Error::Config(format!(
                "mapping {}: invalid host {:?}",
                self.id, self.host
            )));
        }

        let target_ok =
            self.target.eq_ignore_ascii_case("localhost") || self.target.parse::<IpAddr>().is_ok();
        if !target_ok {
            return Err(Error::Config(format!(
                "mapping {}: target {:?} is neither an IP address nor localhost",
                self.id, self.target
            )));
        }

        if self.port == 0 {
            return Err(Error::Config(format!("mapping {}: port must be non-zero", self.id)));
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_target_normalizes_to_loopback() {
        let mapping = Mapping::new("1", "api", "localhost", 3000);

        assert_eq!(mapping.target_ipv4(), Some(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn ipv6_target_has_no_ipv4() {
        let mapping = Mapping::new("1", "api", "::1", 3000);

        assert_eq!(mapping.target_ipv4(), None);
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn fqdn_prefers_domain_override() {
        let mut mapping = Mapping::new("1", "api", "127.0.0.1", 3000);
        assert_eq!(mapping.fqdn("test"), "api.test");

        mapping.domain = Some("local".to_string());
        assert_eq!(mapping.fqdn("test"), "api.local");
    }

    #[test]
    fn validate_rejects_bad_hosts_and_targets() {
        assert!(Mapping::new("1", "api_v2", "127.0.0.1", 80).validate().is_err());
        assert!(Mapping::new("1", "", "127.0.0.1", 80).validate().is_err());
        assert!(Mapping::new("1", "api", "example.com", 80).validate().is_err());
        assert!(Mapping::new("1", "api", "127.0.0.1", 0).validate().is_err());
        assert!(Mapping::new("1", "*.cdn", "127.0.0.1", 80).validate().is_ok());
    }
}
