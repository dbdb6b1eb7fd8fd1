//! Hostname to mapping resolution.
//!
//! Matches queried names under the served domain against the enabled
//! mappings: exact hosts first, then wildcard patterns, each in declaration
//! order.

mod pattern;

pub use pattern::HostPattern;

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::warn;

use crate::mapping::Mapping;

/// Immutable snapshot of the enabled mappings.
#[derive(Default)]
struct MatchTable {
    mappings: Vec<Arc<Mapping>>,
    wildcards: Vec<(HostPattern, Arc<Mapping>)>,
}

impl MatchTable {
    fn build(mappings: &[Mapping]) -> Self {
        let mut table = Self::default();

        for mapping in mappings.iter().filter(|m| m.enabled) {
            let mapping = Arc::new(mapping.clone());
            if mapping.is_wildcard() {
                match HostPattern::compile(&mapping.host) {
                    Ok(pattern) => table.wildcards.push((pattern, mapping.clone())),
                    Err(e) => {
                        warn!(id = %mapping.id, host = %mapping.host, error = %e, "Skipping wildcard mapping");
                    }
                }
            }
            table.mappings.push(mapping);
        }

        table
    }
}

/// Resolves hostnames under one domain to configured mappings.
///
/// The table is swapped as a whole on update, so a lookup running alongside
/// [`DomainMatcher::update_mappings`] sees either the old or the new set.
pub struct DomainMatcher {
    domain: String,
    table: ArcSwap<MatchTable>,
}

impl DomainMatcher {
    pub fn new(mappings: &[Mapping], domain: &str) -> Self {
        Self {
            domain: domain.trim_matches('.').to_ascii_lowercase(),
            table: ArcSwap::from_pointee(MatchTable::build(mappings)),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Replace the working set. Disabled mappings are dropped.
    pub fn update_mappings(&self, mappings: &[Mapping]) {
        self.table.store(Arc::new(MatchTable::build(mappings)));
    }

    /// Find the mapping for a queried hostname.
    ///
    /// Accepts names with or without the trailing root dot. Returns `None`
    /// for names outside the served domain.
    pub fn match_host(&self, hostname: &str) -> Option<Arc<Mapping>> {
        let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
        let subdomain = strip_domain(hostname, &self.domain)?;
        if subdomain.is_empty() {
            return None;
        }

        let table = self.table.load();

        if let Some(exact) = table
            .mappings
            .iter()
            .find(|m| m.host.eq_ignore_ascii_case(subdomain))
        {
            return Some(exact.clone());
        }

        table
            .wildcards
            .iter()
            .find(|(pattern, _)| pattern.is_match(subdomain))
            .map(|(_, mapping)| mapping.clone())
    }

    /// Enabled mappings currently in effect.
    pub fn mappings(&self) -> Vec<Arc<Mapping>> {
        self.table.load().mappings.clone()
    }

    pub fn len(&self) -> usize {
        self.table.load().mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strip `"." + domain` from the end of `hostname`, ignoring ASCII case.
fn strip_domain<'a>(hostname: &'a str, domain: &str) -> Option<&'a str> {
    let split = hostname.len().checked_sub(domain.len() + 1)?;
    if !hostname.is_char_boundary(split) {
        return None;
    }
    let (subdomain, suffix) = hostname.split_at(split);
    let suffix = suffix.strip_prefix('.')?;
    suffix.eq_ignore_ascii_case(domain).then_some(subdomain)
}
