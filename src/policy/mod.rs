//! Zone-scoped validation policy.
//!
//! Every policy type keeps its entries in a [`PolicyList`] ordered by
//! decreasing owner-name length, so the first entry whose zone encloses a
//! name is the most specific one that applies.

pub mod config;
pub mod scope;
pub mod watch;

pub use config::PolicyDocument;
pub use scope::{Overrides, check_relevance};
pub use watch::PolicyWatcher;

use crate::dns::Name;
use crate::dnssec::TrustAnchor;
use crate::error::PolicyError;
use rustc_hash::FxHashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The kinds of policy a zone can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyType {
    TrustAnchor,
    ClockSkew,
    ProvablyInsecure,
    ZoneSecurityExpectation,
    Nsec3MaxIterations,
}

impl PolicyType {
    pub const ALL: [PolicyType; 5] = [
        PolicyType::TrustAnchor,
        PolicyType::ClockSkew,
        PolicyType::ProvablyInsecure,
        PolicyType::ZoneSecurityExpectation,
        PolicyType::Nsec3MaxIterations,
    ];

    /// Keyword used in policy documents
    pub fn keyword(&self) -> &'static str {
        match self {
            PolicyType::TrustAnchor => "trust-anchor",
            PolicyType::ClockSkew => "clock-skew",
            PolicyType::ProvablyInsecure => "provably-insecure-status",
            PolicyType::ZoneSecurityExpectation => "zone-security-expectation",
            PolicyType::Nsec3MaxIterations => "nsec3-max-iter",
        }
    }
}

impl FromStr for PolicyType {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "provably-unsecure-status" {
            return Ok(PolicyType::ProvablyInsecure);
        }
        PolicyType::ALL
            .into_iter()
            .find(|ptype| ptype.keyword() == s)
            .ok_or_else(|| PolicyError::UnknownKeyword(s.to_string()))
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// What a zone's answers are expected to look like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneSecurity {
    /// Skip validation and accept answers as they are (`ignore` or `trusted`)
    Ignore,
    #[default]
    Validate,
    /// Never trust answers from the zone
    Untrusted,
}

impl FromStr for ZoneSecurity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" | "trusted" => Ok(ZoneSecurity::Ignore),
            "validate" => Ok(ZoneSecurity::Validate),
            "untrusted" => Ok(ZoneSecurity::Untrusted),
            other => Err(format!("expected ignore, validate or untrusted, got '{}'", other)),
        }
    }
}

/// Typed payload of a policy entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyValue {
    TrustAnchor(TrustAnchor),
    /// Seconds of tolerance; negative disables validity-period checks
    ClockSkew(i64),
    /// Whether a provably insecure delegation is acceptable
    ProvablyInsecure(bool),
    ZoneSecurity(ZoneSecurity),
    Nsec3MaxIterations(u16),
}

impl PolicyValue {
    pub fn policy_type(&self) -> PolicyType {
        match self {
            PolicyValue::TrustAnchor(_) => PolicyType::TrustAnchor,
            PolicyValue::ClockSkew(_) => PolicyType::ClockSkew,
            PolicyValue::ProvablyInsecure(_) => PolicyType::ProvablyInsecure,
            PolicyValue::ZoneSecurity(_) => PolicyType::ZoneSecurityExpectation,
            PolicyValue::Nsec3MaxIterations(_) => PolicyType::Nsec3MaxIterations,
        }
    }
}

/// One zone's setting for one policy type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    pub zone: Name,
    /// Absolute time after which the entry no longer applies
    pub expires_at: Option<u64>,
    pub value: PolicyValue,
}

impl PolicyEntry {
    pub fn new(zone: Name, value: PolicyValue) -> Self {
        Self {
            zone,
            expires_at: None,
            value,
        }
    }

    pub fn expiring_at(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn policy_type(&self) -> PolicyType {
        self.value.policy_type()
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Entries of one policy type, most specific zone first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyList {
    entries: Vec<PolicyEntry>,
}

impl PolicyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert ahead of every entry whose zone is not longer, so later
    /// entries win among zones of equal length
    pub fn insert(&mut self, entry: PolicyEntry) {
        let len = entry.zone.wire_len();
        let at = self
            .entries
            .iter()
            .position(|existing| existing.zone.wire_len() <= len)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, entry);
    }

    /// Entries whose zone encloses `name`, most specific first
    pub fn lookup<'a>(&'a self, name: &Name, now: u64) -> impl Iterator<Item = &'a PolicyEntry> {
        self.entries
            .iter()
            .filter(move |entry| !entry.is_expired(now) && name.is_subdomain_of(&entry.zone))
    }

    /// Drop every entry for exactly `zone`
    pub fn remove_zone(&mut self, zone: &Name) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.zone != *zone);
        before - self.entries.len()
    }

    pub fn prune_expired(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolicyEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The effective policy of a validation context: one list per type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    lists: FxHashMap<PolicyType, PolicyList>,
}

impl PolicySet {
    pub fn empty() -> Self {
        Self {
            lists: FxHashMap::default(),
        }
    }

    /// Policy used when nothing is configured: the root trust anchor
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.insert(PolicyEntry::new(
            Name::root(),
            PolicyValue::TrustAnchor(TrustAnchor::root()),
        ));
        set
    }

    pub fn list(&self, ptype: PolicyType) -> Option<&PolicyList> {
        self.lists.get(&ptype)
    }

    /// Replace the whole list for one policy type
    pub fn set_list(&mut self, ptype: PolicyType, list: PolicyList) {
        self.lists.insert(ptype, list);
    }

    /// Matching entries of `ptype` for `name`, most specific first
    pub fn lookup(&self, ptype: PolicyType, name: &Name, now: u64) -> Vec<&PolicyEntry> {
        self.lists
            .get(&ptype)
            .map(|list| list.lookup(name, now).collect())
            .unwrap_or_default()
    }

    fn most_specific(&self, ptype: PolicyType, name: &Name, now: u64) -> Option<&PolicyValue> {
        let list = self.lists.get(&ptype)?;
        list.lookup(name, now).next().map(|entry| &entry.value)
    }

    /// Register one entry. A non-anchor entry replaces any entry of the same
    /// type for the same zone; trust anchors accumulate, with an identical
    /// anchor refreshed in place.
    pub fn insert(&mut self, entry: PolicyEntry) {
        let list = self.lists.entry(entry.policy_type()).or_default();
        match &entry.value {
            PolicyValue::TrustAnchor(_) => {
                list.entries
                    .retain(|existing| existing.zone != entry.zone || existing.value != entry.value);
            }
            _ => {
                list.remove_zone(&entry.zone);
            }
        }
        debug!(zone = %entry.zone, policy = %entry.policy_type(), "policy entry registered");
        list.insert(entry);
    }

    /// Remove every entry of `ptype` for exactly `zone`
    pub fn remove(&mut self, ptype: PolicyType, zone: &Name) -> bool {
        self.lists
            .get_mut(&ptype)
            .is_some_and(|list| list.remove_zone(zone) > 0)
    }

    pub fn prune_expired(&mut self, now: u64) -> usize {
        self.lists.values_mut().map(|list| list.prune_expired(now)).sum()
    }

    /// Anchors configured for exactly `zone`
    pub fn trust_anchors(&self, zone: &Name, now: u64) -> Vec<TrustAnchor> {
        self.lookup(PolicyType::TrustAnchor, zone, now)
            .into_iter()
            .filter(|entry| entry.zone == *zone)
            .filter_map(|entry| match &entry.value {
                PolicyValue::TrustAnchor(anchor) => Some(anchor.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clock_skew(&self, name: &Name, now: u64) -> Option<i64> {
        match self.most_specific(PolicyType::ClockSkew, name, now)? {
            PolicyValue::ClockSkew(skew) => Some(*skew),
            _ => None,
        }
    }

    pub fn zone_security(&self, name: &Name, now: u64) -> ZoneSecurity {
        match self.most_specific(PolicyType::ZoneSecurityExpectation, name, now) {
            Some(PolicyValue::ZoneSecurity(expectation)) => *expectation,
            _ => ZoneSecurity::default(),
        }
    }

    /// Whether provably insecure answers under `name` are trusted; they are
    /// unless a policy says otherwise
    pub fn provably_insecure_trusted(&self, name: &Name, now: u64) -> bool {
        match self.most_specific(PolicyType::ProvablyInsecure, name, now) {
            Some(PolicyValue::ProvablyInsecure(trusted)) => *trusted,
            _ => true,
        }
    }

    pub fn nsec3_max_iterations(&self, name: &Name, now: u64) -> Option<u16> {
        match self.most_specific(PolicyType::Nsec3MaxIterations, name, now)? {
            PolicyValue::Nsec3MaxIterations(max) => Some(*max),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.lists.values().map(PolicyList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::builtin()
    }
}
