//! TOML policy documents.
//!
//! ```toml
//! [[fragment]]
//! label = ":"
//! keyword = "clock-skew"
//! entries = [{ zone = ".", value = 60 }]
//!
//! [[fragment]]
//! label = "browser"
//! keyword = "trust-anchor"
//! entries = [{ zone = "example.", value = "257 3 13 <base64>", expires_at = 1767225600 }]
//! ```

use super::scope::{Overrides, check_relevance};
use super::{PolicyEntry, PolicyList, PolicySet, PolicyType, PolicyValue, ZoneSecurity};
use crate::dns::Name;
use crate::dnssec::TrustAnchor;
use crate::error::PolicyError;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// A parsed but not yet resolved policy document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "fragment", default)]
    pub fragments: Vec<FragmentSpec>,
}

/// Entries for one keyword, applicable to callers whose scope contains `label`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmentSpec {
    pub label: String,
    pub keyword: String,
    #[serde(default)]
    pub entries: Vec<EntrySpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntrySpec {
    pub zone: String,
    pub value: RawValue,
    #[serde(default)]
    pub expires_at: Option<u64>,
}

/// Value as written in the document, before it is checked against its keyword
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl PolicyDocument {
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let document = Self::parse(&text)?;
        debug!(
            path = %path.display(),
            fragments = document.fragments.len(),
            "policy document read"
        );
        Ok(document)
    }

    /// Build the effective policy for `scope` on top of the built-in
    /// defaults.
    ///
    /// Every fragment is checked, relevant or not, so a bad document is
    /// rejected as a whole. Without a scope only the most general fragment
    /// label is applied.
    pub fn resolve(&self, scope: Option<&str>) -> Result<PolicySet, PolicyError> {
        let mut overrides = Overrides::new();
        for fragment in &self.fragments {
            let ptype: PolicyType = fragment.keyword.parse()?;
            let depth = check_relevance(&fragment.label, scope)?;
            let list = fragment.to_list(ptype)?;
            if let Some(depth) = depth {
                overrides.store(&fragment.label, depth, ptype, list);
            }
        }
        if scope.is_none() {
            overrides.retain_most_general();
        }

        info!(
            scope = scope.unwrap_or(""),
            fragments = overrides.len(),
            "policy resolved"
        );
        Ok(overrides.apply(PolicySet::builtin()))
    }
}

impl FragmentSpec {
    fn to_list(&self, ptype: PolicyType) -> Result<PolicyList, PolicyError> {
        let mut list = PolicyList::new();
        for spec in &self.entries {
            list.insert(spec.to_entry(ptype)?);
        }
        Ok(list)
    }
}

impl EntrySpec {
    fn to_entry(&self, ptype: PolicyType) -> Result<PolicyEntry, PolicyError> {
        let zone: Name = self.zone.parse().map_err(|e: crate::error::ParseError| {
            PolicyError::InvalidZone {
                zone: self.zone.clone(),
                reason: e.to_string(),
            }
        })?;
        let value = self.typed_value(ptype)?;
        let entry = PolicyEntry::new(zone, value);
        Ok(match self.expires_at {
            Some(at) => entry.expiring_at(at),
            None => entry,
        })
    }

    fn invalid(&self, ptype: PolicyType, reason: impl Into<String>) -> PolicyError {
        PolicyError::InvalidValue {
            keyword: ptype.keyword().to_string(),
            zone: self.zone.clone(),
            reason: reason.into(),
        }
    }

    fn typed_value(&self, ptype: PolicyType) -> Result<PolicyValue, PolicyError> {
        match (ptype, &self.value) {
            (PolicyType::TrustAnchor, RawValue::Text(text)) => TrustAnchor::from_presentation(text)
                .map(PolicyValue::TrustAnchor)
                .map_err(|e| self.invalid(ptype, e.to_string())),

            (PolicyType::ClockSkew, RawValue::Integer(seconds)) => {
                Ok(PolicyValue::ClockSkew(*seconds))
            }
            (PolicyType::ClockSkew, RawValue::Text(text)) => text
                .trim()
                .parse()
                .map(PolicyValue::ClockSkew)
                .map_err(|_| self.invalid(ptype, format!("'{}' is not a number of seconds", text))),

            (PolicyType::ProvablyInsecure, RawValue::Bool(trusted)) => {
                Ok(PolicyValue::ProvablyInsecure(*trusted))
            }
            (PolicyType::ProvablyInsecure, RawValue::Text(text)) => {
                match text.to_ascii_lowercase().as_str() {
                    "trusted" => Ok(PolicyValue::ProvablyInsecure(true)),
                    "untrusted" => Ok(PolicyValue::ProvablyInsecure(false)),
                    _ => Err(self.invalid(ptype, format!("expected trusted or untrusted, got '{}'", text))),
                }
            }

            (PolicyType::ZoneSecurityExpectation, RawValue::Text(text)) => text
                .parse::<ZoneSecurity>()
                .map(PolicyValue::ZoneSecurity)
                .map_err(|reason| self.invalid(ptype, reason)),

            (PolicyType::Nsec3MaxIterations, RawValue::Integer(max)) => u16::try_from(*max)
                .map(PolicyValue::Nsec3MaxIterations)
                .map_err(|_| self.invalid(ptype, format!("{} is not between 0 and 65535", max))),

            (_, other) => Err(self.invalid(ptype, format!("unexpected value {:?}", other))),
        }
    }
}
