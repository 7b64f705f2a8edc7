use super::enums::{DNSResourceClass, DNSResourceType};
use super::name::Name;

/// A resource record set as handed over by the resolver layer.
///
/// Record data is kept in canonical order (RFC 4034 §6.3): byte-wise
/// comparison of the rdata with the shorter of two equal prefixes first,
/// duplicates removed. The order is part of the signed byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RRset {
    owner: Name,
    rtype: DNSResourceType,
    class: DNSResourceClass,
    ttl: u32,
    expires_at: Option<u64>,
    data: Vec<Vec<u8>>,
    signatures: Vec<Vec<u8>>,
}

impl RRset {
    pub fn new(
        owner: Name,
        rtype: DNSResourceType,
        class: DNSResourceClass,
        ttl: u32,
        data: Vec<Vec<u8>>,
        signatures: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            owner,
            rtype,
            class,
            ttl,
            expires_at: None,
            data: canonical_order(data),
            signatures,
        }
    }

    /// Record the absolute expiration derived from the TTL at receipt time
    pub fn with_expiration(mut self, received_at: u64) -> Self {
        self.expires_at = Some(received_at.saturating_add(u64::from(self.ttl)));
        self
    }

    pub fn owner(&self) -> &Name {
        &self.owner
    }

    pub fn rtype(&self) -> DNSResourceType {
        self.rtype
    }

    pub fn class(&self) -> DNSResourceClass {
        self.class
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Record data in canonical order
    pub fn data(&self) -> &[Vec<u8>] {
        &self.data
    }

    /// Raw RRSIG rdata covering this set
    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    pub fn add_signature(&mut self, rrsig: Vec<u8>) {
        self.signatures.push(rrsig);
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }
}

/// Sort record data canonically and drop duplicates
pub fn canonical_order(mut data: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    data.sort_unstable();
    data.dedup();
    data
}
