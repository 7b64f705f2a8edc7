use super::records::{Dnskey, Ds};
use super::verifier::ds_matches;
use crate::dns::Name;
use crate::error::ParseError;
use std::fmt;

/// Digest of the root KSK-2017 (key tag 20326, RSA/SHA-256), SHA-256
const ROOT_KSK_2017_DS_DIGEST: [u8; 32] = [
    0xe0, 0x6d, 0x44, 0xb8, 0x0b, 0x8f, 0x1d, 0x39, 0xa9, 0x5c, 0x0b, 0x0d, 0x7c, 0x65, 0xd0, 0x84,
    0x58, 0xe8, 0x80, 0x40, 0x9b, 0xbc, 0x68, 0x34, 0x57, 0x10, 0x42, 0x37, 0xc7, 0xf8, 0xec, 0x8d,
];

/// A DNSSEC trust anchor, configured either as a full DNSKEY or as the DS
/// digest of one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustAnchor {
    Key(Dnskey),
    Ds(Ds),
}

impl TrustAnchor {
    /// The IANA root anchor, as published in DS form
    pub fn root() -> Self {
        TrustAnchor::Ds(Ds {
            key_tag: 20326,
            algorithm: 8,
            digest_type: 2,
            digest: ROOT_KSK_2017_DS_DIGEST.to_vec(),
        })
    }

    /// Parse `"257 3 8 <base64>"` or `"DS 20326 8 2 <hex>"`
    pub fn from_presentation(text: &str) -> Result<Self, ParseError> {
        let is_ds = text
            .split_whitespace()
            .next()
            .is_some_and(|first| first.eq_ignore_ascii_case("DS"));
        if is_ds {
            Ds::from_presentation(text).map(TrustAnchor::Ds)
        } else {
            Dnskey::from_presentation(text).map(TrustAnchor::Key)
        }
    }

    pub fn key_tag(&self) -> u16 {
        match self {
            TrustAnchor::Key(key) => key.key_tag(),
            TrustAnchor::Ds(ds) => ds.key_tag,
        }
    }

    pub fn algorithm(&self) -> u8 {
        match self {
            TrustAnchor::Key(key) => key.algorithm,
            TrustAnchor::Ds(ds) => ds.algorithm,
        }
    }

    /// True if `dnskey`, published at `owner`, is the key this anchor names
    pub fn matches_key(&self, owner: &Name, dnskey: &Dnskey) -> bool {
        match self {
            TrustAnchor::Key(key) => key == dnskey,
            TrustAnchor::Ds(ds) => {
                ds.key_tag == dnskey.key_tag()
                    && ds.algorithm == dnskey.algorithm
                    && ds_matches(ds.digest_type, &ds.digest, owner, &dnskey.to_wire())
                        .unwrap_or(false)
            }
        }
    }

    /// True if the anchor is a DNSKEY equal to `rdata`
    pub fn is_key_rdata(&self, rdata: &[u8]) -> bool {
        matches!(self, TrustAnchor::Key(key) if key.to_wire() == rdata)
    }
}

impl fmt::Display for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustAnchor::Key(key) => write!(
                f,
                "DNSKEY {} {} {} (tag {})",
                key.flags,
                key.protocol,
                key.algorithm,
                key.key_tag()
            ),
            TrustAnchor::Ds(ds) => write!(
                f,
                "DS {} {} {} {}",
                ds.key_tag,
                ds.algorithm,
                ds.digest_type,
                hex::encode_upper(&ds.digest)
            ),
        }
    }
}
