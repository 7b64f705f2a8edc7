use std::fmt;
use std::str::FromStr;

/// DNSSEC algorithm numbers (RFC 4034, 5155, 5702, 6605, 8080)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// Diffie-Hellman, never valid for signing
    DH = 2,
    /// DSA/SHA1 (RFC 2536)
    DSA = 3,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1 = 6,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

/// Verification families; each maps onto one verifier implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    RsaMd5,
    DsaSha1,
    RsaSha1,
    RsaSha256,
    RsaSha512,
    EcdsaP256,
    EcdsaP384,
}

impl DnsSecAlgorithm {
    /// Create from algorithm number
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RsaMd5),
            2 => Some(Self::DH),
            3 => Some(Self::DSA),
            5 => Some(Self::RsaSha1),
            6 => Some(Self::DsaNsec3Sha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            12 => Some(Self::EccGost),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// The verifier family, or `None` when this validator cannot check it
    pub fn family(&self) -> Option<AlgorithmFamily> {
        match self {
            Self::RsaMd5 => Some(AlgorithmFamily::RsaMd5),
            Self::DSA | Self::DsaNsec3Sha1 => Some(AlgorithmFamily::DsaSha1),
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 => Some(AlgorithmFamily::RsaSha1),
            Self::RsaSha256 => Some(AlgorithmFamily::RsaSha256),
            Self::RsaSha512 => Some(AlgorithmFamily::RsaSha512),
            Self::EcdsaP256Sha256 => Some(AlgorithmFamily::EcdsaP256),
            Self::EcdsaP384Sha384 => Some(AlgorithmFamily::EcdsaP384),
            Self::DH | Self::EccGost | Self::Ed25519 | Self::Ed448 => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.family().is_some()
    }

    /// RSA/MD5 keys use the modulus-derived key tag (RFC 4034 Appendix B.1)
    pub fn uses_legacy_key_tag(&self) -> bool {
        matches!(self, Self::RsaMd5)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::RsaMd5 => "RSAMD5",
            Self::DH => "DH",
            Self::DSA => "DSA",
            Self::RsaSha1 => "RSASHA1",
            Self::DsaNsec3Sha1 => "DSA-NSEC3-SHA1",
            Self::RsaSha1Nsec3Sha1 => "RSASHA1-NSEC3-SHA1",
            Self::RsaSha256 => "RSASHA256",
            Self::RsaSha512 => "RSASHA512",
            Self::EccGost => "ECC-GOST",
            Self::EcdsaP256Sha256 => "ECDSAP256SHA256",
            Self::EcdsaP384Sha384 => "ECDSAP384SHA384",
            Self::Ed25519 => "ED25519",
            Self::Ed448 => "ED448",
        }
    }
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

impl FromStr for DnsSecAlgorithm {
    type Err = String;

    /// Accepts either the numeric code or the mnemonic
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_u8(code).ok_or_else(|| format!("unknown algorithm {}", code));
        }
        let upper = s.to_ascii_uppercase();
        (1..=16u8)
            .filter_map(Self::from_u8)
            .find(|alg| alg.mnemonic() == upper)
            .ok_or_else(|| format!("unknown algorithm {}", s))
    }
}
