//! Typed DNSSEC record data: DNSKEY, RRSIG, DS and NSEC3.
//!
//! Every parser works on a [`WireCursor`] so no length taken from the
//! input is trusted before it has been checked against the window.

use super::digest::DigestType;
use super::key_tag::key_tag_from_rdata;
use crate::dns::{DNSResourceType, Name, WireCursor};
use crate::error::ParseError;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

/// Fixed DNSKEY header: flags, protocol, algorithm
pub const DNSKEY_HEADER_LEN: usize = 4;

/// Fixed RRSIG header before the signer name
pub const RRSIG_HEADER_LEN: usize = 18;

/// Fixed DS header before the digest
pub const DS_HEADER_LEN: usize = 4;

/// DNSKEY record data (RFC 4034 §2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dnskey {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

impl Dnskey {
    pub const ZONE_KEY_FLAG: u16 = 0x0100;
    pub const REVOKE_FLAG: u16 = 0x0080;
    pub const SEP_FLAG: u16 = 0x0001;
    pub const PROTOCOL: u8 = 3;

    pub fn parse(rdata: &[u8]) -> Result<Self, ParseError> {
        Self::from_cursor(&mut WireCursor::new(rdata))
    }

    pub fn from_cursor(cursor: &mut WireCursor<'_>) -> Result<Self, ParseError> {
        if cursor.remaining() < DNSKEY_HEADER_LEN {
            return Err(ParseError::BufferTooSmall {
                need: DNSKEY_HEADER_LEN,
                have: cursor.remaining(),
            });
        }
        Ok(Self {
            flags: cursor.read_u16()?,
            protocol: cursor.read_u8()?,
            algorithm: cursor.read_u8()?,
            public_key: cursor.read_rest().to_vec(),
        })
    }

    /// Parse `flags protocol algorithm base64-key` as found in trust anchor
    /// configuration. Whitespace inside the key is ignored.
    pub fn from_presentation(text: &str) -> Result<Self, ParseError> {
        let mut fields = text.split_whitespace();
        let bad = |what: &str| ParseError::Presentation(format!("DNSKEY {}: '{}'", what, text));

        let flags = fields
            .next()
            .and_then(|f| f.parse::<u16>().ok())
            .ok_or_else(|| bad("flags"))?;
        let protocol = fields
            .next()
            .and_then(|f| f.parse::<u8>().ok())
            .ok_or_else(|| bad("protocol"))?;
        let algorithm = fields
            .next()
            .and_then(parse_algorithm)
            .ok_or_else(|| bad("algorithm"))?;
        let encoded: String = fields.collect();
        if encoded.is_empty() {
            return Err(bad("public key"));
        }
        let public_key = BASE64.decode(encoded).map_err(|_| bad("public key"))?;

        Ok(Self {
            flags,
            protocol,
            algorithm,
            public_key,
        })
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DNSKEY_HEADER_LEN + self.public_key.len());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.push(self.protocol);
        out.push(self.algorithm);
        out.extend_from_slice(&self.public_key);
        out
    }

    pub fn key_tag(&self) -> u16 {
        key_tag_from_rdata(self.algorithm, &self.to_wire())
    }

    pub fn is_zone_key(&self) -> bool {
        self.flags & Self::ZONE_KEY_FLAG != 0
    }

    pub fn is_sep(&self) -> bool {
        self.flags & Self::SEP_FLAG != 0
    }

    pub fn is_revoked(&self) -> bool {
        self.flags & Self::REVOKE_FLAG != 0
    }
}

/// RRSIG record data (RFC 4034 §3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rrsig {
    pub type_covered: DNSResourceType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer_name: Name,
    pub signature: Vec<u8>,
}

impl Rrsig {
    pub fn parse(rdata: &[u8]) -> Result<Self, ParseError> {
        Self::from_cursor(&mut WireCursor::new(rdata))
    }

    /// Parse from a cursor whose message may hold compression targets
    /// for the signer name
    pub fn from_cursor(cursor: &mut WireCursor<'_>) -> Result<Self, ParseError> {
        if cursor.remaining() < RRSIG_HEADER_LEN {
            return Err(ParseError::BufferTooSmall {
                need: RRSIG_HEADER_LEN,
                have: cursor.remaining(),
            });
        }
        let type_covered = DNSResourceType::from(cursor.read_u16()?);
        let algorithm = cursor.read_u8()?;
        let labels = cursor.read_u8()?;
        let original_ttl = cursor.read_u32()?;
        let expiration = cursor.read_u32()?;
        let inception = cursor.read_u32()?;
        let key_tag = cursor.read_u16()?;
        let signer_name = Name::from_wire(cursor)?;
        let signature = cursor.read_rest().to_vec();

        Ok(Self {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            expiration,
            inception,
            key_tag,
            signer_name,
            signature,
        })
    }

    /// RRSIG rdata without the signature, signer name lower-cased: the
    /// prefix of the signed data (RFC 4034 §3.1.8.1)
    pub fn signed_header(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RRSIG_HEADER_LEN + self.signer_name.wire_len());
        self.write_fixed(&mut out);
        out.extend_from_slice(&self.signer_name.canonical_wire());
        out
    }

    fn write_fixed(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.type_covered.to_u16().to_be_bytes());
        out.push(self.algorithm);
        out.push(self.labels);
        out.extend_from_slice(&self.original_ttl.to_be_bytes());
        out.extend_from_slice(&self.expiration.to_be_bytes());
        out.extend_from_slice(&self.inception.to_be_bytes());
        out.extend_from_slice(&self.key_tag.to_be_bytes());
    }

    /// Uncompressed rdata with the signer name in its original case
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            RRSIG_HEADER_LEN + self.signer_name.wire_len() + self.signature.len(),
        );
        self.write_fixed(&mut out);
        out.extend_from_slice(self.signer_name.as_wire());
        out.extend_from_slice(&self.signature);
        out
    }
}

/// DS record data (RFC 4034 §5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ds {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

impl Ds {
    pub fn parse(rdata: &[u8]) -> Result<Self, ParseError> {
        Self::from_cursor(&mut WireCursor::new(rdata))
    }

    pub fn from_cursor(cursor: &mut WireCursor<'_>) -> Result<Self, ParseError> {
        if cursor.remaining() < DS_HEADER_LEN {
            return Err(ParseError::BufferTooSmall {
                need: DS_HEADER_LEN,
                have: cursor.remaining(),
            });
        }
        let key_tag = cursor.read_u16()?;
        let algorithm = cursor.read_u8()?;
        let digest_type = cursor.read_u8()?;
        let expected = DigestType::from_u8(digest_type)
            .ok_or(ParseError::UnsupportedDigestType(digest_type))?
            .digest_len();
        if cursor.remaining() != expected {
            return Err(ParseError::DigestLengthMismatch {
                digest_type,
                expected,
                actual: cursor.remaining(),
            });
        }
        let digest = cursor.read_bytes(expected)?.to_vec();

        Ok(Self {
            key_tag,
            algorithm,
            digest_type,
            digest,
        })
    }

    /// Parse `keytag algorithm digest-type hex-digest`, optionally with a
    /// leading `DS` token
    pub fn from_presentation(text: &str) -> Result<Self, ParseError> {
        let mut fields = text.split_whitespace().peekable();
        if fields.peek().is_some_and(|f| f.eq_ignore_ascii_case("DS")) {
            fields.next();
        }
        let bad = |what: &str| ParseError::Presentation(format!("DS {}: '{}'", what, text));

        let key_tag = fields
            .next()
            .and_then(|f| f.parse::<u16>().ok())
            .ok_or_else(|| bad("key tag"))?;
        let algorithm = fields
            .next()
            .and_then(parse_algorithm)
            .ok_or_else(|| bad("algorithm"))?;
        let digest_type = fields
            .next()
            .and_then(|f| f.parse::<u8>().ok())
            .ok_or_else(|| bad("digest type"))?;
        let encoded: String = fields.collect();
        let digest = hex::decode(encoded).map_err(|_| bad("digest"))?;

        // Reuse the wire checks on digest type and length
        let mut wire = Vec::with_capacity(DS_HEADER_LEN + digest.len());
        wire.extend_from_slice(&key_tag.to_be_bytes());
        wire.push(algorithm);
        wire.push(digest_type);
        wire.extend_from_slice(&digest);
        Self::parse(&wire)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DS_HEADER_LEN + self.digest.len());
        out.extend_from_slice(&self.key_tag.to_be_bytes());
        out.push(self.algorithm);
        out.push(self.digest_type);
        out.extend_from_slice(&self.digest);
        out
    }
}

/// NSEC3 record data (RFC 5155 §3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec3 {
    pub hash_algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    pub salt: Vec<u8>,
    pub next_hashed_owner: Vec<u8>,
    pub type_bitmap: Vec<u8>,
}

impl Nsec3 {
    pub const OPT_OUT_FLAG: u8 = 0x01;

    pub fn parse(rdata: &[u8]) -> Result<Self, ParseError> {
        Self::from_cursor(&mut WireCursor::new(rdata))
    }

    pub fn from_cursor(cursor: &mut WireCursor<'_>) -> Result<Self, ParseError> {
        let hash_algorithm = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let iterations = cursor.read_u16()?;
        let salt = cursor.read_length_prefixed()?.to_vec();
        let next_hashed_owner = cursor.read_length_prefixed()?.to_vec();
        let type_bitmap = cursor.read_rest().to_vec();

        Ok(Self {
            hash_algorithm,
            flags,
            iterations,
            salt,
            next_hashed_owner,
            type_bitmap,
        })
    }

    /// Encode the record data. Salt and next hashed owner carry one-byte
    /// lengths, so longer values are refused rather than truncated.
    pub fn to_wire(&self) -> Result<Vec<u8>, ParseError> {
        let salt_len = u8::try_from(self.salt.len()).map_err(|_| ParseError::FieldTooLong {
            field: "NSEC3 salt",
            len: self.salt.len(),
        })?;
        let hash_len =
            u8::try_from(self.next_hashed_owner.len()).map_err(|_| ParseError::FieldTooLong {
                field: "NSEC3 next hashed owner",
                len: self.next_hashed_owner.len(),
            })?;

        let mut out = Vec::with_capacity(
            6 + self.salt.len() + self.next_hashed_owner.len() + self.type_bitmap.len(),
        );
        out.push(self.hash_algorithm);
        out.push(self.flags);
        out.extend_from_slice(&self.iterations.to_be_bytes());
        out.push(salt_len);
        out.extend_from_slice(&self.salt);
        out.push(hash_len);
        out.extend_from_slice(&self.next_hashed_owner);
        out.extend_from_slice(&self.type_bitmap);
        Ok(out)
    }

    pub fn opt_out(&self) -> bool {
        self.flags & Self::OPT_OUT_FLAG != 0
    }

    /// Next hashed owner name in base32hex, as it appears in presentation format
    pub fn next_hashed_owner_base32(&self) -> String {
        base32::encode(
            base32::Alphabet::Rfc4648HexLower { padding: false },
            &self.next_hashed_owner,
        )
    }

    /// Decode the type bitmap windows (RFC 4034 §4.1.2)
    pub fn types(&self) -> Result<Vec<DNSResourceType>, ParseError> {
        let mut types = Vec::new();
        let mut cursor = WireCursor::new(&self.type_bitmap);
        while !cursor.is_empty() {
            let window = cursor.read_u8()? as u16;
            let bitmap = cursor.read_length_prefixed()?;
            if bitmap.is_empty() || bitmap.len() > 32 {
                return Err(ParseError::Presentation(format!(
                    "NSEC3 bitmap window {} has length {}",
                    window,
                    bitmap.len()
                )));
            }
            for (i, byte) in bitmap.iter().enumerate() {
                for bit in 0..8 {
                    if byte & (0x80 >> bit) != 0 {
                        types.push(DNSResourceType::from(window * 256 + (i as u16) * 8 + bit));
                    }
                }
            }
        }
        Ok(types)
    }

    pub fn has_type(&self, rtype: DNSResourceType) -> bool {
        self.types().is_ok_and(|types| types.contains(&rtype))
    }
}

/// A decoded DNSSEC record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedRecord {
    Dnskey(Dnskey),
    Rrsig(Rrsig),
    Ds(Ds),
    Nsec3(Nsec3),
}

impl TypedRecord {
    pub fn to_wire(&self) -> Result<Vec<u8>, ParseError> {
        match self {
            TypedRecord::Dnskey(r) => Ok(r.to_wire()),
            TypedRecord::Rrsig(r) => Ok(r.to_wire()),
            TypedRecord::Ds(r) => Ok(r.to_wire()),
            TypedRecord::Nsec3(r) => r.to_wire(),
        }
    }
}

/// Algorithm field of a presentation record: any number, or a mnemonic
fn parse_algorithm(field: &str) -> Option<u8> {
    field
        .parse::<u8>()
        .ok()
        .or_else(|| field.parse::<super::DnsSecAlgorithm>().ok().map(|alg| alg.to_u8()))
}

/// Decode standalone record data of the given type
pub fn parse_record(rtype: DNSResourceType, rdata: &[u8]) -> Result<TypedRecord, ParseError> {
    parse_record_at(rtype, &mut WireCursor::new(rdata))
}

/// Decode record data occupying `len` bytes at `offset` of a full DNS
/// message, so compressed signer names can be resolved
pub fn parse_record_in_message(
    rtype: DNSResourceType,
    message: &[u8],
    offset: usize,
    len: usize,
) -> Result<TypedRecord, ParseError> {
    parse_record_at(rtype, &mut WireCursor::with_window(message, offset, len)?)
}

fn parse_record_at(
    rtype: DNSResourceType,
    cursor: &mut WireCursor<'_>,
) -> Result<TypedRecord, ParseError> {
    match rtype {
        DNSResourceType::DNSKEY => Dnskey::from_cursor(cursor).map(TypedRecord::Dnskey),
        DNSResourceType::RRSIG => Rrsig::from_cursor(cursor).map(TypedRecord::Rrsig),
        DNSResourceType::DS => Ds::from_cursor(cursor).map(TypedRecord::Ds),
        DNSResourceType::NSEC3 => Nsec3::from_cursor(cursor).map(TypedRecord::Nsec3),
        other => Err(ParseError::UnsupportedRecordType(other.to_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dnskey_presentation() {
        let key = Dnskey::from_presentation("256 3 13 AQID BAU=").unwrap();
        assert_eq!(key.flags, 256);
        assert_eq!(key.algorithm, 13);
        assert_eq!(key.public_key, vec![1, 2, 3, 4, 5]);
        assert!(key.is_zone_key());
        assert!(!key.is_sep());
        assert!(Dnskey::from_presentation("256 3 13").is_err());
        assert!(Dnskey::from_presentation("256 3 RSASHA3 AQID").is_err());
    }

    #[test]
    fn test_presentation_accepts_unlisted_algorithm_numbers() {
        let key = Dnskey::from_presentation("256 3 99 AQID").unwrap();
        assert_eq!(key.algorithm, 99);
        let key = Dnskey::from_presentation("257 3 ECDSAP256SHA256 AQID").unwrap();
        assert_eq!(key.algorithm, 13);

        let ds = Ds::from_presentation(&format!("12345 15 2 {}", "00".repeat(32))).unwrap();
        assert_eq!(ds.algorithm, 15);
        assert!(Ds::from_presentation(&format!("12345 256 2 {}", "00".repeat(32))).is_err());
    }

    #[test]
    fn test_ds_presentation_checks_length() {
        let digest = "00".repeat(32);
        let ds = Ds::from_presentation(&format!("DS 12345 8 2 {}", digest)).unwrap();
        assert_eq!(ds.key_tag, 12345);
        assert_eq!(ds.digest.len(), 32);

        let short = "00".repeat(20);
        assert!(matches!(
            Ds::from_presentation(&format!("12345 8 2 {}", short)),
            Err(ParseError::DigestLengthMismatch { expected: 32, actual: 20, .. })
        ));
    }

    #[test]
    fn test_nsec3_bitmap() {
        // Window 0: A(1), RRSIG(46); window 0 length 6
        let nsec3 = Nsec3 {
            hash_algorithm: 1,
            flags: 1,
            iterations: 10,
            salt: vec![0xAA],
            next_hashed_owner: vec![0; 20],
            type_bitmap: vec![0x00, 0x06, 0x40, 0x00, 0x00, 0x00, 0x00, 0x02],
        };
        assert!(nsec3.opt_out());
        assert_eq!(
            nsec3.types().unwrap(),
            vec![DNSResourceType::A, DNSResourceType::RRSIG]
        );
        assert!(nsec3.has_type(DNSResourceType::RRSIG));
        assert!(!nsec3.has_type(DNSResourceType::DNSKEY));
    }

    #[test]
    fn test_nsec3_refuses_oversize_fields() {
        let mut nsec3 = Nsec3 {
            hash_algorithm: 1,
            flags: 0,
            iterations: 0,
            salt: vec![0xAB; 256],
            next_hashed_owner: vec![0; 20],
            type_bitmap: Vec::new(),
        };
        assert_eq!(
            nsec3.to_wire(),
            Err(ParseError::FieldTooLong { field: "NSEC3 salt", len: 256 })
        );

        nsec3.salt = vec![0xAB; 255];
        let wire = nsec3.to_wire().unwrap();
        assert_eq!(wire[4], 255);
        assert_eq!(Nsec3::parse(&wire).unwrap(), nsec3);

        nsec3.next_hashed_owner = vec![0; 300];
        assert!(matches!(
            TypedRecord::Nsec3(nsec3).to_wire(),
            Err(ParseError::FieldTooLong { len: 300, .. })
        ));
    }

    #[test]
    fn test_unsupported_type() {
        assert_eq!(
            parse_record(DNSResourceType::A, &[1, 2, 3, 4]),
            Err(ParseError::UnsupportedRecordType(1))
        );
    }
}
