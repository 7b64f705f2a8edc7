use super::algorithm::{AlgorithmFamily, DnsSecAlgorithm};
use super::digest::DigestType;
use super::records::{Dnskey, Rrsig};
use super::status::AuthStatus;
use crate::dns::{Name, WireCursor};
use crate::error::CryptoError;
use ring::digest;
use ring::signature::{self, RsaParameters, RsaPublicKeyComponents, UnparsedPublicKey};
use tracing::{debug, trace};

/// Result of one cryptographic signature check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Failed,
    /// The public key could not be decoded for this algorithm
    InvalidKey,
    Unsupported,
}

impl From<CryptoError> for VerifyOutcome {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::MalformedKey(_) => VerifyOutcome::InvalidKey,
            CryptoError::MalformedSignature(_) => VerifyOutcome::Failed,
            CryptoError::UnsupportedAlgorithm(_) | CryptoError::UnsupportedDigest(_) => {
                VerifyOutcome::Unsupported
            }
        }
    }
}

/// One signature algorithm: checks `signature` over `data` with a raw
/// DNSKEY public key field
pub trait SignatureVerifier {
    fn verify(&self, data: &[u8], public_key: &[u8], signature: &[u8]) -> VerifyOutcome;
}

/// Verifier for each algorithm family the validator supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmVerifier {
    RsaMd5,
    DsaSha1,
    RsaSha(AlgorithmFamily),
    Ecdsa(AlgorithmFamily),
    Unsupported(u8),
}

impl AlgorithmVerifier {
    pub fn for_algorithm(algorithm: u8) -> Self {
        match DnsSecAlgorithm::from_u8(algorithm).and_then(|alg| alg.family()) {
            Some(AlgorithmFamily::RsaMd5) => Self::RsaMd5,
            Some(AlgorithmFamily::DsaSha1) => Self::DsaSha1,
            Some(
                family @ (AlgorithmFamily::RsaSha1
                | AlgorithmFamily::RsaSha256
                | AlgorithmFamily::RsaSha512),
            ) => Self::RsaSha(family),
            Some(family @ (AlgorithmFamily::EcdsaP256 | AlgorithmFamily::EcdsaP384)) => {
                Self::Ecdsa(family)
            }
            None => Self::Unsupported(algorithm),
        }
    }

    fn algorithm(&self) -> u8 {
        match self {
            Self::RsaMd5 => 1,
            Self::DsaSha1 => 3,
            Self::RsaSha(AlgorithmFamily::RsaSha1) => 5,
            Self::RsaSha(AlgorithmFamily::RsaSha512) => 10,
            Self::RsaSha(_) => 8,
            Self::Ecdsa(AlgorithmFamily::EcdsaP384) => 14,
            Self::Ecdsa(_) => 13,
            Self::Unsupported(alg) => *alg,
        }
    }

    fn try_verify(&self, data: &[u8], key: &[u8], sig: &[u8]) -> Result<bool, CryptoError> {
        let alg = self.algorithm();
        match self {
            Self::RsaMd5 => {
                let components = rsa_components(alg, key)?;
                verify_rsa_pkcs1(alg, AlgorithmFamily::RsaMd5, data, components, sig)
            }
            Self::DsaSha1 => verify_dsa(alg, data, key, sig),
            Self::RsaSha(family) => {
                let (e, n) = rsa_components(alg, key)?;
                if modulus_bits(n) < RING_MIN_RSA_BITS {
                    return verify_rsa_pkcs1(alg, *family, data, (e, n), sig);
                }
                let params: &RsaParameters = match family {
                    AlgorithmFamily::RsaSha1 => {
                        &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY
                    }
                    AlgorithmFamily::RsaSha512 => {
                        &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY
                    }
                    _ => &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
                };
                Ok(RsaPublicKeyComponents { n, e }.verify(params, data, sig).is_ok())
            }
            Self::Ecdsa(family) => {
                let (params, len): (&'static signature::EcdsaVerificationAlgorithm, usize) =
                    match family {
                        AlgorithmFamily::EcdsaP384 => (&signature::ECDSA_P384_SHA384_FIXED, 96),
                        _ => (&signature::ECDSA_P256_SHA256_FIXED, 64),
                    };
                if key.len() != len {
                    return Err(CryptoError::MalformedKey(alg));
                }
                if sig.len() != len {
                    return Err(CryptoError::MalformedSignature(alg));
                }
                // DNSSEC carries the bare x|y point (RFC 6605 §4)
                let mut point = Vec::with_capacity(len + 1);
                point.push(0x04);
                point.extend_from_slice(key);
                Ok(UnparsedPublicKey::new(params, point).verify(data, sig).is_ok())
            }
            Self::Unsupported(alg) => Err(CryptoError::UnsupportedAlgorithm(*alg)),
        }
    }
}

impl SignatureVerifier for AlgorithmVerifier {
    fn verify(&self, data: &[u8], public_key: &[u8], signature: &[u8]) -> VerifyOutcome {
        match self.try_verify(data, public_key, signature) {
            Ok(true) => VerifyOutcome::Verified,
            Ok(false) => VerifyOutcome::Failed,
            Err(err) => {
                trace!(error = %err, "signature check aborted");
                err.into()
            }
        }
    }
}

/// Smallest modulus ring's RSA verifier accepts
const RING_MIN_RSA_BITS: usize = 1024;

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Split an RSA public key field into exponent and modulus (RFC 3110 §2)
fn rsa_components(alg: u8, key: &[u8]) -> Result<(&[u8], &[u8]), CryptoError> {
    let malformed = |_| CryptoError::MalformedKey(alg);
    let mut cursor = WireCursor::new(key);
    let exp_len = match cursor.read_u8().map_err(malformed)? {
        0 => cursor.read_u16().map_err(malformed)? as usize,
        len => len as usize,
    };
    let e = strip_leading_zeros(cursor.read_bytes(exp_len).map_err(malformed)?);
    let n = strip_leading_zeros(cursor.read_rest());
    if e.is_empty() || n.is_empty() {
        return Err(CryptoError::MalformedKey(alg));
    }
    Ok((e, n))
}

fn modulus_bits(n: &[u8]) -> usize {
    n.first()
        .map_or(0, |top| n.len() * 8 - top.leading_zeros() as usize)
}

/// PKCS#1 v1.5 through the `rsa` crate, for RSA/MD5 and for moduli below
/// ring's 1024-bit floor (RFC 3110 allows 512)
fn verify_rsa_pkcs1(
    alg: u8,
    family: AlgorithmFamily,
    data: &[u8],
    (e, n): (&[u8], &[u8]),
    sig: &[u8],
) -> Result<bool, CryptoError> {
    use md5::Md5;
    use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
    use sha1::Sha1;
    use sha2::{Digest, Sha256, Sha512};

    let public = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
        .map_err(|_| CryptoError::MalformedKey(alg))?;
    let (scheme, hashed) = match family {
        AlgorithmFamily::RsaMd5 => (Pkcs1v15Sign::new::<Md5>(), Md5::digest(data).to_vec()),
        AlgorithmFamily::RsaSha1 => (Pkcs1v15Sign::new::<Sha1>(), Sha1::digest(data).to_vec()),
        AlgorithmFamily::RsaSha512 => {
            (Pkcs1v15Sign::new::<Sha512>(), Sha512::digest(data).to_vec())
        }
        _ => (Pkcs1v15Sign::new::<Sha256>(), Sha256::digest(data).to_vec()),
    };
    Ok(public.verify(scheme, &hashed, sig).is_ok())
}

/// DSA key: T | Q(20) | P | G | Y, each of P, G, Y 64 + 8T bytes (RFC 2536 §2)
fn verify_dsa(alg: u8, data: &[u8], key: &[u8], sig: &[u8]) -> Result<bool, CryptoError> {
    use dsa::signature::hazmat::PrehashVerifier;
    use dsa::{BigUint, Components, Signature, VerifyingKey};

    let malformed = |_| CryptoError::MalformedKey(alg);
    let mut cursor = WireCursor::new(key);
    let t = cursor.read_u8().map_err(malformed)?;
    if t > 8 {
        return Err(CryptoError::MalformedKey(alg));
    }
    let width = 64 + 8 * t as usize;
    let q = cursor.read_bytes(20).map_err(malformed)?;
    let p = cursor.read_bytes(width).map_err(malformed)?;
    let g = cursor.read_bytes(width).map_err(malformed)?;
    let y = cursor.read_bytes(width).map_err(malformed)?;
    if !cursor.is_empty() {
        return Err(CryptoError::MalformedKey(alg));
    }

    // Signature: T | R(20) | S(20)
    if sig.len() != 41 {
        return Err(CryptoError::MalformedSignature(alg));
    }
    let signature = match Signature::from_components(
        BigUint::from_bytes_be(&sig[1..21]),
        BigUint::from_bytes_be(&sig[21..41]),
    ) {
        Ok(signature) => signature,
        Err(_) => return Ok(false),
    };

    let components = Components::from_components(
        BigUint::from_bytes_be(p),
        BigUint::from_bytes_be(q),
        BigUint::from_bytes_be(g),
    )
    .map_err(|_| CryptoError::MalformedKey(alg))?;
    let verifying_key = VerifyingKey::from_components(components, BigUint::from_bytes_be(y))
        .map_err(|_| CryptoError::MalformedKey(alg))?;

    let hashed = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, data);
    Ok(verifying_key
        .verify_prehash(hashed.as_ref(), &signature)
        .is_ok())
}

/// Key-level problems that disqualify a DNSKEY from verifying anything
pub fn check_dnskey(dnskey: &Dnskey) -> Option<AuthStatus> {
    if dnskey.protocol != Dnskey::PROTOCOL {
        return Some(AuthStatus::UnknownDnskeyProtocol);
    }
    if !dnskey.is_zone_key() {
        return Some(AuthStatus::InvalidKey);
    }
    None
}

/// Check one RRSIG against one DNSKEY over an already canonicalized stream.
///
/// `clock_skew` widens the validity window by that many seconds on both
/// sides; a negative value disables the time checks entirely. A signature
/// that only verifies thanks to the allowance reports a `*-skew` status.
pub fn verify_signature(
    canonical: &[u8],
    is_wildcard: bool,
    dnskey: &Dnskey,
    rrsig: &Rrsig,
    now: u64,
    clock_skew: i64,
) -> AuthStatus {
    if check_dnskey(dnskey).is_some() {
        return AuthStatus::InvalidKey;
    }
    if dnskey.algorithm != rrsig.algorithm {
        return AuthStatus::RrsigAlgorithmMismatch;
    }

    let mut skewed = false;
    if clock_skew >= 0 {
        let now = now as i64;
        let inception = i64::from(rrsig.inception);
        let expiration = i64::from(rrsig.expiration);
        if now < inception - clock_skew {
            debug!(now, inception, clock_skew, "signature not yet active");
            return AuthStatus::RrsigNotYetActive;
        }
        if now > expiration + clock_skew {
            debug!(now, expiration, clock_skew, "signature expired");
            return AuthStatus::RrsigExpired;
        }
        skewed = now < inception || now > expiration;
    }

    let verifier = AlgorithmVerifier::for_algorithm(rrsig.algorithm);
    match verifier.verify(canonical, &dnskey.public_key, &rrsig.signature) {
        VerifyOutcome::Verified => match (is_wildcard, skewed) {
            (false, false) => AuthStatus::RrsigVerified,
            (false, true) => AuthStatus::RrsigVerifiedSkew,
            (true, false) => AuthStatus::WcardVerified,
            (true, true) => AuthStatus::WcardVerifiedSkew,
        },
        VerifyOutcome::Failed => AuthStatus::RrsigVerifyFailed,
        VerifyOutcome::InvalidKey => AuthStatus::InvalidKey,
        VerifyOutcome::Unsupported => AuthStatus::AlgorithmNotSupported,
    }
}

/// Compare a DS digest with the digest of `owner | dnskey_rdata`
/// (RFC 4034 §5.1.4)
pub fn ds_matches(
    digest_type: u8,
    digest: &[u8],
    owner: &Name,
    dnskey_rdata: &[u8],
) -> Result<bool, CryptoError> {
    let computed = DigestType::from_u8(digest_type)
        .and_then(|dt| dt.digest(&[&owner.canonical_wire(), dnskey_rdata]))
        .ok_or(CryptoError::UnsupportedDigest(digest_type))?;
    Ok(computed.len() == digest.len() && computed == digest)
}
