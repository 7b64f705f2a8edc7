use super::records::Nsec3;
use super::status::AuthStatus;
use crate::dns::Name;
use ring::digest;

/// The only NSEC3 hash algorithm defined (RFC 5155 §11)
pub const NSEC3_SHA1: u8 = 1;

/// Iterated hash of an owner name (RFC 5155 §5):
/// `IH(0) = H(name | salt)`, `IH(k) = H(IH(k-1) | salt)`.
///
/// Returns `None` for hash algorithms other than SHA-1.
pub fn nsec3_hash(name: &Name, hash_algorithm: u8, salt: &[u8], iterations: u16) -> Option<Vec<u8>> {
    if hash_algorithm != NSEC3_SHA1 {
        return None;
    }

    let mut ctx = digest::Context::new(&digest::SHA1_FOR_LEGACY_USE_ONLY);
    ctx.update(&name.canonical_wire());
    ctx.update(salt);
    let mut hash = ctx.finish();

    for _ in 0..iterations {
        let mut ctx = digest::Context::new(&digest::SHA1_FOR_LEGACY_USE_ONLY);
        ctx.update(hash.as_ref());
        ctx.update(salt);
        hash = ctx.finish();
    }

    Some(hash.as_ref().to_vec())
}

/// The hashed owner label for `name` in base32hex, as used in NSEC3 owner names
pub fn hashed_owner_label(name: &Name, nsec3: &Nsec3) -> Option<String> {
    let hash = nsec3_hash(name, nsec3.hash_algorithm, &nsec3.salt, nsec3.iterations)?;
    Some(base32::encode(
        base32::Alphabet::Rfc4648HexLower { padding: false },
        &hash,
    ))
}

/// True if `hash` falls strictly between the NSEC3 owner hash and its next
/// hashed owner, wrapping around at the end of the zone
pub fn covers(owner_hash: &[u8], next_hash: &[u8], hash: &[u8]) -> bool {
    if owner_hash < next_hash {
        owner_hash < hash && hash < next_hash
    } else {
        owner_hash < hash || hash < next_hash
    }
}

/// Status for an NSEC3 record that cannot be used: unknown hash algorithm,
/// or more iterations than the zone's `nsec3-max-iter` policy allows.
/// Such records are treated as insecure rather than bogus (RFC 5155 §10.3).
pub fn nsec3_usability(nsec3: &Nsec3, max_iterations: u16) -> Option<AuthStatus> {
    if nsec3.hash_algorithm != NSEC3_SHA1 || nsec3.iterations > max_iterations {
        return Some(AuthStatus::AlgorithmNotSupported);
    }
    None
}
