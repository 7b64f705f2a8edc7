//! DNSSEC record model, canonical form, signature verification and
//! authentication chain assembly.

pub mod algorithm;
pub mod canonical;
pub mod chain;
pub mod digest;
pub mod key_tag;
pub mod nsec3;
pub mod records;
pub mod status;
pub mod trust_anchor;
pub mod verifier;

pub use algorithm::{AlgorithmFamily, DnsSecAlgorithm};
pub use canonical::canonicalize;
pub use chain::{Assertion, VerifyOptions, link_dnskey_to_ds, verify_assertion, verify_chain};
pub use digest::DigestType;
pub use key_tag::calculate_key_tag;
pub use records::{Dnskey, Ds, Nsec3, Rrsig, TypedRecord, parse_record, parse_record_in_message};
pub use status::AuthStatus;
pub use trust_anchor::TrustAnchor;
pub use verifier::{AlgorithmVerifier, SignatureVerifier, VerifyOutcome, ds_matches, verify_signature};
