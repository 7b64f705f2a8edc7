//! Authentication chain assembly.
//!
//! An [`Assertion`] wraps one RRset together with the statuses collected
//! while checking it. Each assertion is verified against its trust node:
//! the DNSKEY set of the signer for ordinary data, or the parent DS set for
//! a DNSKEY set, which is self-signed. Chains are verified from the top
//! down so that trust established at an anchor flows towards the data.

use super::canonical::canonicalize;
use super::nsec3::nsec3_usability;
use super::records::{Dnskey, Ds, Nsec3, Rrsig};
use super::status::AuthStatus;
use super::trust_anchor::TrustAnchor;
use super::verifier::{check_dnskey, ds_matches, verify_signature};
use crate::dns::{DNSResourceType, Name, RRset};
use crate::error::{CryptoError, ParseError};
use crate::policy::PolicySet;
use tracing::{debug, trace, warn};

/// Default ceiling on NSEC3 iterations when no policy names one
pub const DEFAULT_NSEC3_MAX_ITERATIONS: u16 = 2500;

/// Per-request knobs for chain verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Seconds since the epoch used for signature validity checks
    pub now: u64,
    /// Clock skew used for zones without a clock-skew policy
    pub default_clock_skew: i64,
    /// Examine every signature even after one has verified
    pub exhaustive: bool,
    pub nsec3_max_iterations: u16,
}

impl VerifyOptions {
    pub fn at(now: u64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            now: 0,
            default_clock_skew: 0,
            exhaustive: false,
            nsec3_max_iterations: DEFAULT_NSEC3_MAX_ITERATIONS,
        }
    }
}

/// One node of an authentication chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    rrset: RRset,
    status: AuthStatus,
    data_status: Vec<AuthStatus>,
    sig_status: Vec<AuthStatus>,
}

impl Assertion {
    pub fn new(rrset: RRset) -> Self {
        let data_status = vec![AuthStatus::Unset; rrset.data().len()];
        let sig_status = vec![AuthStatus::Unset; rrset.signatures().len()];
        Self {
            rrset,
            status: AuthStatus::Unset,
            data_status,
            sig_status,
        }
    }

    pub fn rrset(&self) -> &RRset {
        &self.rrset
    }

    pub fn owner(&self) -> &Name {
        self.rrset.owner()
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    /// Status of each data record, in canonical order
    pub fn data_status(&self) -> &[AuthStatus] {
        &self.data_status
    }

    /// Status of each covering signature, in the order supplied
    pub fn sig_status(&self) -> &[AuthStatus] {
        &self.sig_status
    }

    pub fn into_rrset(self) -> RRset {
        self.rrset
    }

    /// Settle the assertion with `status` without verifying it
    pub(crate) fn settle(&mut self, status: AuthStatus) {
        self.reset();
        self.status = status;
    }

    fn reset(&mut self) {
        self.status = AuthStatus::Unset;
        self.data_status.fill(AuthStatus::Unset);
        self.sig_status.fill(AuthStatus::Unset);
    }

    /// Record a per-signature outcome and fold it into the assertion
    fn set_sig_status(&mut self, index: usize, status: AuthStatus) {
        self.sig_status[index] = status;
        self.status = self.status.merge(status);
    }
}

/// Link a DNSKEY to one DS record of its parent (RFC 4035 §5.2)
pub fn link_dnskey_to_ds(owner: &Name, dnskey: &Dnskey, ds: &Ds) -> AuthStatus {
    if ds.key_tag != dnskey.key_tag() || ds.algorithm != dnskey.algorithm {
        return AuthStatus::DsNomatch;
    }
    match ds_matches(ds.digest_type, &ds.digest, owner, &dnskey.to_wire()) {
        Ok(true) => AuthStatus::VerifiedLink,
        Ok(false) => AuthStatus::DsNomatch,
        Err(CryptoError::UnsupportedDigest(_)) => AuthStatus::AlgorithmNotSupported,
        Err(_) => AuthStatus::InvalidDs,
    }
}

enum KeySource {
    Own,
    Trust,
}

/// Verify one assertion against its trust node.
///
/// `trust` is the signer's DNSKEY assertion for ordinary RRsets and the
/// parent DS assertion for DNSKEY sets. Key statuses are recorded on
/// whichever assertion holds the keys; DS link results on the DS assertion.
pub fn verify_assertion(
    node: &mut Assertion,
    mut trust: Option<&mut Assertion>,
    policy: &PolicySet,
    opts: &VerifyOptions,
) {
    node.reset();

    let rtype = node.rrset.rtype();
    let owner = node.rrset.owner().clone();

    if rtype == DNSResourceType::RRSIG {
        node.status = AuthStatus::BareRrsig;
        return;
    }
    if node.rrset.signatures().is_empty() {
        debug!(owner = %owner, rtype = %rtype, "no RRSIG for rrset");
        node.status = AuthStatus::RrsigMissing;
        return;
    }

    let is_dnskey = rtype == DNSResourceType::DNSKEY;
    let anchors: Vec<TrustAnchor> = if is_dnskey {
        policy.trust_anchors(&owner, opts.now)
    } else {
        Vec::new()
    };
    if node
        .rrset
        .data()
        .iter()
        .any(|rdata| anchors.iter().any(|anchor| anchor.is_key_rdata(rdata)))
    {
        trace!(zone = %owner, "dnskey set contains a configured anchor key");
        node.status = AuthStatus::TrustNoCheck;
    }

    let (source, key_owner, key_rdata) = if is_dnskey {
        (KeySource::Own, owner.clone(), node.rrset.data().to_vec())
    } else {
        match trust.as_deref() {
            Some(keys) if keys.rrset.rtype() == DNSResourceType::DNSKEY => (
                KeySource::Trust,
                keys.owner().clone(),
                keys.rrset.data().to_vec(),
            ),
            _ => {
                debug!(owner = %owner, rtype = %rtype, "no DNSKEY set to verify against");
                node.status = AuthStatus::DnskeyMissing;
                return;
            }
        }
    };
    let keys: Vec<Result<Dnskey, ParseError>> =
        key_rdata.iter().map(|rdata| Dnskey::parse(rdata)).collect();

    let mut linked = false;
    let mut ds_missing = false;
    let signatures = node.rrset.signatures().to_vec();

    for (sig_index, sig_rdata) in signatures.iter().enumerate() {
        let settled = node.sig_status.iter().any(AuthStatus::is_signature_success)
            && (!is_dnskey || linked);
        if settled && !opts.exhaustive {
            break;
        }

        let rrsig = match Rrsig::parse(sig_rdata) {
            Ok(rrsig) => rrsig,
            Err(err) => {
                debug!(owner = %owner, error = %err, "unparseable RRSIG");
                node.set_sig_status(sig_index, AuthStatus::InvalidRrsig);
                continue;
            }
        };

        if rrsig.labels as usize > owner.label_count() {
            node.set_sig_status(sig_index, AuthStatus::WrongLabelCount);
            continue;
        }
        if rrsig.type_covered != rtype {
            node.set_sig_status(sig_index, AuthStatus::InvalidRrsig);
            continue;
        }
        if rrsig.signer_name != key_owner {
            debug!(
                owner = %owner,
                signer = %rrsig.signer_name,
                keys = %key_owner,
                "signer does not own the key set"
            );
            node.set_sig_status(sig_index, AuthStatus::DnskeyNomatch);
            continue;
        }

        let (canonical, is_wildcard) = match canonicalize(&node.rrset, &rrsig) {
            Ok(result) => result,
            Err(ParseError::WildcardNotPermitted(_)) => {
                debug!(owner = %owner, rtype = %rtype, "wildcard expansion of key material");
                node.set_sig_status(sig_index, AuthStatus::InvalidKey);
                continue;
            }
            Err(err) => {
                debug!(owner = %owner, error = %err, "cannot build signed data");
                node.set_sig_status(sig_index, AuthStatus::InvalidRrsig);
                continue;
            }
        };

        let clock_skew = policy
            .clock_skew(&rrsig.signer_name, opts.now)
            .unwrap_or(opts.default_clock_skew);

        let mut sig_status = AuthStatus::DnskeyNomatch;
        let mut signing_key = None;
        for (key_index, key) in keys.iter().enumerate() {
            let key = match key {
                Ok(key) => key,
                Err(_) => {
                    let status = AuthStatus::InvalidKey;
                    set_key_status(node, trust.as_deref_mut(), &source, key_index, status);
                    continue;
                }
            };
            if key.key_tag() != rrsig.key_tag {
                continue;
            }

            if let Some(fault) = check_dnskey(key) {
                set_key_status(node, trust.as_deref_mut(), &source, key_index, fault);
            }
            sig_status = verify_signature(
                &canonical,
                is_wildcard,
                key,
                &rrsig,
                opts.now,
                clock_skew,
            );
            trace!(
                owner = %owner,
                key_tag = rrsig.key_tag,
                status = %sig_status,
                "signature candidate checked"
            );
            if sig_status.is_signature_success() {
                let status = AuthStatus::SigningKey;
                set_key_status(node, trust.as_deref_mut(), &source, key_index, status);
                signing_key = Some((key_index, key));
                break;
            }
            if key_status(node, trust.as_deref(), &source, key_index) == AuthStatus::Unset {
                let status = AuthStatus::SigningKey;
                set_key_status(node, trust.as_deref_mut(), &source, key_index, status);
            }
        }
        if signing_key.is_none() && sig_status != AuthStatus::DnskeyNomatch {
            debug!(owner = %owner, key_tag = rrsig.key_tag, status = %sig_status, "signature failed");
        }
        node.set_sig_status(sig_index, sig_status);

        // A verified DNSKEY set must be anchored or linked to its parent DS
        let Some((key_index, key)) = signing_key else { continue };
        if !is_dnskey || linked {
            continue;
        }

        if anchors.iter().any(|anchor| anchor.matches_key(&owner, key)) {
            debug!(zone = %owner, key_tag = rrsig.key_tag, "key is a trust point");
            node.data_status[key_index] = AuthStatus::TrustPoint;
            node.status = node.status.merge(AuthStatus::Trust);
            linked = true;
            continue;
        }

        match trust.as_deref_mut() {
            Some(ds_set) if ds_set.rrset.rtype() == DNSResourceType::DS => {
                if link_to_ds_set(&owner, key, ds_set) {
                    node.data_status[key_index] = AuthStatus::VerifiedLink;
                    if ds_set.status == AuthStatus::Trust {
                        node.status = node.status.merge(AuthStatus::Trust);
                    }
                    linked = true;
                }
            }
            _ => ds_missing = true,
        }
    }

    if is_dnskey && !linked && matches!(node.status, AuthStatus::Verified) {
        node.status = if ds_missing {
            warn!(zone = %owner, "verified DNSKEY set has no parent DS set");
            AuthStatus::DsMissing
        } else {
            warn!(zone = %owner, "no DNSKEY links to the parent DS set");
            AuthStatus::NoLink
        };
    }

    if rtype == DNSResourceType::NSEC3 {
        let max = policy
            .nsec3_max_iterations(&owner, opts.now)
            .unwrap_or(opts.nsec3_max_iterations);
        for (index, rdata) in node.rrset.data().iter().enumerate() {
            let status = match Nsec3::parse(rdata) {
                Ok(nsec3) => nsec3_usability(&nsec3, max),
                Err(_) => Some(AuthStatus::InvalidRrsig),
            };
            if let Some(status) = status {
                node.data_status[index] = status;
            }
        }
    }
}

/// Try every DS record for the one that vouches for `key`; the first match
/// wins
fn link_to_ds_set(owner: &Name, key: &Dnskey, ds_set: &mut Assertion) -> bool {
    for (index, rdata) in ds_set.rrset.data().iter().enumerate() {
        let status = match Ds::parse(rdata) {
            Ok(ds) => link_dnskey_to_ds(owner, key, &ds),
            Err(ParseError::UnsupportedDigestType(_)) => AuthStatus::AlgorithmNotSupported,
            Err(_) => AuthStatus::InvalidDs,
        };
        if status == AuthStatus::VerifiedLink {
            ds_set.data_status[index] = AuthStatus::VerifiedLink;
            return true;
        }
        if ds_set.data_status[index] == AuthStatus::Unset {
            ds_set.data_status[index] = status;
        }
    }
    false
}

fn key_status(
    node: &Assertion,
    trust: Option<&Assertion>,
    source: &KeySource,
    index: usize,
) -> AuthStatus {
    match (source, trust) {
        (KeySource::Own, _) => node.data_status[index],
        (KeySource::Trust, Some(trust)) => trust.data_status[index],
        (KeySource::Trust, None) => AuthStatus::Unset,
    }
}

fn set_key_status(
    node: &mut Assertion,
    trust: Option<&mut Assertion>,
    source: &KeySource,
    index: usize,
    status: AuthStatus,
) {
    let slot = match (source, trust) {
        (KeySource::Own, _) => &mut node.data_status[index],
        (KeySource::Trust, Some(trust)) => &mut trust.data_status[index],
        (KeySource::Trust, None) => return,
    };
    // Link and signing marks outrank later per-candidate outcomes
    let keep = match *slot {
        AuthStatus::TrustPoint | AuthStatus::VerifiedLink => true,
        AuthStatus::SigningKey => status != AuthStatus::SigningKey,
        _ => false,
    };
    if !keep {
        *slot = status;
    }
}

/// Verify `assertion` and the chain of `parents` above it.
///
/// `parents` runs from the assertion's own signer upwards, alternating
/// DNSKEY and DS sets and ending at the anchored DNSKEY set, e.g.
/// `[example.com DNSKEY, example.com DS, com DNSKEY, com DS, . DNSKEY]`.
/// Verification runs top-down; a verified node whose trust node is trusted
/// becomes trusted itself. Returns the first failure found walking back up
/// from the assertion, otherwise the assertion's own status.
pub fn verify_chain(
    assertion: &mut Assertion,
    parents: &mut [Assertion],
    policy: &PolicySet,
    opts: &VerifyOptions,
) -> AuthStatus {
    for index in (0..parents.len()).rev() {
        let (head, tail) = parents.split_at_mut(index + 1);
        verify_and_propagate(&mut head[index], tail.first_mut(), policy, opts);
    }
    verify_and_propagate(assertion, parents.first_mut(), policy, opts);

    if assertion.status.is_failure() {
        return assertion.status;
    }
    if let Some(failed) = parents.iter().find(|node| node.status.is_failure()) {
        debug!(
            owner = %failed.owner(),
            rtype = %failed.rrset.rtype(),
            status = %failed.status,
            "chain broken above the assertion"
        );
        return failed.status;
    }
    assertion.status
}

fn verify_and_propagate(
    node: &mut Assertion,
    mut trust: Option<&mut Assertion>,
    policy: &PolicySet,
    opts: &VerifyOptions,
) {
    verify_assertion(node, trust.as_deref_mut(), policy, opts);
    let trusted_parent = trust.is_some_and(|t| t.status == AuthStatus::Trust);
    if node.status == AuthStatus::Verified
        && node.rrset.rtype() != DNSResourceType::DNSKEY
        && trusted_parent
    {
        node.status = AuthStatus::Trust;
    }
}
