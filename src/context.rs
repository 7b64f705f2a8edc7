//! Validation context: the active policy set, the configuration it was
//! built from, and a cache of chain verdicts.

use crate::config::ValidatorConfig;
use crate::dns::{DNSResourceClass, DNSResourceType, Name};
use crate::dnssec::chain::{Assertion, VerifyOptions, verify_chain};
use crate::dnssec::nsec3::{covers, hashed_owner_label};
use crate::dnssec::{AuthStatus, Nsec3, Rrsig};
use crate::error::{BifrostError, PolicyError};
use crate::policy::{
    PolicyDocument, PolicyEntry, PolicySet, PolicyType, PolicyWatcher, ZoneSecurity,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use ring::digest;
use rustc_hash::FxBuildHasher;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace, warn};

/// Identifies one chain: the assertion's name and type plus a SHA-256
/// fingerprint of every record and signature in the chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainKey {
    pub owner: Name,
    pub rtype: DNSResourceType,
    pub class: DNSResourceClass,
    fingerprint: [u8; 32],
}

impl ChainKey {
    pub fn new(assertion: &Assertion, parents: &[Assertion]) -> Self {
        let mut ctx = digest::Context::new(&digest::SHA256);
        let mut field = |bytes: &[u8]| {
            ctx.update(&(bytes.len() as u64).to_be_bytes());
            ctx.update(bytes);
        };
        for node in std::iter::once(assertion).chain(parents) {
            let rrset = node.rrset();
            field(&rrset.owner().canonical_wire());
            field(&rrset.rtype().to_u16().to_be_bytes());
            field(&rrset.class().to_u16().to_be_bytes());
            field(&(rrset.data().len() as u64).to_be_bytes());
            for rdata in rrset.data() {
                field(rdata);
            }
            field(&(rrset.signatures().len() as u64).to_be_bytes());
            for rrsig in rrset.signatures() {
                field(rrsig);
            }
        }

        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(ctx.finish().as_ref());
        let rrset = assertion.rrset();
        Self {
            owner: rrset.owner().clone(),
            rtype: rrset.rtype(),
            class: rrset.class(),
            fingerprint,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedChain {
    assertion: Assertion,
    parents: Vec<Assertion>,
    cached_at: u64,
    expires_at: u64,
}

impl CachedChain {
    fn is_fresh(&self, now: u64) -> bool {
        self.cached_at <= now && now < self.expires_at
    }

    fn touches(&self, zone: &Name) -> bool {
        std::iter::once(&self.assertion)
            .chain(&self.parents)
            .any(|node| node.owner().is_subdomain_of(zone))
    }
}

pub struct ValidationContext {
    config: ValidatorConfig,
    policy: RwLock<PolicySet>,
    cache: DashMap<ChainKey, CachedChain, FxBuildHasher>,
    insertion_order: Mutex<VecDeque<ChainKey>>,
}

impl ValidationContext {
    /// Build a context from `config`, loading its policy file if one is set
    pub fn new(config: ValidatorConfig) -> Result<Self, BifrostError> {
        config.validate()?;
        let context = Self::with_policy(config, PolicySet::builtin());
        if let Some(path) = context.config.policy_file.clone() {
            context.load_policy_file(path)?;
        }
        Ok(context)
    }

    /// Build a shared context from `config` together with the watcher that
    /// `watch_policy_file` asks for. Watching stops when the watcher is
    /// dropped.
    pub fn start(
        config: ValidatorConfig,
    ) -> Result<(Arc<Self>, Option<PolicyWatcher>), BifrostError> {
        let watch = config.watch_policy_file;
        let context = Arc::new(Self::new(config)?);
        let watcher = if watch {
            Some(PolicyWatcher::start(Arc::clone(&context))?)
        } else {
            None
        };
        Ok((context, watcher))
    }

    /// Build a context around an already resolved policy set
    pub fn with_policy(config: ValidatorConfig, policy: PolicySet) -> Self {
        Self {
            config,
            policy: RwLock::new(policy),
            cache: DashMap::with_hasher(FxBuildHasher),
            insertion_order: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Copy of the active policy set
    pub fn policy_snapshot(&self) -> PolicySet {
        self.policy.read().clone()
    }

    /// Replace the active policy with the one `text` defines for this
    /// context's scope. On error the previous policy stays in force.
    pub fn load_policy_str(&self, text: &str) -> Result<(), PolicyError> {
        let resolved =
            PolicyDocument::parse(text).and_then(|doc| doc.resolve(self.config.scope.as_deref()));
        self.install(resolved, "inline")
    }

    pub fn load_policy_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PolicyError> {
        let path = path.as_ref();
        let resolved = PolicyDocument::from_file(path)
            .and_then(|doc| doc.resolve(self.config.scope.as_deref()));
        self.install(resolved, &path.display().to_string())
    }

    /// Re-read the configured policy file; a no-op without one
    pub fn reload_policy(&self) -> Result<(), PolicyError> {
        match &self.config.policy_file {
            Some(path) => self.load_policy_file(path),
            None => Ok(()),
        }
    }

    fn install(&self, resolved: Result<PolicySet, PolicyError>, source: &str) -> Result<(), PolicyError> {
        match resolved {
            Ok(set) => {
                let entries = set.len();
                *self.policy.write() = set;
                self.clear_cache();
                info!(source, entries, "validation policy loaded");
                Ok(())
            }
            Err(e) => {
                warn!(source, error = %e, "policy rejected; keeping previous policy");
                Err(e)
            }
        }
    }

    /// Register one policy entry and forget verdicts it may change
    pub fn add_policy(&self, entry: PolicyEntry) {
        let zone = entry.zone.clone();
        let mut policy = self.policy.write();
        policy.insert(entry);
        self.invalidate(&zone);
    }

    /// Remove every `ptype` entry for exactly `zone`
    pub fn remove_policy(&self, ptype: PolicyType, zone: &Name) -> bool {
        let mut policy = self.policy.write();
        let removed = policy.remove(ptype, zone);
        if removed {
            self.invalidate(zone);
        }
        removed
    }

    pub fn prune_expired_policy(&self, now: u64) -> usize {
        let pruned = self.policy.write().prune_expired(now);
        if pruned > 0 {
            debug!(pruned, "expired policy entries removed");
            self.clear_cache();
        }
        pruned
    }

    /// Validate `assertion` against `parents` at the current time
    pub fn validate(&self, assertion: &mut Assertion, parents: &mut [Assertion]) -> AuthStatus {
        self.validate_at(assertion, parents, unix_now())
    }

    /// Validate `assertion` against `parents` (see
    /// [`verify_chain`](crate::dnssec::chain::verify_chain) for their
    /// order) as of `now`.
    ///
    /// The zone's security expectation is consulted first. A parent DS set
    /// without records marks a delegation to an unsigned zone; the
    /// parents after it must hold an NSEC3 set denying the DS, signed by
    /// the parent zone and trusted up to an anchor. Only then are the
    /// answers provably insecure, and only if policy accepts that.
    pub fn validate_at(&self, assertion: &mut Assertion, parents: &mut [Assertion], now: u64) -> AuthStatus {
        let policy = self.policy.read();
        let owner = assertion.owner().clone();

        match policy.zone_security(&owner, now) {
            ZoneSecurity::Ignore => {
                debug!(zone = %owner, "ignoring DNSSEC for zone");
                assertion.settle(AuthStatus::IgnoreValidation);
                return AuthStatus::IgnoreValidation;
            }
            ZoneSecurity::Untrusted => {
                debug!(zone = %owner, "zone is not trusted");
                assertion.settle(AuthStatus::UntrustedZone);
                return AuthStatus::UntrustedZone;
            }
            ZoneSecurity::Validate => {}
        }

        let opts = self.config.verify_options(now);
        let insecure_cut = parents.iter().position(|node| {
            node.rrset().rtype() == DNSResourceType::DS && node.rrset().data().is_empty()
        });
        if let Some(cut) = insecure_cut {
            let status = insecure_delegation(&policy, parents, cut, &opts);
            debug!(zone = %parents[cut].owner(), %status, "delegation without DS");
            assertion.settle(status);
            return status;
        }

        let key = ChainKey::new(assertion, parents);
        if let Some(hit) = self.cached(&key, now, parents.len()) {
            trace!(owner = %owner, rtype = %key.rtype, "chain verdict cache hit");
            *assertion = hit.assertion;
            for (slot, node) in parents.iter_mut().zip(hit.parents) {
                *slot = node;
            }
            return assertion.status();
        }

        let status = verify_chain(assertion, parents, &policy, &opts);
        debug!(owner = %owner, rtype = %key.rtype, %status, "chain verified");

        // Stored under the read lock so a concurrent policy change cannot
        // be overtaken by a verdict computed under the old policy.
        self.store(key, assertion, parents, &policy, &opts);
        status
    }

    fn cached(&self, key: &ChainKey, now: u64, parents: usize) -> Option<CachedChain> {
        let entry = self.cache.get(key)?;
        if entry.is_fresh(now) && entry.parents.len() == parents {
            return Some(entry.clone());
        }
        let expired = entry.expires_at <= now;
        drop(entry);
        if expired {
            self.forget(key);
        }
        None
    }

    /// Cache a verdict until the smallest TTL in the chain runs out or
    /// the first signature in it expires, whichever comes first
    fn store(
        &self,
        key: ChainKey,
        assertion: &Assertion,
        parents: &[Assertion],
        policy: &PolicySet,
        opts: &VerifyOptions,
    ) {
        let max = self.config.max_cached_chains;
        if max == 0 || assertion.status() == AuthStatus::Unset {
            return;
        }
        let now = opts.now;
        let ttl = std::iter::once(assertion)
            .chain(parents)
            .map(|node| node.rrset().ttl())
            .min()
            .unwrap_or(0);
        let mut expires_at = now.saturating_add(u64::from(ttl));
        if let Some(deadline) = signature_deadline(assertion, parents, policy, opts) {
            expires_at = expires_at.min(deadline);
        }
        if expires_at <= now {
            return;
        }

        if self.cache.len() >= max && !self.cache.contains_key(&key) {
            self.evict(now);
        }

        let entry = CachedChain {
            assertion: assertion.clone(),
            parents: parents.to_vec(),
            cached_at: now,
            expires_at,
        };
        if self.cache.insert(key.clone(), entry).is_none() {
            self.insertion_order.lock().push_back(key);
        }
    }

    /// Drop expired verdicts, or the oldest one if none has expired
    fn evict(&self, now: u64) {
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.expires_at > now);
        if self.cache.len() < before {
            self.insertion_order.lock().retain(|key| self.cache.contains_key(key));
            return;
        }

        let mut order = self.insertion_order.lock();
        while let Some(key) = order.pop_front() {
            if self.cache.remove(&key).is_some() {
                trace!(owner = %key.owner, "evicted oldest chain verdict");
                break;
            }
        }
    }

    fn forget(&self, key: &ChainKey) {
        if self.cache.remove(key).is_some() {
            self.insertion_order.lock().retain(|queued| queued != key);
        }
    }

    /// Forget every verdict whose chain passes through `zone` or below
    fn invalidate(&self, zone: &Name) {
        let before = self.cache.len();
        self.cache.retain(|_, entry| !entry.touches(zone));
        let dropped = before - self.cache.len();
        if dropped > 0 {
            self.insertion_order.lock().retain(|key| self.cache.contains_key(key));
            debug!(zone = %zone, dropped, "chain verdicts invalidated");
        }
    }

    pub fn cached_chains(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        self.insertion_order.lock().clear();
    }
}

/// Verdict for a chain that crosses the empty DS set at `parents[cut]`
fn insecure_delegation(
    policy: &PolicySet,
    parents: &mut [Assertion],
    cut: usize,
    opts: &VerifyOptions,
) -> AuthStatus {
    let (below, above) = parents.split_at_mut(cut + 1);
    let zone = below[cut].owner().clone();
    let Some((proof, proof_parents)) = above.split_first_mut() else {
        debug!(zone = %zone, "no denial of the DS set");
        return AuthStatus::DsMissing;
    };
    if proof.rrset().rtype() != DNSResourceType::NSEC3 {
        debug!(zone = %zone, rtype = %proof.rrset().rtype(), "no denial of the DS set");
        return AuthStatus::DsMissing;
    }

    let status = verify_chain(proof, proof_parents, policy, opts);
    if status != AuthStatus::Trust {
        debug!(zone = %zone, %status, "denial of the DS set is not trusted");
        return AuthStatus::NotVerified;
    }
    let signer = proof_parents.first().map(|keys| keys.owner().clone());
    if !denies_ds(proof, signer.as_ref(), &zone) {
        debug!(zone = %zone, "NSEC3 set does not deny the DS set");
        return AuthStatus::NotVerified;
    }

    if policy.provably_insecure_trusted(&zone, opts.now) {
        AuthStatus::ProvablyInsecure
    } else {
        AuthStatus::NotVerified
    }
}

/// True if a usable record of the verified NSEC3 set `proof`, owned by a
/// name directly in the `signer` zone, proves `zone` has no DS set: either
/// it matches `zone` and lists NS but neither DS nor SOA (RFC 5155 §8.9),
/// or it is an opt-out record covering `zone` (RFC 5155 §8.10)
fn denies_ds(proof: &Assertion, signer: Option<&Name>, zone: &Name) -> bool {
    let owner = proof.owner();
    let (Some(label), Some(parent), Some(signer)) = (owner.labels().next(), owner.parent(), signer)
    else {
        return false;
    };
    if parent.canonical_wire() != signer.canonical_wire()
        || !zone.is_subdomain_of(&parent)
        || zone.num_labels() <= parent.num_labels()
    {
        return false;
    }
    let owner_hash = label.to_ascii_lowercase();

    proof
        .rrset()
        .data()
        .iter()
        .zip(proof.data_status())
        .filter(|(_, status)| **status == AuthStatus::Unset)
        .filter_map(|(rdata, _)| Nsec3::parse(rdata).ok())
        .any(|nsec3| {
            let Some(hashed) = hashed_owner_label(zone, &nsec3) else {
                return false;
            };
            if hashed.as_bytes() == owner_hash.as_slice() {
                nsec3.has_type(DNSResourceType::NS)
                    && !nsec3.has_type(DNSResourceType::DS)
                    && !nsec3.has_type(DNSResourceType::SOA)
            } else {
                let next = nsec3.next_hashed_owner_base32();
                nsec3.opt_out()
                    && owner_hash.len() == hashed.len()
                    && covers(&owner_hash, next.as_bytes(), hashed.as_bytes())
            }
        })
}

/// First second at which some signature in the chain is past its
/// expiration plus the clock skew allowed for its signer
fn signature_deadline(
    assertion: &Assertion,
    parents: &[Assertion],
    policy: &PolicySet,
    opts: &VerifyOptions,
) -> Option<u64> {
    std::iter::once(assertion)
        .chain(parents)
        .flat_map(|node| node.rrset().signatures())
        .filter_map(|rdata| Rrsig::parse(rdata).ok())
        .filter_map(|rrsig| {
            let skew = policy
                .clock_skew(&rrsig.signer_name, opts.now)
                .unwrap_or(opts.default_clock_skew);
            let skew = u64::try_from(skew).ok()?;
            Some(u64::from(rrsig.expiration).saturating_add(skew).saturating_add(1))
        })
        .min()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::RRset;
    use crate::policy::PolicyValue;

    fn assertion(owner: &str, rtype: DNSResourceType, data: Vec<Vec<u8>>) -> Assertion {
        Assertion::new(RRset::new(
            owner.parse().unwrap(),
            rtype,
            DNSResourceClass::IN,
            300,
            data,
            Vec::new(),
        ))
    }

    #[test]
    fn test_zone_gate() {
        let ctx = ValidationContext::with_policy(ValidatorConfig::default(), PolicySet::empty());
        ctx.add_policy(PolicyEntry::new(
            "lab.example.".parse().unwrap(),
            PolicyValue::ZoneSecurity(ZoneSecurity::Ignore),
        ));
        ctx.add_policy(PolicyEntry::new(
            "evil.example.".parse().unwrap(),
            PolicyValue::ZoneSecurity(ZoneSecurity::Untrusted),
        ));

        let mut a = assertion("www.lab.example.", DNSResourceType::A, vec![vec![192, 0, 2, 1]]);
        assert_eq!(ctx.validate_at(&mut a, &mut [], 0), AuthStatus::IgnoreValidation);
        assert_eq!(a.status(), AuthStatus::IgnoreValidation);

        let mut a = assertion("www.evil.example.", DNSResourceType::A, vec![vec![192, 0, 2, 1]]);
        assert_eq!(ctx.validate_at(&mut a, &mut [], 0), AuthStatus::UntrustedZone);
    }

    #[test]
    fn test_unproven_insecure_delegation() {
        let ctx = ValidationContext::with_policy(ValidatorConfig::default(), PolicySet::empty());
        let mut a = assertion("www.bank.example.", DNSResourceType::A, vec![vec![6, 6, 6, 6]]);
        let mut parents = vec![assertion("bank.example.", DNSResourceType::DS, Vec::new())];
        let status = ctx.validate_at(&mut a, &mut parents, 0);
        assert_eq!(status, AuthStatus::DsMissing);
        assert!(!status.is_success());

        // An unsigned denial proves nothing
        let mut nsec3 = vec![1, 0, 0, 0, 0, 20];
        nsec3.extend([0x11; 20]);
        nsec3.extend([0, 1, 0x20]);
        parents.push(assertion(
            "2vptu5timamqttgl4luu9kg21e0aor3s.example.",
            DNSResourceType::NSEC3,
            vec![nsec3],
        ));
        assert_eq!(ctx.validate_at(&mut a, &mut parents, 0), AuthStatus::NotVerified);
        assert_eq!(a.status(), AuthStatus::NotVerified);
        assert_eq!(ctx.cached_chains(), 0);
    }

    #[test]
    fn test_chain_key_covers_record_data() {
        let a = assertion("www.example.", DNSResourceType::A, vec![vec![192, 0, 2, 1]]);
        let b = assertion("www.example.", DNSResourceType::A, vec![vec![192, 0, 2, 2]]);
        let keys = [assertion("example.", DNSResourceType::DNSKEY, vec![vec![1, 0, 3, 13]])];
        assert_eq!(ChainKey::new(&a, &keys), ChainKey::new(&a.clone(), &keys));
        assert_ne!(ChainKey::new(&a, &keys), ChainKey::new(&b, &keys));
        assert_ne!(ChainKey::new(&a, &keys), ChainKey::new(&a, &[]));

        // Moving bytes between records changes the key
        let split = assertion("www.example.", DNSResourceType::A, vec![vec![1], vec![2, 3]]);
        let joined = assertion("www.example.", DNSResourceType::A, vec![vec![1, 2], vec![3]]);
        assert_ne!(ChainKey::new(&split, &[]), ChainKey::new(&joined, &[]));
    }

    #[test]
    fn test_signature_deadline() {
        let rrsig = |signer: &str, expiration: u32| Rrsig {
            type_covered: DNSResourceType::A,
            algorithm: 13,
            labels: 2,
            original_ttl: 300,
            expiration,
            inception: 0,
            key_tag: 1,
            signer_name: signer.parse().unwrap(),
            signature: vec![0; 64],
        };
        let signed = Assertion::new(RRset::new(
            "www.example.".parse().unwrap(),
            DNSResourceType::A,
            DNSResourceClass::IN,
            300,
            vec![vec![192, 0, 2, 1]],
            vec![rrsig("example.", 5_000).to_wire(), rrsig("example.", 4_000).to_wire()],
        ));
        let opts = VerifyOptions::at(1_000);
        let mut policy = PolicySet::empty();
        assert_eq!(signature_deadline(&signed, &[], &policy, &opts), Some(4_001));

        policy.insert(PolicyEntry::new("example.".parse().unwrap(), PolicyValue::ClockSkew(60)));
        assert_eq!(signature_deadline(&signed, &[], &policy, &opts), Some(4_061));

        // Time checks disabled for the signer: the TTL alone bounds the verdict
        let mut unchecked = PolicySet::empty();
        unchecked.insert(PolicyEntry::new("example.".parse().unwrap(), PolicyValue::ClockSkew(-1)));
        assert_eq!(signature_deadline(&signed, &[], &unchecked, &opts), None);
    }

    #[test]
    fn test_unsigned_answer_is_cached_and_invalidated() {
        let ctx = ValidationContext::with_policy(ValidatorConfig::default(), PolicySet::empty());
        let mut a = assertion("www.example.", DNSResourceType::A, vec![vec![192, 0, 2, 1]]);
        assert_eq!(ctx.validate_at(&mut a, &mut [], 10), AuthStatus::RrsigMissing);
        assert_eq!(ctx.cached_chains(), 1);

        let mut again = assertion("www.example.", DNSResourceType::A, vec![vec![192, 0, 2, 1]]);
        assert_eq!(ctx.validate_at(&mut again, &mut [], 20), AuthStatus::RrsigMissing);
        assert_eq!(again.status(), AuthStatus::RrsigMissing);

        ctx.add_policy(PolicyEntry::new(
            "other.".parse().unwrap(),
            PolicyValue::ClockSkew(5),
        ));
        assert_eq!(ctx.cached_chains(), 1);
        ctx.add_policy(PolicyEntry::new("example.".parse().unwrap(), PolicyValue::ClockSkew(5)));
        assert_eq!(ctx.cached_chains(), 0);
    }

    #[test]
    fn test_cache_is_bounded() {
        let config = ValidatorConfig {
            max_cached_chains: 2,
            ..Default::default()
        };
        let ctx = ValidationContext::with_policy(config, PolicySet::empty());
        for host in ["a", "b", "c"] {
            let mut a = assertion(&format!("{}.example.", host), DNSResourceType::A, vec![vec![1]]);
            ctx.validate_at(&mut a, &mut [], 0);
        }
        assert_eq!(ctx.cached_chains(), 2);
    }

    #[test]
    fn test_cache_order_tracks_removals() {
        let config = ValidatorConfig {
            max_cached_chains: 2,
            ..Default::default()
        };
        let ctx = ValidationContext::with_policy(config, PolicySet::empty());
        let validate = |host: &str, now: u64| {
            let mut a = assertion(&format!("{}.example.", host), DNSResourceType::A, vec![vec![1]]);
            ctx.validate_at(&mut a, &mut [], now);
        };
        // The first "a" expires at 300 and is replaced at 400
        validate("a", 0);
        validate("a", 400);
        for host in ["b", "c", "d"] {
            validate(host, 400);
            assert!(ctx.cached_chains() <= 2);
        }
        assert_eq!(ctx.insertion_order.lock().len(), ctx.cached_chains());

        ctx.clear_cache();
        for round in 0..1000 {
            validate("a", round * 400);
        }
        assert_eq!(ctx.cached_chains(), 1);
        assert_eq!(ctx.insertion_order.lock().len(), 1);
    }

    #[test]
    fn test_bad_policy_keeps_previous() {
        let ctx = ValidationContext::with_policy(ValidatorConfig::default(), PolicySet::builtin());
        ctx.load_policy_str(
            "[[fragment]]\nlabel = \":\"\nkeyword = \"clock-skew\"\nentries = [{ zone = \".\", value = 30 }]\n",
        )
        .unwrap();
        assert_eq!(ctx.policy_snapshot().clock_skew(&Name::root(), 0), Some(30));

        let err = ctx.load_policy_str("[[fragment]]\nlabel = \":\"\nkeyword = \"bogus\"\n");
        assert!(matches!(err, Err(PolicyError::UnknownKeyword(_))));
        assert_eq!(ctx.policy_snapshot().clock_skew(&Name::root(), 0), Some(30));
    }
}
