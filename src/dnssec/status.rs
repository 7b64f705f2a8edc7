use std::fmt;

/// Validation status carried by assertions and by their individual data and
/// signature records.
///
/// Assertion-level and record-level outcomes share one vocabulary so that a
/// per-signature result can be merged straight into its assertion with
/// [`AuthStatus::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthStatus {
    #[default]
    Unset,

    // Policy outcomes
    TrustNoCheck,
    IgnoreValidation,
    UntrustedZone,
    ProvablyInsecure,

    // Assertion outcomes
    BareRrsig,
    NoLink,
    Trust,
    RrsigMissing,
    DnskeyMissing,
    DsMissing,
    NotVerified,

    // Signature and key failures
    WrongLabelCount,
    InvalidRrsig,
    RrsigNotYetActive,
    RrsigExpired,
    RrsigVerifyFailed,
    RrsigAlgorithmMismatch,
    DnskeyNomatch,
    UnknownDnskeyProtocol,
    DsNomatch,
    InvalidKey,
    InvalidDs,
    AlgorithmNotSupported,

    // Successes
    Verified,
    RrsigVerified,
    WcardVerified,
    RrsigVerifiedSkew,
    WcardVerifiedSkew,
    TrustPoint,
    SigningKey,
    VerifiedLink,
    UnknownAlgorithmLink,
}

impl AuthStatus {
    /// Fold one signature's status into the running assertion status.
    ///
    /// Trust and verified states are sticky: no later failure moves the
    /// assertion away from them. The single exception is a trust-no-check
    /// DNSKEY set meeting a signature with no matching key, which demotes
    /// to not-verified.
    pub fn merge(self, new: AuthStatus) -> AuthStatus {
        use AuthStatus::*;
        match (self, new) {
            (_, Unset | SigningKey | VerifiedLink | UnknownAlgorithmLink) => self,
            (TrustNoCheck, DnskeyNomatch) => NotVerified,
            (_, Trust) => Trust,
            (Trust | TrustNoCheck, _) => self,
            (_, RrsigVerified | RrsigVerifiedSkew) => Verified,
            (_, WcardVerified | WcardVerifiedSkew) => WcardVerified,
            (Verified | WcardVerified, _) => self,
            _ => NotVerified,
        }
    }

    pub fn is_success(&self) -> bool {
        use AuthStatus::*;
        matches!(
            self,
            TrustNoCheck
                | IgnoreValidation
                | ProvablyInsecure
                | Trust
                | Verified
                | RrsigVerified
                | WcardVerified
                | RrsigVerifiedSkew
                | WcardVerifiedSkew
                | TrustPoint
                | SigningKey
                | VerifiedLink
                | UnknownAlgorithmLink
        )
    }

    /// Cryptographically authenticated, as opposed to accepted by policy
    pub fn is_authentic(&self) -> bool {
        use AuthStatus::*;
        matches!(
            self,
            Trust | Verified | WcardVerified | RrsigVerified | RrsigVerifiedSkew
                | WcardVerifiedSkew | TrustPoint | VerifiedLink
        )
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success() && *self != AuthStatus::Unset
    }

    /// Successful signature check, with or without clock-skew allowance
    pub fn is_signature_success(&self) -> bool {
        use AuthStatus::*;
        matches!(
            self,
            RrsigVerified | RrsigVerifiedSkew | WcardVerified | WcardVerifiedSkew
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        use AuthStatus::*;
        match self {
            Unset => "unset",
            TrustNoCheck => "trust-no-check",
            IgnoreValidation => "ignore-validation",
            UntrustedZone => "untrusted-zone",
            ProvablyInsecure => "provably-insecure",
            BareRrsig => "bare-rrsig",
            NoLink => "no-link",
            Trust => "trust",
            RrsigMissing => "rrsig-missing",
            DnskeyMissing => "dnskey-missing",
            DsMissing => "ds-missing",
            NotVerified => "not-verified",
            WrongLabelCount => "wrong-label-count",
            InvalidRrsig => "invalid-rrsig",
            RrsigNotYetActive => "rrsig-not-yet-active",
            RrsigExpired => "rrsig-expired",
            RrsigVerifyFailed => "rrsig-verify-failed",
            RrsigAlgorithmMismatch => "rrsig-algorithm-mismatch",
            DnskeyNomatch => "dnskey-nomatch",
            UnknownDnskeyProtocol => "unknown-dnskey-protocol",
            DsNomatch => "ds-nomatch",
            InvalidKey => "invalid-key",
            InvalidDs => "invalid-ds",
            AlgorithmNotSupported => "algorithm-not-supported",
            Verified => "verified",
            RrsigVerified => "rrsig-verified",
            WcardVerified => "wcard-verified",
            RrsigVerifiedSkew => "rrsig-verified-skew",
            WcardVerifiedSkew => "wcard-verified-skew",
            TrustPoint => "trust-point",
            SigningKey => "signing-key",
            VerifiedLink => "verified-link",
            UnknownAlgorithmLink => "unknown-algorithm-link",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
