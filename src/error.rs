use thiserror::Error;

/// Errors raised while decoding wire-format names and record data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Buffer too small: need {need} bytes, have {have} bytes")]
    BufferTooSmall { need: usize, have: usize },

    #[error("Invalid label length: {0}")]
    InvalidLabelLength(u8),

    #[error("DNS name too long")]
    NameTooLong,

    #[error("Invalid compression pointer to offset {0}")]
    BadPointer(usize),

    #[error("Too many compression pointers in DNS name")]
    PointerLoop,

    #[error("Invalid domain name: {0}")]
    InvalidName(String),

    #[error("Unsupported digest type: {0}")]
    UnsupportedDigestType(u8),

    #[error("Unsupported digest type {digest_type}: digest length {actual}, expected {expected}")]
    DigestLengthMismatch {
        digest_type: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Record type {0} cannot be wildcard expanded")]
    WildcardNotPermitted(u16),

    #[error("RRSIG covers type {covered}, RRset has type {rrset}")]
    TypeCoveredMismatch { covered: u16, rrset: u16 },

    #[error("RRSIG label count {labels} exceeds owner label count {owner_labels}")]
    LabelCountExceeded { labels: u8, owner_labels: u8 },

    #[error("Record data of {0} bytes does not fit a 16-bit length")]
    RdataTooLong(usize),

    #[error("{field} of {len} bytes does not fit a one-byte length")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("Record type {0} is not a DNSSEC record type")]
    UnsupportedRecordType(u16),

    #[error("Invalid presentation format: {0}")]
    Presentation(String),
}

/// Errors produced while decoding public keys and signatures for verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Malformed public key for algorithm {0}")]
    MalformedKey(u8),

    #[error("Malformed signature for algorithm {0}")]
    MalformedSignature(u8),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(u8),

    #[error("Unsupported digest type: {0}")]
    UnsupportedDigest(u8),
}

/// Errors raised while loading or registering validation policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Unknown policy keyword: {0}")]
    UnknownKeyword(String),

    #[error("Invalid policy label '{0}': ':' is only allowed as the default label")]
    InvalidLabel(String),

    #[error("Invalid zone name '{zone}': {reason}")]
    InvalidZone { zone: String, reason: String },

    #[error("Invalid value for {keyword} in zone {zone}: {reason}")]
    InvalidValue {
        keyword: String,
        zone: String,
        reason: String,
    },

    #[error("Policy scope too deep or too long: {0}")]
    ScopeTooComplex(String),

    #[error("Policy syntax error: {0}")]
    Syntax(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Policy watcher error: {0}")]
    Watch(String),
}

impl From<std::io::Error> for PolicyError {
    fn from(err: std::io::Error) -> Self {
        PolicyError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for PolicyError {
    fn from(err: toml::de::Error) -> Self {
        PolicyError::Syntax(err.to_string())
    }
}

impl From<notify::Error> for PolicyError {
    fn from(err: notify::Error) -> Self {
        PolicyError::Watch(err.to_string())
    }
}

/// Errors raised while reading validator configuration from the environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid clock skew: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid NSEC3 iteration limit: {0}")]
    InvalidNsec3Iterations(String),

    #[error("Invalid cache size: {0}")]
    InvalidCacheSize(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

/// Top-level error for the crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BifrostError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, BifrostError>;
