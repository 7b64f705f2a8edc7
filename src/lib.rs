//! DNSSEC validation engine: wire-format record parsing, canonical
//! signature input, cryptographic verification, authentication chain
//! assembly and zone-scoped validation policy.

pub mod config;
pub mod context;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod policy;

pub use config::ValidatorConfig;
pub use context::ValidationContext;
pub use dns::{DNSResourceClass, DNSResourceType, Name, RRset};
pub use dnssec::{Assertion, AuthStatus, TrustAnchor, VerifyOptions};
pub use error::{BifrostError, Result};
pub use policy::{PolicyEntry, PolicySet, PolicyType, PolicyValue, PolicyWatcher, ZoneSecurity};
