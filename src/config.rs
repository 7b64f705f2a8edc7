use crate::dnssec::chain::{DEFAULT_NSEC3_MAX_ITERATIONS, VerifyOptions};
use crate::error::ConfigError;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    /// TOML policy document to load at startup (None = built-in policy)
    pub policy_file: Option<PathBuf>,

    /// Colon-separated scope used to pick policy fragments
    pub scope: Option<String>,

    /// Seconds of signature validity tolerance when no clock-skew policy
    /// matches; negative disables validity-period checks
    pub default_clock_skew: i64,

    /// Examine every signature even after one has verified
    pub exhaustive_check: bool,

    /// NSEC3 iteration ceiling when no nsec3-max-iter policy matches
    pub nsec3_max_iterations: u16,

    /// Maximum number of chain verdicts kept by a context (0 = no caching)
    pub max_cached_chains: usize,

    /// Reload the policy file when it changes on disk
    pub watch_policy_file: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            policy_file: None,
            scope: None,
            default_clock_skew: 0,
            exhaustive_check: false,
            nsec3_max_iterations: DEFAULT_NSEC3_MAX_ITERATIONS,
            max_cached_chains: 10_000,
            watch_policy_file: false,
        }
    }
}

impl ValidatorConfig {
    /// Create a ValidatorConfig from environment variables
    /// Returns Err if any variable that is set is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("BIFROST_POLICY_FILE") {
            if !path.trim().is_empty() {
                config.policy_file = Some(PathBuf::from(path.trim()));
            }
        }

        if let Ok(scope) = std::env::var("BIFROST_SCOPE") {
            if !scope.trim().is_empty() {
                config.scope = Some(scope.trim().to_string());
            }
        }

        if let Ok(skew) = std::env::var("BIFROST_CLOCK_SKEW") {
            config.default_clock_skew = skew
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidClockSkew(skew.clone()))?;
        }

        if let Ok(exhaustive) = std::env::var("BIFROST_EXHAUSTIVE_CHECK") {
            config.exhaustive_check = parse_bool(&exhaustive, false);
        }

        if let Ok(iterations) = std::env::var("BIFROST_NSEC3_MAX_ITER") {
            config.nsec3_max_iterations = iterations
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNsec3Iterations(iterations.clone()))?;
        }

        if let Ok(size) = std::env::var("BIFROST_MAX_CACHED_CHAINS") {
            config.max_cached_chains = size
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidCacheSize(size.clone()))?;
        }

        if let Ok(watch) = std::env::var("BIFROST_WATCH_POLICY_FILE") {
            config.watch_policy_file = parse_bool(&watch, false);
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // A week of drift is already far beyond any sane clock
        if self.default_clock_skew > 7 * 24 * 3600 {
            return Err(ConfigError::InvalidClockSkew(
                "Clock skew too large (max 604800 seconds)".to_string(),
            ));
        }

        if self.max_cached_chains > 10_000_000 {
            return Err(ConfigError::InvalidCacheSize(
                "Cache size too large (max 10 million entries)".to_string(),
            ));
        }

        if self.watch_policy_file && self.policy_file.is_none() {
            return Err(ConfigError::ParseError(
                "Policy file watching requires a policy file".to_string(),
            ));
        }

        Ok(())
    }

    /// Chain verification options for a call at `now`
    pub fn verify_options(&self, now: u64) -> VerifyOptions {
        VerifyOptions {
            now,
            default_clock_skew: self.default_clock_skew,
            exhaustive: self.exhaustive_check,
            nsec3_max_iterations: self.nsec3_max_iterations,
        }
    }
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
