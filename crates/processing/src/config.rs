//! Admission and sweep configuration.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default lock domain for document-processing admissions.
pub const DEFAULT_LOCK_DOMAIN: &str = "document-processing";

/// Default per-principal lock lease (10 minutes).
const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(600);

/// Default status record lifetime (1 hour).
const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(3600);

/// Default queue-depth ceiling.
const DEFAULT_QUEUE_CEILING: u64 = 100;

/// Default sweep batch size.
const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;

/// Default bound on concurrently processed cleanup candidates.
const DEFAULT_SWEEP_CONCURRENCY: usize = 8;

/// Read an env var, falling back (with a log line) on absence or parse
/// failure.
fn env_or<T: FromStr + Copy + std::fmt::Debug>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, raw = %raw, ?default, "unparseable env var; using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Admission controller configuration.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Lock namespace for admissions
    pub lock_domain: String,
    /// Per-principal lock lease duration
    pub lock_ttl: Duration,
    /// Status record lifetime
    pub status_ttl: Duration,
    /// Reject admissions once queued + in-flight reaches this many entries
    pub queue_ceiling: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            lock_domain: DEFAULT_LOCK_DOMAIN.to_string(),
            lock_ttl: DEFAULT_LOCK_TTL,
            status_ttl: DEFAULT_STATUS_TTL,
            queue_ceiling: DEFAULT_QUEUE_CEILING,
        }
    }
}

impl AdmissionConfig {
    /// Load from `DOCFLOW_*` env vars, defaulting per field.
    pub fn from_env() -> Self {
        Self {
            lock_domain: std::env::var("DOCFLOW_LOCK_DOMAIN")
                .unwrap_or_else(|_| DEFAULT_LOCK_DOMAIN.to_string()),
            lock_ttl: Duration::from_secs(env_or(
                "DOCFLOW_LOCK_TTL_SECS",
                DEFAULT_LOCK_TTL.as_secs(),
            )),
            status_ttl: Duration::from_secs(env_or(
                "DOCFLOW_STATUS_TTL_SECS",
                DEFAULT_STATUS_TTL.as_secs(),
            )),
            queue_ceiling: env_or("DOCFLOW_QUEUE_CEILING", DEFAULT_QUEUE_CEILING),
        }
    }
}

/// Reclamation sweep configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Maximum candidates fetched per run
    pub batch_size: usize,
    /// Maximum candidates processed concurrently
    pub max_concurrency: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            max_concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }
}

impl SweepConfig {
    /// Load from `DOCFLOW_*` env vars, defaulting per field.
    pub fn from_env() -> Self {
        Self {
            batch_size: env_or("DOCFLOW_SWEEP_BATCH_SIZE", DEFAULT_SWEEP_BATCH_SIZE),
            max_concurrency: env_or("DOCFLOW_SWEEP_CONCURRENCY", DEFAULT_SWEEP_CONCURRENCY)
                .max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let admission = AdmissionConfig::default();
        assert_eq!(admission.lock_domain, "document-processing");
        assert_eq!(admission.lock_ttl, Duration::from_secs(600));
        assert_eq!(admission.status_ttl, Duration::from_secs(3600));
        assert_eq!(admission.queue_ceiling, 100);

        let sweep = SweepConfig::default();
        assert_eq!(sweep.batch_size, 100);
        assert_eq!(sweep.max_concurrency, 8);
    }
}
