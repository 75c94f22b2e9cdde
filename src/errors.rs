//! Error taxonomy for the provisioning core.
//!
//! Errors fall into a few buckets with different handling policies:
//!
//! - [`ProvisionError::UnresolvedEdition`] is fatal to the attempted
//!   transition and must be raised before any external tool is invoked.
//! - Probe and IO failures are logged by the lifecycle and degraded to a
//!   documented default (an unreadable key store is treated as "no key").
//! - Post-condition validation failures are *not* errors. They are surfaced
//!   as [`crate::lifecycle::ValidationIssue`]s on the transition report so
//!   the operator can decide whether to retry.

use crate::tiers::Tier;

/// Errors produced by the provisioning core.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The tier has no edition code on the key server. Raised before
    /// invocation; the transition must not proceed.
    #[error("could not resolve an edition code for tier '{0}'")]
    UnresolvedEdition(Tier),

    /// A key-state or inventory probe failed outright.
    #[error("probe failed: {0}")]
    ProbeError(String),

    /// The audit log could not be written.
    #[error("audit log write failed: {0}")]
    AuditError(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Underlying IO failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type ProvisionResult<T> = Result<T, ProvisionError>;
