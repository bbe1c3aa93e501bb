//! Error taxonomy for proxy construction and dispatch.
//!
//! Two classes, matching how failures actually arise:
//!
//! - [`ConfigurationError`] - one-time construction-time defects (unresolved
//!   bindings, missing custom implementations, unroutable methods). Detected
//!   eagerly while the proxy is being built and never silently degraded.
//! - [`InvocationError`] - per-call failures. A forwarded target's own error
//!   is passed through as [`InvocationError::Target`] with its message and
//!   downcastable payload intact, so callers observe it as if they had
//!   called the target directly.

use crate::descriptor::DescriptorError;

/// Boxed error produced by a forwarded target (custom implementation, query
/// object, or CRUD target). Carried through dispatch unchanged.
pub type TargetError = Box<dyn std::error::Error + Send + Sync>;

/// A construction-time configuration defect. Nothing here is retryable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("domain type of repository interface '{interface}' does not resolve against marker '{marker}'")]
    UnresolvedDomainType {
        interface: &'static str,
        marker: &'static str,
    },

    #[error(
        "repository interface '{interface}' requires a custom implementation for method '{method}' but none was supplied"
    )]
    MissingCustomImplementation {
        interface: &'static str,
        method: &'static str,
    },

    #[error("query resolution failed for method '{method}' on '{interface}'")]
    QueryResolution {
        interface: &'static str,
        method: &'static str,
        #[source]
        source: TargetError,
    },

    #[error(
        "method '{method}' on '{interface}' matches no custom implementation, resolved query, or base-class method"
    )]
    UnroutableMethod {
        interface: &'static str,
        method: &'static str,
    },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// A failure observed while invoking a method through the proxy.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("no method '{method}' with {arity} argument(s) on repository interface '{interface}'")]
    UnknownMethod {
        interface: &'static str,
        method: String,
        arity: usize,
    },

    /// The forwarded target failed; this is its original error, not a wrapper
    /// with its own message.
    #[error("{0}")]
    Target(TargetError),
}

impl InvocationError {
    /// Wrap a forwarded target's error for propagation.
    #[must_use]
    pub fn target(source: TargetError) -> Self {
        InvocationError::Target(source)
    }

    /// Borrow the original target error, if this is one.
    #[must_use]
    pub fn as_target(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        match self {
            InvocationError::Target(source) => Some(source.as_ref()),
            InvocationError::UnknownMethod { .. } => None,
        }
    }

    /// Recover the original target error for downcasting.
    ///
    /// # Errors
    /// Returns `self` unchanged when this is not a target failure.
    pub fn into_target(self) -> Result<TargetError, Self> {
        match self {
            InvocationError::Target(source) => Ok(source),
            other @ InvocationError::UnknownMethod { .. } => Err(other),
        }
    }
}
