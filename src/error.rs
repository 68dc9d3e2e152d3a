//! Crate-level error types.

use thiserror::Error;

use crate::method::Method;
use crate::solver::IntegrationError;
use crate::trajectory::PhaseState;

/// Misuse of the API: bad names, bad inputs, or queries that cannot be
/// answered. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Method name outside the supported set
    #[error("unknown integration method '{name}' (expected one of {expected})")]
    UnknownMethod {
        /// The name that failed to parse
        name: String,
        /// Comma-separated list of accepted names
        expected: String,
    },
    /// Output times unusable
    #[error("invalid time grid: {message}")]
    InvalidTimeGrid {
        /// What is wrong with the grid
        message: String,
    },
    /// Initial condition has a non-finite component
    #[error("initial state {state:?} is not finite")]
    InvalidInitialState {
        /// The offending state
        state: PhaseState,
    },
    /// Fixed step is not a positive finite number, or would need more than
    /// [`MAX_FIXED_STEPS`](crate::solver::MAX_FIXED_STEPS) substeps
    #[error("fixed step {step} must be positive and finite and cover the grid in at most 2^24 substeps")]
    InvalidFixedStep {
        /// The offending step
        step: f64,
    },
    /// A derived quantity was requested before any integration
    #[error("orbit has not been integrated; call integrate() first")]
    NotIntegrated,
    /// No potential given and none bound by a previous integration
    #[error("no potential supplied and none bound by a previous integration")]
    NoPotential,
    /// Query time outside the integrated span
    #[error("time {t} lies outside the integrated span [{start}, {end}]")]
    TimeOutOfRange {
        /// Requested time
        t: f64,
        /// Earliest integrated time
        start: f64,
        /// Latest integrated time
        end: f64,
    },
    /// Quantity that has no meaning for one-dimensional motion
    #[error("a one-dimensional orbit does not have {quantity}")]
    Undefined {
        /// Name of the quantity, with article
        quantity: &'static str,
    },
}

/// Every failure the crate can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad configuration or query
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A backend failed to produce a trajectory
    #[error("integration with '{method}' failed: {source}")]
    Integration {
        /// Method that was running
        method: Method,
        /// Underlying solver failure
        #[source]
        source: IntegrationError,
    },
    /// The native substrate reported a non-success status
    #[error("native backend '{method}' returned status {status}: {message}")]
    NativeBackend {
        /// Method that was running
        method: Method,
        /// Raw status code
        status: i32,
        /// Human-readable status description
        message: String,
    },
    /// A potential could not be evaluated outside of an integration
    #[error(transparent)]
    Potential(#[from] crate::potential::PotentialError),
}

impl Error {
    /// Wrap a solver failure with the method that produced it.
    pub(crate) fn integration(method: Method, source: IntegrationError) -> Self {
        match source {
            IntegrationError::Native { status, message } => Error::NativeBackend {
                method,
                status,
                message,
            },
            source => Error::Integration { method, source },
        }
    }

    /// True for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
