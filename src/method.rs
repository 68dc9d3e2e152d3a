//! Integration method names and per-call options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Every supported integration method.
///
/// Names ending in `_c` run on the native substrate when it is available
/// and every potential has a native description; otherwise they fall back
/// to [`Method::pure_fallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Method {
    /// General-purpose adaptive solver (Dormand-Prince 5(4))
    #[default]
    #[serde(rename = "odeint")]
    Odeint,
    /// Drift-kick-drift leapfrog with an estimated step
    #[serde(rename = "leapfrog")]
    Leapfrog,
    /// Eighth-order Runge-Kutta
    #[serde(rename = "dop853")]
    Dop853,
    /// Native leapfrog
    #[serde(rename = "leapfrog_c")]
    LeapfrogC,
    /// Native classical fourth-order Runge-Kutta
    #[serde(rename = "rk4_c")]
    Rk4C,
    /// Native sixth-order Runge-Kutta
    #[serde(rename = "rk6_c")]
    Rk6C,
    /// Native fourth-order symplectic composition
    #[serde(rename = "symplec4_c")]
    Symplec4C,
    /// Native sixth-order symplectic composition
    #[serde(rename = "symplec6_c")]
    Symplec6C,
    /// Native adaptive Dormand-Prince 5(4)
    #[serde(rename = "dopr54_c")]
    Dopr54C,
    /// Native adaptive eighth-order Runge-Kutta
    #[serde(rename = "dop853_c")]
    Dop853C,
}

impl Method {
    /// All methods, pure ones first.
    pub const ALL: [Method; 10] = [
        Method::Odeint,
        Method::Leapfrog,
        Method::Dop853,
        Method::LeapfrogC,
        Method::Rk4C,
        Method::Rk6C,
        Method::Symplec4C,
        Method::Symplec6C,
        Method::Dopr54C,
        Method::Dop853C,
    ];

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Odeint => "odeint",
            Method::Leapfrog => "leapfrog",
            Method::Dop853 => "dop853",
            Method::LeapfrogC => "leapfrog_c",
            Method::Rk4C => "rk4_c",
            Method::Rk6C => "rk6_c",
            Method::Symplec4C => "symplec4_c",
            Method::Symplec6C => "symplec6_c",
            Method::Dopr54C => "dopr54_c",
            Method::Dop853C => "dop853_c",
        }
    }

    /// True for methods served by the native substrate.
    pub fn is_native(&self) -> bool {
        !matches!(self, Method::Odeint | Method::Leapfrog | Method::Dop853)
    }

    /// True for the leapfrog family.
    pub fn is_symplectic(&self) -> bool {
        matches!(
            self,
            Method::Leapfrog | Method::LeapfrogC | Method::Symplec4C | Method::Symplec6C
        )
    }

    /// Pure method used when a native one cannot run: `leapfrog` for the
    /// leapfrog family, `odeint` for everything else. Pure methods map to
    /// themselves.
    pub fn pure_fallback(&self) -> Method {
        if !self.is_native() {
            *self
        } else if self.is_symplectic() {
            Method::Leapfrog
        } else {
            Method::Odeint
        }
    }

    fn expected() -> String {
        Self::ALL
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| ConfigurationError::UnknownMethod {
                name: s.to_string(),
                expected: Self::expected(),
            })
    }
}

/// Per-call integration options.
///
/// ```
/// use linorbit::{IntegrationOptions, Method};
///
/// let opts = IntegrationOptions::new(Method::Rk6C).with_fixed_step(0.01);
/// assert_eq!(opts.method, Method::Rk6C);
/// assert_eq!(opts.fixed_step, Some(0.01));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationOptions {
    /// Integration method
    pub method: Method,
    /// Step size for native schemes; initial step guess for adaptive ones
    pub fixed_step: Option<f64>,
}

impl IntegrationOptions {
    /// Options for `method` with the default step.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            fixed_step: None,
        }
    }

    /// Request a specific step size.
    pub fn with_fixed_step(mut self, step: f64) -> Self {
        self.fixed_step = Some(step);
        self
    }
}
