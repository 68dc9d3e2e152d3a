//! Method resolution, capability fallback and the integration entry point.

use std::fmt;
use std::sync::OnceLock;

use log::{debug, warn};

use crate::backend::{backend_for, Problem};
use crate::error::{ConfigurationError, Error};
use crate::method::{IntegrationOptions, Method};
use crate::potential::PotentialSet;
use crate::solver::{fixed_step_count, MAX_FIXED_STEPS};
use crate::trajectory::{validate_state, PhaseState, TimeGrid, Trajectory};

/// Environment variable that, when set, disables the native substrate.
pub const NO_NATIVE_ENV: &str = "LINORBIT_NO_NATIVE";

/// What the running process can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    native: bool,
}

impl Capabilities {
    /// Capabilities of this process, detected once and cached.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<Capabilities> = OnceLock::new();
        *DETECTED.get_or_init(|| {
            let native = cfg!(feature = "native") && std::env::var_os(NO_NATIVE_ENV).is_none();
            debug!("native substrate {}", if native { "loaded" } else { "unavailable" });
            Capabilities { native }
        })
    }

    /// Everything this build supports, ignoring the environment.
    pub fn all() -> Self {
        Self {
            native: cfg!(feature = "native"),
        }
    }

    /// Pure-Rust only; every native method falls back.
    pub fn pure() -> Self {
        Self { native: false }
    }

    /// Whether the native substrate can be used.
    pub fn native_loaded(&self) -> bool {
        self.native
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

/// Why a native method could not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The substrate is not loaded
    SubstrateUnavailable,
    /// Some potentials have no native description
    UnsupportedPotential {
        /// Names of the offending potentials
        names: Vec<String>,
    },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::SubstrateUnavailable => f.write_str("native substrate not loaded"),
            FallbackReason::UnsupportedPotential { names } => write!(
                f,
                "potential(s) {} cannot be evaluated natively",
                names.join(", ")
            ),
        }
    }
}

/// Record of a substitution of one method for another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    /// Method the caller asked for
    pub requested: Method,
    /// Method that actually ran
    pub substitute: Method,
    /// Why the requested method could not run
    pub reason: FallbackReason,
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "method '{}' unavailable ({}); using '{}' instead",
            self.requested, self.reason, self.substitute
        )
    }
}

/// Result of a successful integration.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The requested method ran
    Success(Trajectory),
    /// A substitute method ran
    FallbackUsed {
        /// Trajectory produced by the substitute
        trajectory: Trajectory,
        /// What was substituted and why
        fallback: Fallback,
    },
}

impl Outcome {
    /// The trajectory, whichever method produced it.
    pub fn trajectory(&self) -> &Trajectory {
        match self {
            Outcome::Success(trajectory) | Outcome::FallbackUsed { trajectory, .. } => trajectory,
        }
    }

    /// Take the trajectory.
    pub fn into_trajectory(self) -> Trajectory {
        match self {
            Outcome::Success(trajectory) | Outcome::FallbackUsed { trajectory, .. } => trajectory,
        }
    }

    /// Fallback record, if a substitute ran.
    pub fn fallback(&self) -> Option<&Fallback> {
        match self {
            Outcome::Success(_) => None,
            Outcome::FallbackUsed { fallback, .. } => Some(fallback),
        }
    }
}

/// Validates inputs, resolves the method against the process
/// [`Capabilities`] and runs the chosen backend.
///
/// ```
/// use linorbit::{Harmonic, Integrator, Method, PotentialSet};
///
/// let pots = PotentialSet::from(Harmonic::unit());
/// let times: Vec<f64> = (0..=10).map(|i| i as f64 * 0.1).collect();
/// let outcome = Integrator::new()
///     .integrate([1.0, 0.0], &pots, &times, Method::Odeint, None)
///     .unwrap();
/// let last = outcome.trajectory().last().unwrap();
/// assert!((last[0] - 1f64.cos()).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Integrator {
    capabilities: Capabilities,
}

impl Integrator {
    /// Integrator using the detected process capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrator with explicit capabilities.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    /// Capabilities in effect.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Method that will run for `method` on `potentials`, and the reason
    /// for any substitution.
    pub fn resolve(&self, method: Method, potentials: &PotentialSet) -> (Method, Option<Fallback>) {
        if !method.is_native() {
            return (method, None);
        }
        let reason = if !self.capabilities.native_loaded() || backend_for(method).is_none() {
            Some(FallbackReason::SubstrateUnavailable)
        } else if !potentials.supports_native() {
            Some(FallbackReason::UnsupportedPotential {
                names: potentials.unsupported_names(),
            })
        } else {
            None
        };
        match reason {
            None => (method, None),
            Some(reason) => {
                let substitute = method.pure_fallback();
                (
                    substitute,
                    Some(Fallback {
                        requested: method,
                        substitute,
                        reason,
                    }),
                )
            }
        }
    }

    /// Integrate `initial` through `potentials` and sample it at `times`.
    ///
    /// `times[0]` must be `0.0` and is the time of `initial`; row 0 of the
    /// trajectory is `initial` exactly. All input validation happens before
    /// any force evaluation.
    pub fn integrate(
        &self,
        initial: PhaseState,
        potentials: &PotentialSet,
        times: &[f64],
        method: Method,
        fixed_step: Option<f64>,
    ) -> Result<Outcome, Error> {
        validate_state(&initial)?;
        let grid = TimeGrid::try_from(times)?;
        if let Some(step) = fixed_step {
            if !step.is_finite()
                || step <= 0.0
                || fixed_step_count(grid.as_slice(), step) > MAX_FIXED_STEPS
            {
                return Err(ConfigurationError::InvalidFixedStep { step }.into());
            }
        }

        let (used, fallback) = self.resolve(method, potentials);
        if let Some(fb) = &fallback {
            warn!("{}", fb);
        }
        let backend = backend_for(used).ok_or(ConfigurationError::UnknownMethod {
            name: used.to_string(),
            expected: "a method available in this build".to_string(),
        })?;
        if used.is_native() {
            debug!("integrating with native method '{}'", used);
        }

        let problem = Problem {
            potentials,
            initial,
            times: &grid,
            fixed_step,
        };
        let states = backend
            .solve(&problem)
            .map_err(|e| Error::integration(used, e))?;
        let trajectory = Trajectory::new(grid, states);

        Ok(match fallback {
            None => Outcome::Success(trajectory),
            Some(fallback) => Outcome::FallbackUsed {
                trajectory,
                fallback,
            },
        })
    }

    /// [`integrate`](Self::integrate) with a method given by name. The name
    /// is parsed before anything else happens.
    pub fn integrate_named(
        &self,
        initial: PhaseState,
        potentials: &PotentialSet,
        times: &[f64],
        method: &str,
        fixed_step: Option<f64>,
    ) -> Result<Outcome, Error> {
        let method: Method = method.parse()?;
        self.integrate(initial, potentials, times, method, fixed_step)
    }

    /// [`integrate`](Self::integrate) driven by an options block.
    pub fn integrate_with_options(
        &self,
        initial: PhaseState,
        potentials: &PotentialSet,
        times: &[f64],
        options: &IntegrationOptions,
    ) -> Result<Outcome, Error> {
        self.integrate(initial, potentials, times, options.method, options.fixed_step)
    }
}

/// Integrate with the detected process capabilities.
pub fn integrate(
    initial: PhaseState,
    potentials: &PotentialSet,
    times: &[f64],
    method: Method,
    fixed_step: Option<f64>,
) -> Result<Outcome, Error> {
    Integrator::new().integrate(initial, potentials, times, method, fixed_step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::Harmonic;

    fn pure() -> Integrator {
        Integrator::with_capabilities(Capabilities::pure())
    }

    #[test]
    fn test_pure_methods_never_fall_back() {
        let pots = PotentialSet::from(Harmonic::unit());
        for m in [Method::Odeint, Method::Leapfrog, Method::Dop853] {
            assert_eq!(pure().resolve(m, &pots), (m, None));
        }
    }

    #[test]
    fn test_missing_substrate_falls_back_by_family() {
        let pots = PotentialSet::from(Harmonic::unit());
        let (used, fb) = pure().resolve(Method::Symplec6C, &pots);
        assert_eq!(used, Method::Leapfrog);
        assert_eq!(fb.unwrap().reason, FallbackReason::SubstrateUnavailable);

        let (used, _) = pure().resolve(Method::Dopr54C, &pots);
        assert_eq!(used, Method::Odeint);
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_unsupported_potential_falls_back() {
        use crate::potential::FnPotential;

        let pots = PotentialSet::new()
            .with(Harmonic::unit())
            .with(FnPotential::new("custom", |x, _| x.powi(4), |x, _| -4.0 * x.powi(3)));
        let native = Integrator::with_capabilities(Capabilities::all());
        let (used, fb) = native.resolve(Method::Rk4C, &pots);
        assert_eq!(used, Method::Odeint);
        assert_eq!(
            fb.unwrap().reason,
            FallbackReason::UnsupportedPotential {
                names: vec!["custom".to_string()]
            }
        );
        let (used, fb) = native.resolve(Method::Rk4C, &PotentialSet::from(Harmonic::unit()));
        assert_eq!(used, Method::Rk4C);
        assert!(fb.is_none());
    }

    #[test]
    fn test_fallback_outcome_carries_record() {
        let pots = PotentialSet::from(Harmonic::unit());
        let outcome = pure()
            .integrate([1.0, 0.0], &pots, &[0.0, 1.0], Method::Rk6C, None)
            .unwrap();
        let fb = outcome.fallback().unwrap();
        assert_eq!(fb.requested, Method::Rk6C);
        assert_eq!(fb.substitute, Method::Odeint);
        assert!(fb.to_string().contains("rk6_c"));
        assert_eq!(outcome.trajectory().len(), 2);
    }

    #[test]
    fn test_invalid_inputs_are_configuration_errors() {
        let pots = PotentialSet::from(Harmonic::unit());
        let i = pure();
        assert!(i
            .integrate([f64::NAN, 0.0], &pots, &[0.0, 1.0], Method::Odeint, None)
            .unwrap_err()
            .is_configuration());
        assert!(i
            .integrate([1.0, 0.0], &pots, &[0.5, 1.0], Method::Odeint, None)
            .unwrap_err()
            .is_configuration());
        assert!(i
            .integrate([1.0, 0.0], &pots, &[0.0, 1.0], Method::Odeint, Some(-0.1))
            .unwrap_err()
            .is_configuration());
        assert!(i
            .integrate_named([1.0, 0.0], &pots, &[0.0, 1.0], "euler", None)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_initial_row_is_exact() {
        let pots = PotentialSet::from(Harmonic::unit());
        let initial = [0.123456789, -9.87654321];
        for m in [Method::Odeint, Method::Leapfrog, Method::Dop853] {
            let outcome = pure()
                .integrate(initial, &pots, &[0.0, 0.3], m, None)
                .unwrap();
            assert_eq!(outcome.trajectory().states()[0], initial);
        }
    }
}
