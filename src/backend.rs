//! Integration backends: one implementation per [`Method`].
//!
//! The dispatcher never matches on method names. It asks [`backend_for`]
//! for the table entry of a method and calls [`IntegrationBackend::solve`],
//! so adding a scheme means adding one entry here.

use log::debug;

use crate::coefficients::{DOP853, DOPRI54};
use crate::eom::EquationOfMotion;
use crate::method::Method;
use crate::potential::PotentialSet;
use crate::scaling::{absolute_difference, default_step, Scaling};
use crate::solver::{EmbeddedRk, FixedRk, IntegrationError, Tolerances};
use crate::symplectic::Leapfrog;
use crate::trajectory::{PhaseState, TimeGrid};

/// Relative tolerance used by every method.
pub const RTOL: f64 = 1e-8;

/// Absolute tolerance used by the adaptive methods.
pub const ATOL: f64 = 1e-10;

/// Everything a backend needs for one integration.
#[derive(Debug, Clone, Copy)]
pub struct Problem<'a> {
    /// Potentials driving the motion
    pub potentials: &'a PotentialSet,
    /// State at `times[0]`
    pub initial: PhaseState,
    /// Validated output times
    pub times: &'a TimeGrid,
    /// Requested step, if any
    pub fixed_step: Option<f64>,
}

impl Problem<'_> {
    /// Characteristic timescale of the initial condition.
    pub fn timescale(&self) -> Result<f64, IntegrationError> {
        let t0 = self.times.as_slice()[0];
        let tau = Scaling::from_state(&self.initial)
            .timescale(&self.initial, |x| self.potentials.force(x, t0))?;
        Ok(tau)
    }
}

/// A way of turning a [`Problem`] into states on its time grid.
///
/// Implementations return one state per grid entry with the initial
/// condition, unmodified, in row 0.
pub trait IntegrationBackend: Sync {
    /// Method this backend implements.
    fn method(&self) -> Method;

    /// Integrate `problem`.
    fn solve(&self, problem: &Problem<'_>) -> Result<Vec<PhaseState>, IntegrationError>;
}

/// `odeint`: adaptive Dormand-Prince 5(4).
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveBackend;

impl IntegrationBackend for AdaptiveBackend {
    fn method(&self) -> Method {
        Method::Odeint
    }

    fn solve(&self, problem: &Problem<'_>) -> Result<Vec<PhaseState>, IntegrationError> {
        let times = problem.times.as_slice();
        if times.len() < 2 {
            return Ok(vec![problem.initial]);
        }
        let eom = EquationOfMotion::new(problem.potentials);
        let mut solver = EmbeddedRk::new(&DOPRI54, Tolerances::new(ATOL, RTOL));
        let h0 = solver.initial_step(&eom, times[0], &problem.initial, times[1])?;
        let states = solver.integrate_grid(&eom, times, &problem.initial, h0)?;
        debug!(
            "odeint: {} accepted, {} rejected steps",
            solver.stats.accepted_steps, solver.stats.rejected_steps
        );
        Ok(states)
    }
}

/// `dop853`: eighth-order Runge-Kutta at a fixed step, halved from the
/// default step for the initial timescale until the whole grid converges.
#[derive(Debug, Clone, Copy)]
pub struct HighOrderBackend;

impl IntegrationBackend for HighOrderBackend {
    fn method(&self) -> Method {
        Method::Dop853
    }

    fn solve(&self, problem: &Problem<'_>) -> Result<Vec<PhaseState>, IntegrationError> {
        let times = problem.times.as_slice();
        if times.len() < 2 {
            return Ok(vec![problem.initial]);
        }
        let h0 = default_step(problem.timescale()?, RTOL, DOP853.order);
        let eom = EquationOfMotion::new(problem.potentials);
        let mut steps = 0;
        let (h, states) = Scaling::from_state(&problem.initial).converge_step(
            times,
            h0,
            RTOL,
            absolute_difference,
            |h| {
                let mut solver = FixedRk::new(&DOP853);
                let states = solver.integrate_grid(&eom, times, &problem.initial, h)?;
                steps = solver.stats.accepted_steps;
                Ok(states)
            },
        )?;
        debug!("dop853: step {:.3e}, {} steps", h, steps);
        Ok(states)
    }
}

/// `leapfrog`: drift-kick-drift with an estimated step.
#[derive(Debug, Clone, Copy)]
pub struct LeapfrogBackend;

impl IntegrationBackend for LeapfrogBackend {
    fn method(&self) -> Method {
        Method::Leapfrog
    }

    fn solve(&self, problem: &Problem<'_>) -> Result<Vec<PhaseState>, IntegrationError> {
        let times = problem.times.as_slice();
        if times.len() < 2 {
            return Ok(vec![problem.initial]);
        }
        let eom = EquationOfMotion::new(problem.potentials);
        Leapfrog::new(RTOL, absolute_difference).integrate_grid(&eom, times, &problem.initial)
    }
}

static ADAPTIVE: AdaptiveBackend = AdaptiveBackend;
static HIGH_ORDER: HighOrderBackend = HighOrderBackend;
static LEAPFROG: LeapfrogBackend = LeapfrogBackend;

/// Backend serving `method`, or `None` when it needs the native substrate
/// and the crate was built without it.
pub fn backend_for(method: Method) -> Option<&'static dyn IntegrationBackend> {
    match method {
        Method::Odeint => Some(&ADAPTIVE),
        Method::Dop853 => Some(&HIGH_ORDER),
        Method::Leapfrog => Some(&LEAPFROG),
        #[cfg(feature = "native")]
        native => native_backend::lookup(native),
        #[cfg(not(feature = "native"))]
        _ => None,
    }
}

#[cfg(feature = "native")]
pub use native_backend::NativeBackend;

#[cfg(feature = "native")]
mod native_backend {
    use log::debug;

    use super::{IntegrationBackend, Problem, ATOL, RTOL};
    use crate::method::Method;
    use crate::native::{self, types::*, NativeParams};
    use crate::solver::IntegrationError;
    use crate::trajectory::{PhaseState, POSITION, VELOCITY};

    /// A native method running on the substrate.
    #[derive(Debug, Clone, Copy)]
    pub struct NativeBackend {
        method: Method,
        scheme: u32,
    }

    static TABLE: [NativeBackend; 7] = [
        NativeBackend {
            method: Method::LeapfrogC,
            scheme: SCHEME_LEAPFROG,
        },
        NativeBackend {
            method: Method::Rk4C,
            scheme: SCHEME_RK4,
        },
        NativeBackend {
            method: Method::Rk6C,
            scheme: SCHEME_RK6,
        },
        NativeBackend {
            method: Method::Symplec4C,
            scheme: SCHEME_SYMPLEC4,
        },
        NativeBackend {
            method: Method::Symplec6C,
            scheme: SCHEME_SYMPLEC6,
        },
        NativeBackend {
            method: Method::Dopr54C,
            scheme: SCHEME_DOPR54,
        },
        NativeBackend {
            method: Method::Dop853C,
            scheme: SCHEME_DOP853,
        },
    ];

    pub(super) fn lookup(method: Method) -> Option<&'static dyn IntegrationBackend> {
        TABLE
            .iter()
            .find(|b| b.method == method)
            .map(|b| b as &'static dyn IntegrationBackend)
    }

    impl IntegrationBackend for NativeBackend {
        fn method(&self) -> Method {
            self.method
        }

        fn solve(&self, problem: &Problem<'_>) -> Result<Vec<PhaseState>, IntegrationError> {
            let kernels = problem.potentials.native_kernels().ok_or_else(|| {
                IntegrationError::InvalidInput {
                    message: format!(
                        "potentials {:?} have no native description",
                        problem.potentials.unsupported_names()
                    ),
                }
            })?;
            let records = native::encode_kernels(&kernels);
            let times = problem.times.as_slice();
            let params = NativeParams {
                scheme: self.scheme,
                n_kernels: u32::try_from(records.len()).unwrap_or(u32::MAX),
                n_times: u32::try_from(times.len()).unwrap_or(u32::MAX),
                _pad: 0,
                dt: problem.fixed_step.unwrap_or(0.0),
                rtol: RTOL,
                atol: ATOL,
                x0: problem.initial[POSITION],
                v0: problem.initial[VELOCITY],
            };
            let mut out = vec![0.0; 2 * times.len()];
            let report = native::integrate(&params, &records, times, &mut out);
            if !report.is_success() {
                return Err(IntegrationError::Native {
                    status: report.status,
                    message: status_message(report.status).to_string(),
                });
            }
            debug!(
                "{}: native run finished in {} steps ({} rejected)",
                self.method, report.steps, report.rejected
            );
            let states: &[PhaseState] = bytemuck::cast_slice(&out);
            Ok(states.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::Harmonic;

    fn problem<'a>(pots: &'a PotentialSet, grid: &'a TimeGrid) -> Problem<'a> {
        Problem {
            potentials: pots,
            initial: [1.0, 0.0],
            times: grid,
            fixed_step: None,
        }
    }

    #[test]
    fn test_table_covers_pure_methods() {
        for m in [Method::Odeint, Method::Leapfrog, Method::Dop853] {
            assert_eq!(backend_for(m).map(|b| b.method()), Some(m));
        }
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_table_covers_native_methods() {
        for m in Method::ALL {
            assert_eq!(backend_for(m).map(|b| b.method()), Some(m), "{}", m);
        }
    }

    #[cfg(not(feature = "native"))]
    #[test]
    fn test_native_methods_absent_without_feature() {
        for m in Method::ALL.iter().filter(|m| m.is_native()) {
            assert!(backend_for(*m).is_none());
        }
    }

    #[test]
    fn test_pure_backends_on_oscillator() {
        let pots = PotentialSet::from(Harmonic::unit());
        let grid = TimeGrid::new(vec![0.0, 1.0, 2.0]).unwrap();
        for m in [Method::Odeint, Method::Leapfrog, Method::Dop853] {
            let states = backend_for(m).unwrap().solve(&problem(&pots, &grid)).unwrap();
            assert_eq!(states.len(), 3);
            assert_eq!(states[0], [1.0, 0.0]);
            assert!((states[2][0] - 2f64.cos()).abs() < 1e-6, "{}: {:?}", m, states[2]);
        }
    }

    #[test]
    fn test_single_point_grid() {
        let pots = PotentialSet::from(Harmonic::unit());
        let grid = TimeGrid::new(vec![0.0]).unwrap();
        for m in [Method::Odeint, Method::Leapfrog, Method::Dop853] {
            let states = backend_for(m).unwrap().solve(&problem(&pots, &grid)).unwrap();
            assert_eq!(states, vec![[1.0, 0.0]]);
        }
    }

    #[test]
    fn test_timescale_uses_force() {
        let pots = PotentialSet::from(Harmonic { k: 100.0 });
        let grid = TimeGrid::new(vec![0.0, 1.0]).unwrap();
        let tau = problem(&pots, &grid).timescale().unwrap();
        assert!((tau - 0.1).abs() < 1e-3, "{}", tau);
    }
}
