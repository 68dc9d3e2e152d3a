//! The one-dimensional orbit container.

use std::cell::OnceCell;

use crate::dispatch::{Fallback, Integrator, Outcome};
use crate::eom;
use crate::error::{ConfigurationError, Error};
use crate::method::{IntegrationOptions, Method};
use crate::potential::PotentialSet;
use crate::trajectory::{validate_state, PhaseState, Trajectory, POSITION, VELOCITY};

/// An orbit in a one-dimensional potential.
///
/// Holds the initial condition and, after [`integrate`](Self::integrate),
/// the sampled trajectory together with the potentials it was integrated
/// in. Re-integrating replaces everything but the initial condition.
///
/// ```
/// use linorbit::{Harmonic, LinearOrbit, Method};
///
/// let mut orbit = LinearOrbit::new([1.0, 0.0]).unwrap();
/// let times: Vec<f64> = (0..=100).map(|i| i as f64 * 0.1).collect();
/// orbit.integrate(&times, Harmonic::unit(), Method::Leapfrog).unwrap();
///
/// let e = orbit.energy(10.0, None).unwrap();
/// assert!((e - 0.5).abs() < 1e-8);
/// assert!(orbit.eccentricity().is_err());
/// ```
#[derive(Debug)]
pub struct LinearOrbit {
    initial: PhaseState,
    run: Option<Run>,
}

#[derive(Debug)]
struct Run {
    potentials: PotentialSet,
    requested: Method,
    used: Method,
    fallback: Option<Fallback>,
    fixed_step: Option<f64>,
    trajectory: Trajectory,
    interpolant: OnceCell<Interpolant>,
}

impl LinearOrbit {
    /// Orbit starting from `[x, v]` at `t = 0`.
    pub fn new(initial: PhaseState) -> Result<Self, ConfigurationError> {
        validate_state(&initial)?;
        Ok(Self { initial, run: None })
    }

    /// Initial condition.
    pub fn initial(&self) -> PhaseState {
        self.initial
    }

    /// Integrate with the detected capabilities and no fixed step.
    ///
    /// On error the previous trajectory, if any, is kept.
    pub fn integrate(
        &mut self,
        times: &[f64],
        potentials: impl Into<PotentialSet>,
        method: Method,
    ) -> Result<&Trajectory, Error> {
        self.integrate_with(
            &Integrator::new(),
            times,
            potentials,
            &IntegrationOptions::new(method),
        )
    }

    /// Integrate with an explicit integrator and options.
    pub fn integrate_with(
        &mut self,
        integrator: &Integrator,
        times: &[f64],
        potentials: impl Into<PotentialSet>,
        options: &IntegrationOptions,
    ) -> Result<&Trajectory, Error> {
        let potentials = potentials.into();
        let outcome =
            integrator.integrate_with_options(self.initial, &potentials, times, options)?;
        let (trajectory, fallback) = match outcome {
            Outcome::Success(trajectory) => (trajectory, None),
            Outcome::FallbackUsed {
                trajectory,
                fallback,
            } => (trajectory, Some(fallback)),
        };
        let used = fallback
            .as_ref()
            .map_or(options.method, |fb| fb.substitute);
        let run = self.run.insert(Run {
            potentials,
            requested: options.method,
            used,
            fallback,
            fixed_step: options.fixed_step,
            trajectory,
            interpolant: OnceCell::new(),
        });
        Ok(&run.trajectory)
    }

    /// Whether a trajectory is available.
    pub fn is_integrated(&self) -> bool {
        self.run.is_some()
    }

    fn run(&self) -> Result<&Run, ConfigurationError> {
        self.run.as_ref().ok_or(ConfigurationError::NotIntegrated)
    }

    /// Sampled trajectory.
    pub fn trajectory(&self) -> Result<&Trajectory, ConfigurationError> {
        Ok(&self.run()?.trajectory)
    }

    /// Output times of the last integration.
    pub fn times(&self) -> Result<&[f64], ConfigurationError> {
        Ok(self.run()?.trajectory.times())
    }

    /// Potentials bound by the last integration.
    pub fn potentials(&self) -> Option<&PotentialSet> {
        self.run.as_ref().map(|r| &r.potentials)
    }

    /// Method the caller asked for.
    pub fn requested_method(&self) -> Option<Method> {
        self.run.as_ref().map(|r| r.requested)
    }

    /// Method that produced the trajectory.
    pub fn method_used(&self) -> Option<Method> {
        self.run.as_ref().map(|r| r.used)
    }

    /// Fallback record of the last integration, if a substitute ran.
    pub fn fallback(&self) -> Option<&Fallback> {
        self.run.as_ref().and_then(|r| r.fallback.as_ref())
    }

    /// Fixed step passed to the last integration.
    pub fn fixed_step(&self) -> Option<f64> {
        self.run.as_ref().and_then(|r| r.fixed_step)
    }

    /// State at time `t`. Grid times return the stored state exactly; other
    /// times inside the integrated span are interpolated.
    pub fn state_at(&self, t: f64) -> Result<PhaseState, Error> {
        let run = self.run()?;
        let grid = run.trajectory.grid();
        let (start, end) = grid.span();
        if !(t >= start && t <= end) {
            return Err(ConfigurationError::TimeOutOfRange { t, start, end }.into());
        }
        if let Some(i) = grid.position_of(t) {
            return Ok(run.trajectory.states()[i]);
        }
        let interpolant = match run.interpolant.get() {
            Some(interp) => interp,
            None => {
                let built = Interpolant::build(&run.trajectory, &run.potentials)?;
                run.interpolant.get_or_init(|| built)
            }
        };
        Ok(interpolant.eval(t))
    }

    /// Specific energy `U(x, t) + v²/2` at time `t`.
    ///
    /// Uses `potentials` if given, otherwise the potentials bound by the
    /// last integration.
    pub fn energy(&self, t: f64, potentials: Option<&PotentialSet>) -> Result<f64, Error> {
        let state = self.state_at(t)?;
        let pots = self.energy_potentials(potentials)?;
        Ok(eom::energy(&state, t, pots)?)
    }

    /// [`energy`](Self::energy) at each of `times`.
    pub fn energies(&self, times: &[f64], potentials: Option<&PotentialSet>) -> Result<Vec<f64>, Error> {
        times.iter().map(|&t| self.energy(t, potentials)).collect()
    }

    /// Energy at every output time of the last integration.
    pub fn energy_series(&self, potentials: Option<&PotentialSet>) -> Result<Vec<f64>, Error> {
        let run = self.run()?;
        let pots = self.energy_potentials(potentials)?;
        run.trajectory
            .iter()
            .map(|(t, state)| eom::energy(state, t, pots).map_err(Error::from))
            .collect()
    }

    fn energy_potentials<'a>(
        &'a self,
        potentials: Option<&'a PotentialSet>,
    ) -> Result<&'a PotentialSet, ConfigurationError> {
        match potentials {
            Some(p) => Ok(p),
            None => self.potentials().ok_or(ConfigurationError::NoPotential),
        }
    }

    /// Not defined in one dimension; always an error.
    pub fn eccentricity(&self) -> Result<f64, ConfigurationError> {
        Err(ConfigurationError::Undefined {
            quantity: "an eccentricity",
        })
    }

    /// Not defined in one dimension; always an error.
    pub fn apocenter(&self) -> Result<f64, ConfigurationError> {
        Err(ConfigurationError::Undefined {
            quantity: "an apocenter",
        })
    }

    /// Not defined in one dimension; always an error.
    pub fn pericenter(&self) -> Result<f64, ConfigurationError> {
        Err(ConfigurationError::Undefined {
            quantity: "a pericenter",
        })
    }

    /// Not defined in one dimension; always an error.
    pub fn zmax(&self) -> Result<f64, ConfigurationError> {
        Err(ConfigurationError::Undefined {
            quantity: "a maximum height zmax",
        })
    }
}

/// Piecewise cubic Hermite interpolant through the grid nodes, using
/// `dx/dt = v` and `dv/dt = F(x, t)` as node slopes.
#[derive(Debug)]
struct Interpolant {
    times: Vec<f64>,
    states: Vec<PhaseState>,
    slopes: Vec<PhaseState>,
}

impl Interpolant {
    fn build(trajectory: &Trajectory, potentials: &PotentialSet) -> Result<Self, Error> {
        let slopes = trajectory
            .iter()
            .map(|(t, y)| eom::derivative(y, t, potentials))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            times: trajectory.times().to_vec(),
            states: trajectory.states().to_vec(),
            slopes,
        })
    }

    /// `t` must lie within the grid span.
    fn eval(&self, t: f64) -> PhaseState {
        let forward = self.times.len() < 2 || self.times[1] > self.times[0];
        // first node past t in the direction of integration
        let upper = self
            .times
            .partition_point(|&ti| if forward { ti <= t } else { ti >= t })
            .clamp(1, self.times.len() - 1);
        let lower = upper - 1;

        let (t_a, t_b) = (self.times[lower], self.times[upper]);
        let (y_a, y_b) = (&self.states[lower], &self.states[upper]);
        let (f_a, f_b) = (&self.slopes[lower], &self.slopes[upper]);
        let dt = t_b - t_a;

        let alpha = (t - t_a) / dt;
        let a2 = alpha * alpha;
        let a3 = a2 * alpha;
        let h00 = 1.0 - 3.0 * a2 + 2.0 * a3;
        let h10 = alpha - 2.0 * a2 + a3;
        let h01 = 3.0 * a2 - 2.0 * a3;
        let h11 = -a2 + a3;

        let mut y = [0.0; 2];
        for i in [POSITION, VELOCITY] {
            y[i] = h00 * y_a[i] + h10 * dt * f_a[i] + h01 * y_b[i] + h11 * dt * f_b[i];
        }
        y
    }
}
