//! Equations of motion of a particle in a one-dimensional potential.
//!
//! ```text
//! dx/dt = v
//! dv/dt = F(x, t) = −Σ dUᵢ/dx
//! ```

use crate::potential::{PotentialError, PotentialSet};
use crate::solver::OdeSystem;
use crate::symplectic::SplitSystem;
use crate::trajectory::{PhaseState, POSITION, VELOCITY};

/// Total force of `potentials` at `(x, t)`; zero for an empty set.
pub fn evaluate_force(potentials: &PotentialSet, x: f64, t: f64) -> Result<f64, PotentialError> {
    potentials.force(x, t)
}

/// Total potential of `potentials` at `(x, t)`; zero for an empty set.
pub fn evaluate_potential(potentials: &PotentialSet, x: f64, t: f64) -> Result<f64, PotentialError> {
    potentials.potential(x, t)
}

/// Time derivative `[v, F(x, t)]` of a phase-space state.
pub fn derivative(
    state: &PhaseState,
    t: f64,
    potentials: &PotentialSet,
) -> Result<PhaseState, PotentialError> {
    Ok([
        state[VELOCITY],
        evaluate_force(potentials, state[POSITION], t)?,
    ])
}

/// Specific energy `U(x, t) + v²/2`.
pub fn energy(state: &PhaseState, t: f64, potentials: &PotentialSet) -> Result<f64, PotentialError> {
    Ok(evaluate_potential(potentials, state[POSITION], t)? + 0.5 * state[VELOCITY].powi(2))
}

/// First-order system for the pure-Rust solvers.
#[derive(Clone, Copy)]
pub struct EquationOfMotion<'a> {
    potentials: &'a PotentialSet,
}

impl<'a> EquationOfMotion<'a> {
    /// Motion in the sum of `potentials`.
    pub fn new(potentials: &'a PotentialSet) -> Self {
        Self { potentials }
    }
}

impl OdeSystem<2> for EquationOfMotion<'_> {
    fn rhs(&self, t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) -> Result<(), PotentialError> {
        *dydt = derivative(y, t, self.potentials)?;
        Ok(())
    }
}

impl SplitSystem for EquationOfMotion<'_> {
    fn kick(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        evaluate_force(self.potentials, x, t)
    }
}
