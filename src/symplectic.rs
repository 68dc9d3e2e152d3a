//! Symplectic integrators for separable Hamiltonians `H = v²/2 + U(x, t)`.
//!
//! All schemes are built from the drift-kick-drift leapfrog:
//!
//! ```text
//! x ← x + (h/2) v
//! v ← v + h F(x, t + h/2)
//! x ← x + (h/2) v
//! ```
//!
//! Higher orders come from Yoshida's triple-jump composition: a symmetric
//! scheme `S_p` of even order `p` yields a scheme of order `p + 2` as
//! `S_p(x₁h) ∘ S_p(x₀h) ∘ S_p(x₁h)` with `x₁ = 1 / (2 − 2^{1/(p+1)})` and
//! `x₀ = 1 − 2x₁`. Each substep is a shear in phase space, so the
//! composition preserves phase-space volume and the energy error stays
//! bounded instead of drifting.

use log::debug;

use crate::potential::PotentialError;
use crate::scaling::{Metric, Scaling};
use crate::solver::{check_fixed_step, fixed_step_count, substeps, IntegrationError};
use crate::trajectory::{PhaseState, POSITION, VELOCITY};

/// Largest number of leapfrog substeps tried per output interval when
/// estimating the step size.
pub const MAX_ESTIMATE_SUBSTEPS: usize = 1 << 20;

/// Largest number of full-grid leapfrog runs spent refining the step.
pub const MAX_REFINEMENT_PASSES: usize = 16;

/// A system whose flow splits into a position drift and a velocity kick.
pub trait SplitSystem {
    /// Rate of change of position.
    fn drift(&self, state: &PhaseState) -> f64 {
        state[VELOCITY]
    }

    /// Acceleration at position `x` and time `t`.
    fn kick(&self, x: f64, t: f64) -> Result<f64, PotentialError>;
}

/// Symmetric composition of drift-kick-drift leapfrog steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    name: &'static str,
    order: u8,
    weights: Vec<f64>,
    /// Force evaluations performed so far
    pub force_evals: u64,
}

impl Composition {
    /// Second-order drift-kick-drift leapfrog.
    pub fn leapfrog() -> Self {
        Self {
            name: "leapfrog",
            order: 2,
            weights: vec![1.0],
            force_evals: 0,
        }
    }

    /// Fourth-order triple jump of the leapfrog.
    pub fn fourth_order() -> Self {
        Self::leapfrog().triple_jump("symplectic-4")
    }

    /// Sixth-order triple jump of the fourth-order scheme.
    pub fn sixth_order() -> Self {
        Self::fourth_order().triple_jump("symplectic-6")
    }

    fn triple_jump(self, name: &'static str) -> Self {
        let exponent = 1.0 / (self.order as f64 + 1.0);
        let outer = 1.0 / (2.0 - 2f64.powf(exponent));
        let inner = 1.0 - 2.0 * outer;
        let weights = [outer, inner, outer]
            .iter()
            .flat_map(|&scale| self.weights.iter().map(move |w| w * scale))
            .collect();
        Self {
            name,
            order: self.order + 2,
            weights,
            force_evals: 0,
        }
    }

    /// Scheme name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Order of accuracy.
    pub fn order(&self) -> u8 {
        self.order
    }

    /// Leapfrog substep weights; they sum to one.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Advance `state` from `t` by `h`.
    pub fn step<Sys: SplitSystem>(
        &mut self,
        sys: &Sys,
        t: f64,
        state: &PhaseState,
        h: f64,
    ) -> Result<PhaseState, PotentialError> {
        let mut y = *state;
        let mut t_local = t;
        for &w in &self.weights {
            let dt = w * h;
            y[POSITION] += 0.5 * dt * sys.drift(&y);
            y[VELOCITY] += dt * sys.kick(y[POSITION], t_local + 0.5 * dt)?;
            y[POSITION] += 0.5 * dt * sys.drift(&y);
            t_local += dt;
        }
        self.force_evals += self.weights.len() as u64;
        Ok(y)
    }

    /// Advance across `[t0, t1]` in `n` equal steps.
    pub fn advance<Sys: SplitSystem>(
        &mut self,
        sys: &Sys,
        t0: f64,
        t1: f64,
        state: &PhaseState,
        n: usize,
    ) -> Result<PhaseState, PotentialError> {
        let h = (t1 - t0) / n as f64;
        let mut y = *state;
        for j in 0..n {
            y = self.step(sys, t0 + j as f64 * h, &y, h)?;
        }
        Ok(y)
    }

    /// Sample the solution on `times`, splitting each output interval into
    /// equal substeps no longer than `h_max`.
    pub fn integrate_grid<Sys: SplitSystem>(
        &mut self,
        sys: &Sys,
        times: &[f64],
        y0: &PhaseState,
        h_max: f64,
    ) -> Result<Vec<PhaseState>, IntegrationError> {
        check_fixed_step(times, h_max)?;
        let mut out = Vec::with_capacity(times.len());
        out.push(*y0);
        let mut y = *y0;
        for pair in times.windows(2) {
            let n = substeps(pair[1] - pair[0], h_max);
            y = self.advance(sys, pair[0], pair[1], &y, n)?;
            if !y.iter().all(|c| c.is_finite()) {
                return Err(IntegrationError::NonFiniteState { t: pair[1] });
            }
            out.push(y);
        }
        Ok(out)
    }
}

/// Leapfrog with a step size chosen along the orbit.
///
/// For every output interval the local step is the largest power-of-two
/// split of the interval at which `n` and `2n` substeps agree to `rtol` in
/// the [`Scaling`] of the initial state, capped at `τ √(4 rtol)` for the
/// characteristic timescale `τ` at the start of the interval. The grid is
/// rerun at the smallest local step until no interval asks for a smaller
/// one.
#[derive(Debug, Clone, Copy)]
pub struct Leapfrog {
    /// Relative tolerance
    pub rtol: f64,
    /// Component distance
    pub metric: Metric,
}

impl Leapfrog {
    /// Leapfrog with tolerance `rtol` and the given metric.
    pub fn new(rtol: f64, metric: Metric) -> Self {
        Self { rtol, metric }
    }

    /// Largest step `|t1 − t0| / n`, `n` a power of two, at which `n` and
    /// `2n` substeps from `y` over `[t0, t1]` agree to `rtol` in `scaling`.
    pub fn estimate_step<Sys: SplitSystem>(
        &self,
        sys: &Sys,
        scaling: &Scaling,
        t0: f64,
        t1: f64,
        y: &PhaseState,
    ) -> Result<f64, IntegrationError> {
        let mut scheme = Composition::leapfrog();
        let mut n = 1;
        let mut coarse = scheme.advance(sys, t0, t1, y, n)?;
        loop {
            let fine = scheme.advance(sys, t0, t1, y, 2 * n)?;
            let err = scaling.error_norm(&coarse, &fine, self.rtol, self.metric);
            if err <= 1.0 || 2 * n >= MAX_ESTIMATE_SUBSTEPS {
                if err > 1.0 {
                    debug!(
                        "leapfrog step estimate stopped at {} substeps (error norm {:.3e})",
                        2 * n,
                        err
                    );
                }
                return Ok((t1 - t0).abs() / (2 * n) as f64);
            }
            coarse = fine;
            n *= 2;
        }
    }

    fn local_step<Sys: SplitSystem>(
        &self,
        sys: &Sys,
        scaling: &Scaling,
        t0: f64,
        t1: f64,
        y: &PhaseState,
    ) -> Result<f64, IntegrationError> {
        let estimate = self.estimate_step(sys, scaling, t0, t1, y)?;
        let tau = scaling.timescale(y, |x| sys.kick(x, t0))?;
        Ok(estimate.min(tau * (4.0 * self.rtol).sqrt()))
    }

    /// Step and run on `times`. Row 0 is `y0`.
    pub fn select_step<Sys: SplitSystem>(
        &self,
        sys: &Sys,
        times: &[f64],
        y0: &PhaseState,
    ) -> Result<(f64, Vec<PhaseState>), IntegrationError> {
        if times.len() < 2 {
            return Ok((0.0, vec![*y0]));
        }
        let scaling = Scaling::from_state(y0);
        let mut h = self.local_step(sys, &scaling, times[0], times[1], y0)?;
        let mut passes = 0;
        loop {
            let states = Composition::leapfrog().integrate_grid(sys, times, y0, h)?;
            passes += 1;
            let mut smallest = f64::INFINITY;
            for (pair, y) in times.windows(2).zip(&states) {
                smallest = smallest.min(self.local_step(sys, &scaling, pair[0], pair[1], y)?);
            }
            if smallest >= h * (1.0 - 1e-12) || passes >= MAX_REFINEMENT_PASSES {
                debug!(
                    "leapfrog step {:.3e} after {} passes ({} substeps)",
                    h,
                    passes,
                    fixed_step_count(times, h)
                );
                return Ok((h, states));
            }
            h = smallest;
        }
    }

    /// Sample the solution on `times` with leapfrog steps.
    pub fn integrate_grid<Sys: SplitSystem>(
        &self,
        sys: &Sys,
        times: &[f64],
        y0: &PhaseState,
    ) -> Result<Vec<PhaseState>, IntegrationError> {
        self.select_step(sys, times, y0).map(|(_, states)| states)
    }
}
