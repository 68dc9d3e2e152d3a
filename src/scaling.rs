//! Scaling of the initial condition for step-size selection.
//!
//! Step sizes are chosen in units of a characteristic timescale derived from
//! the magnitudes of the initial position and velocity and from the local
//! force gradient, so the same relative tolerance yields comparable accuracy
//! whatever units the caller works in.

use log::debug;

use crate::potential::PotentialError;
use crate::solver::{fixed_step_count, IntegrationError, MAX_FIXED_STEPS};
use crate::trajectory::{PhaseState, POSITION, VELOCITY};

/// Distance metric between two state components.
pub type Metric = fn(f64, f64) -> f64;

/// Plain absolute difference, the metric used for one-dimensional motion.
pub fn absolute_difference(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

/// Characteristic magnitudes of position and velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    /// Position scale
    pub position: f64,
    /// Velocity scale
    pub velocity: f64,
}

impl Scaling {
    /// Scaling vector `[|x₀|, |v₀|]`. A vanishing component borrows the
    /// other's magnitude; if both vanish the scale is unity.
    pub fn from_state(state: &PhaseState) -> Self {
        let x = state[POSITION].abs();
        let v = state[VELOCITY].abs();
        match (x > 0.0, v > 0.0) {
            (true, true) => Self {
                position: x,
                velocity: v,
            },
            (true, false) => Self {
                position: x,
                velocity: x,
            },
            (false, true) => Self {
                position: v,
                velocity: v,
            },
            (false, false) => Self {
                position: 1.0,
                velocity: 1.0,
            },
        }
    }

    /// Scales as a state-shaped array.
    pub fn components(&self) -> [f64; 2] {
        [self.position, self.velocity]
    }

    /// Root-mean-square of `metric(a, b) / (rtol · scale)` over both
    /// components. Values ≤ 1 mean `a` and `b` agree to `rtol`.
    pub fn error_norm(&self, a: &PhaseState, b: &PhaseState, rtol: f64, metric: Metric) -> f64 {
        let scales = self.components();
        let sum: f64 = (0..2)
            .map(|i| (metric(a[i], b[i]) / (rtol * scales[i])).powi(2))
            .sum();
        (sum / 2.0).sqrt()
    }

    /// Characteristic timescale at `state`, given the force as a function of
    /// position: the smallest of the crossing time `|x|/|v|`, the free-fall
    /// time `√(|x|/|a|)`, and the oscillation time `1/√|da/dx|`.
    pub fn timescale<F>(&self, state: &PhaseState, force: F) -> Result<f64, PotentialError>
    where
        F: Fn(f64) -> Result<f64, PotentialError>,
    {
        let mut tau = self.position / self.velocity;

        let x0 = state[POSITION];
        let a0 = force(x0)?;
        if a0 != 0.0 && a0.is_finite() {
            tau = tau.min((self.position / a0.abs()).sqrt());
        }

        let dx = self.position * 1e-3;
        let a1 = force(x0 + dx)?;
        let gradient = ((a1 - a0) / dx).abs();
        if gradient > 0.0 && gradient.is_finite() {
            tau = tau.min(1.0 / gradient.sqrt());
        }
        Ok(tau)
    }

    /// Halve a fixed step, starting from `h0`, until the runs over `times` at
    /// `h` and `h/2` agree to `rtol` at every output time. Returns the finer
    /// step and its run.
    ///
    /// Fails with [`IntegrationError::StepSizeTooSmall`] once the next run
    /// would need more than [`MAX_FIXED_STEPS`] substeps.
    pub fn converge_step<F>(
        &self,
        times: &[f64],
        h0: f64,
        rtol: f64,
        metric: Metric,
        mut run: F,
    ) -> Result<(f64, Vec<PhaseState>), IntegrationError>
    where
        F: FnMut(f64) -> Result<Vec<PhaseState>, IntegrationError>,
    {
        let mut h = h0;
        let mut coarse = run(h)?;
        loop {
            let half = 0.5 * h;
            if fixed_step_count(times, half) > MAX_FIXED_STEPS {
                return Err(IntegrationError::StepSizeTooSmall {
                    t: times.first().copied().unwrap_or(0.0),
                    h: half,
                });
            }
            let fine = run(half)?;
            let err = coarse
                .iter()
                .zip(&fine)
                .map(|(a, b)| self.error_norm(a, b, rtol, metric))
                .fold(0.0, f64::max);
            if err <= 1.0 {
                debug!("fixed step {:.3e} converged (start {:.3e})", half, h0);
                return Ok((half, fine));
            }
            coarse = fine;
            h = half;
        }
    }
}

/// Default fixed step for a scheme of the given order: the timescale times
/// `(4 · rtol)^(1/order)`.
pub fn default_step(timescale: f64, rtol: f64, order: u8) -> f64 {
    timescale * (4.0 * rtol).powf(1.0 / order.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_components_borrow_scale() {
        assert_eq!(Scaling::from_state(&[2.0, -3.0]).components(), [2.0, 3.0]);
        assert_eq!(Scaling::from_state(&[-2.0, 0.0]).components(), [2.0, 2.0]);
        assert_eq!(Scaling::from_state(&[0.0, 0.5]).components(), [0.5, 0.5]);
        assert_eq!(Scaling::from_state(&[0.0, 0.0]).components(), [1.0, 1.0]);
    }

    #[test]
    fn test_error_norm_is_relative() {
        let small = Scaling::from_state(&[1e-3, 1e-3]);
        let large = Scaling::from_state(&[1e3, 1e3]);
        let a = [1e-3, 1e-3];
        let b = [1e-3 * (1.0 + 1e-9), 1e-3];
        let a_big = [1e3, 1e3];
        let b_big = [1e3 * (1.0 + 1e-9), 1e3];
        let e_small = small.error_norm(&a, &b, 1e-8, absolute_difference);
        let e_large = large.error_norm(&a_big, &b_big, 1e-8, absolute_difference);
        assert!((e_small - e_large).abs() < 1e-6, "{} vs {}", e_small, e_large);
        assert!(e_small < 1.0);
    }

    #[test]
    fn test_timescale_of_oscillator() {
        // ω = 10: period-scale 1/ω regardless of where the orbit starts
        let k = 100.0;
        let force = |x: f64| Ok(-k * x);
        for state in [[1.0, 0.0], [0.0, 5.0], [0.3, -2.0]] {
            let tau = Scaling::from_state(&state).timescale(&state, force).unwrap();
            assert!(tau <= 0.1 + 1e-9, "tau = {} for {:?}", tau, state);
            assert!(tau > 0.0);
        }
    }

    #[test]
    fn test_timescale_of_free_particle() {
        let state = [1.0, 2.0];
        let tau = Scaling::from_state(&state)
            .timescale(&state, |_| Ok(0.0))
            .unwrap();
        assert!((tau - 0.5).abs() < 1e-12);
    }

    /// Forward Euler on x' = v, v' = -x: first order, so agreement to `rtol`
    /// takes many halvings.
    fn euler_run(times: &[f64], h: f64) -> Result<Vec<PhaseState>, IntegrationError> {
        let mut y = [1.0, 0.0];
        let mut out = vec![y];
        for pair in times.windows(2) {
            let n = ((pair[1] - pair[0]) / h).ceil() as usize;
            let dt = (pair[1] - pair[0]) / n as f64;
            for _ in 0..n {
                y = [y[0] + dt * y[1], y[1] - dt * y[0]];
            }
            out.push(y);
        }
        Ok(out)
    }

    #[test]
    fn test_converge_step_halves_until_agreement() {
        let times = [0.0, 0.5, 1.0];
        let scaling = Scaling::from_state(&[1.0, 0.0]);
        let mut runs = 0;
        let (h, states) = scaling
            .converge_step(&times, 0.5, 1e-3, absolute_difference, |h| {
                runs += 1;
                euler_run(&times, h)
            })
            .unwrap();
        assert!(h < 0.5 / 64.0, "h = {}", h);
        assert!(runs > 2);
        assert_eq!(states.len(), 3);
        assert!((states[2][0] - 1f64.cos()).abs() < 1e-2);
    }

    #[test]
    fn test_converge_step_gives_up_at_the_substep_limit() {
        let times = [0.0, 1.0];
        let scaling = Scaling::from_state(&[1.0, 0.0]);
        // the runs differ by h/2, which never drops below 1e-15 before the limit
        let result = scaling.converge_step(&times, 0.1, 1e-15, absolute_difference, |h| {
            Ok(vec![[1.0, 0.0], [1.0 + h, 0.0]])
        });
        assert!(matches!(result, Err(IntegrationError::StepSizeTooSmall { .. })));
    }

    #[test]
    fn test_default_step_shrinks_with_tolerance() {
        assert!(default_step(1.0, 1e-10, 2) < default_step(1.0, 1e-8, 2));
        assert!(default_step(1.0, 1e-8, 8) > default_step(1.0, 1e-8, 4));
        assert!((default_step(1.0, 1e-8, 2) - 2e-4).abs() < 1e-12);
    }
}
