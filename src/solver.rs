//! Explicit Runge-Kutta solvers.
//!
//! [`EmbeddedRk`] drives any embedded pair from [`crate::coefficients`] with
//! adaptive step-size control; [`FixedRk`] steps any tableau with a fixed
//! step. Both can sample the solution on a list of output times, reproducing
//! the initial state exactly in the first row.

use thiserror::Error;

use crate::coefficients::{ErrorEstimate, Tableau};
use crate::potential::PotentialError;

/// First-order system `dy/dt = f(t, y)` with `N` components.
pub trait OdeSystem<const N: usize> {
    /// Write `f(t, y)` into `dydt`. A potential that cannot be evaluated at
    /// `y` aborts the integration.
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]) -> Result<(), PotentialError>;
}

/// Outcome of one attempted adaptive step.
#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    /// New state after the step (higher-order solution)
    pub y: [f64; N],
    /// New time value
    pub t: f64,
    /// Weighted error norm; the step is accepted when it is at most 1
    pub error: f64,
    /// Step to try next
    pub h_next: f64,
    /// Accepted or rejected
    pub accepted: bool,
}

/// Work counters accumulated by a solver.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Right-hand side evaluations
    pub fn_evals: u64,
    /// Steps kept
    pub accepted_steps: u64,
    /// Steps retried with a smaller h
    pub rejected_steps: u64,
}

/// Integral step-size controller.
///
/// h_new = safety * h * error^(-1/(q+1)), q the embedded order
#[derive(Debug, Clone)]
pub struct StepController {
    /// Multiplier applied to the optimal factor
    pub safety: f64,
    /// Upper clamp on the factor
    pub max_factor: f64,
    /// Lower clamp on the factor
    pub min_factor: f64,
    exponent: f64,
}

impl StepController {
    /// Controller tuned for the given tableau.
    pub fn for_tableau<const S: usize>(tableau: &Tableau<S>) -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: tableau.controller_exponent(),
        }
    }

    /// Factor by which to scale `h` after a step with weighted error `error`.
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }

        let factor = self.safety * error.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Mixed absolute/relative tolerances, one pair per component.
///
/// Error is computed as: |y_high - y_low| / (atol + rtol * |y_high|)
#[derive(Debug, Clone)]
pub struct Tolerances<const N: usize> {
    /// Absolute part
    pub atol: [f64; N],
    /// Relative part
    pub rtol: [f64; N],
}

impl<const N: usize> Tolerances<N> {
    /// Same tolerances on every component.
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self {
            atol: [atol; N],
            rtol: [rtol; N],
        }
    }

    fn scale(&self, n: usize, y: f64) -> f64 {
        self.atol[n] + self.rtol[n] * y.abs()
    }
}

/// Adaptive integrator for an embedded Runge-Kutta pair.
///
/// # Example
/// ```
/// use linorbit::coefficients::DOPRI54;
/// use linorbit::solver::{EmbeddedRk, OdeSystem, Tolerances};
/// use linorbit::PotentialError;
///
/// struct Decay;
///
/// impl OdeSystem<1> for Decay {
///     fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) -> Result<(), PotentialError> {
///         dydt[0] = -y[0];
///         Ok(())
///     }
/// }
///
/// let mut solver = EmbeddedRk::new(&DOPRI54, Tolerances::new(1e-12, 1e-12));
/// let (_, y) = solver.integrate(&Decay, 0.0, &[1.0], 1.0, 0.1).unwrap();
/// assert!((y[0] - (-1.0f64).exp()).abs() < 1e-10);
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedRk<const N: usize, const S: usize> {
    tableau: &'static Tableau<S>,
    tol: Tolerances<N>,
    controller: StepController,
    /// Minimum step size
    pub h_min: f64,
    /// Maximum step size
    pub h_max: f64,
    /// Step budget per call before giving up
    pub max_steps: u64,
    k: [[f64; N]; S],
    /// Integration statistics
    pub stats: Stats,
}

impl<const N: usize, const S: usize> EmbeddedRk<N, S> {
    /// Create a solver for `tableau`, which must carry an embedded estimate.
    pub fn new(tableau: &'static Tableau<S>, tol: Tolerances<N>) -> Self {
        debug_assert!(tableau.is_embedded(), "{} has no error estimate", tableau.name);
        Self {
            tableau,
            tol,
            controller: StepController::for_tableau(tableau),
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_steps: 10_000_000,
            k: [[0.0; N]; S],
            stats: Stats::default(),
        }
    }

    /// Perform a single trial step and decide whether to accept it.
    pub fn step<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> Result<StepResult<N>, IntegrationError> {
        let h = h.signum() * h.abs().clamp(self.h_min, self.h_max);

        compute_stages(self.tableau, &mut self.k, sys, t, y, h)?;
        let y_new = combine(&self.k, &self.tableau.b, y, h);
        let error = self.compute_error(&y_new, h);

        let accepted = error <= 1.0;
        let factor = self.controller.compute_factor(error);
        let h_next = (h.abs() * factor).clamp(self.h_min, self.h_max);

        self.stats.fn_evals += S as u64;
        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
        }

        Ok(StepResult {
            y: y_new,
            t: t + h,
            error,
            h_next,
            accepted,
        })
    }

    /// Advance `y0` from `t0` to exactly `tf`, starting with step `h0`
    /// (signed in the direction of integration). Returns `(tf, y(tf))`.
    pub fn integrate<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(f64, [f64; N]), IntegrationError> {
        if t0 == tf {
            return Ok((t0, *y0));
        }
        self.validate_inputs(t0, y0, tf, h0)?;
        let mut steps = 0u64;
        let (y, _) = self.advance(sys, t0, *y0, tf, h0, &mut steps)?;
        Ok((tf, y))
    }

    /// Integrate through every entry of `times`, returning one state per
    /// entry. The first row is `y0` itself. The step size carries over from
    /// one output interval to the next.
    pub fn integrate_grid<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        times: &[f64],
        y0: &[f64; N],
        h0: f64,
    ) -> Result<Vec<[f64; N]>, IntegrationError> {
        let mut out = Vec::with_capacity(times.len());
        out.push(*y0);
        if times.len() < 2 {
            return Ok(out);
        }
        let (t0, tf) = (times[0], times[times.len() - 1]);
        self.validate_inputs(t0, y0, tf, h0.abs() * (tf - t0).signum())?;

        let mut y = *y0;
        let mut h = h0.abs();
        let mut steps = 0u64;
        for pair in times.windows(2) {
            let direction = (pair[1] - pair[0]).signum();
            let (y_next, h_next) = self.advance(sys, pair[0], y, pair[1], h * direction, &mut steps)?;
            y = y_next;
            h = h_next;
            out.push(y);
        }
        Ok(out)
    }

    /// Starting step estimate (Hairer, Nørsett & Wanner, Sect. II.4).
    pub fn initial_step<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
    ) -> Result<f64, IntegrationError> {
        let span = (tf - t0).abs();
        if span == 0.0 {
            return Ok(self.h_min);
        }
        let direction = (tf - t0).signum();

        let mut f0 = [0.0; N];
        sys.rhs(t0, y0, &mut f0)?;
        let d0 = self.rms_scaled(y0, y0);
        let d1 = self.rms_scaled(&f0, y0);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };

        let mut y1 = [0.0; N];
        for n in 0..N {
            y1[n] = y0[n] + direction * h0 * f0[n];
        }
        let mut f1 = [0.0; N];
        sys.rhs(t0 + direction * h0, &y1, &mut f1)?;
        self.stats.fn_evals += 2;

        let mut df = [0.0; N];
        for n in 0..N {
            df[n] = f1[n] - f0[n];
        }
        let d2 = self.rms_scaled(&df, y0) / h0;
        let dmax = d1.max(d2);
        let h1 = if dmax <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / dmax).powf(1.0 / self.tableau.order as f64)
        };

        Ok((100.0 * h0).min(h1).min(span).clamp(self.h_min, self.h_max))
    }

    /// Advance from `t` to `tf`; returns the state at `tf` and the step
    /// magnitude to try next.
    fn advance<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        t0: f64,
        y0: [f64; N],
        tf: f64,
        h0: f64,
        step_count: &mut u64,
    ) -> Result<([f64; N], f64), IntegrationError> {
        let mut t = t0;
        let mut y = y0;
        let mut h = h0;
        let direction = (tf - t0).signum();
        // magnitude the controller asked for before clipping to tf
        let mut h_carry = h0.abs();

        while (tf - t) * direction > self.h_min {
            // land on tf
            if (t + h - tf) * direction > 0.0 {
                h = tf - t;
            }

            let result = self.step(sys, t, &y, h)?;
            if !result.error.is_finite() {
                return Err(IntegrationError::NonFiniteState { t: result.t });
            }

            if result.accepted {
                t = result.t;
                y = result.y;
                if !y.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t });
                }
                h_carry = result.h_next;
            }

            h = result.h_next * direction;

            *step_count += 1;
            if *step_count > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded { t });
            }

            // Rejected at h_min: no way to make progress
            if !result.accepted && result.h_next <= self.h_min && (tf - t) * direction > self.h_min
            {
                return Err(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
        }

        Ok((y, h_carry))
    }

    /// Scaled error estimate: the infinity norm for a single embedded
    /// solution, the blended RMS norm for a 8(5,3) pair.
    fn compute_error(&self, y_new: &[f64; N], h: f64) -> f64 {
        match &self.tableau.error {
            ErrorEstimate::None => 0.0,
            ErrorEstimate::Embedded(weights) => {
                let mut max_err: f64 = 0.0;
                for n in 0..N {
                    let err_n = h * self.weighted_stage_sum(weights, n);
                    let scaled_err = err_n.abs() / self.tol.scale(n, y_new[n]);
                    max_err = max_err.max(scaled_err);
                }
                max_err
            }
            ErrorEstimate::Blended { fifth, third } => {
                let mut err5 = 0.0;
                let mut err3 = 0.0;
                for n in 0..N {
                    let scale = self.tol.scale(n, y_new[n]);
                    err5 += (self.weighted_stage_sum(fifth, n) / scale).powi(2);
                    err3 += (self.weighted_stage_sum(third, n) / scale).powi(2);
                }
                if err5 == 0.0 && err3 == 0.0 {
                    return 0.0;
                }
                h.abs() * err5 / ((err5 + 0.01 * err3) * N as f64).sqrt()
            }
        }
    }

    #[allow(clippy::needless_range_loop)]
    fn weighted_stage_sum(&self, weights: &[f64; S], n: usize) -> f64 {
        let mut sum = 0.0;
        for i in 0..S {
            sum += weights[i] * self.k[i][n];
        }
        sum
    }

    fn rms_scaled(&self, v: &[f64; N], y: &[f64; N]) -> f64 {
        let sum: f64 = (0..N)
            .map(|n| (v[n] / self.tol.scale(n, y[n])).powi(2))
            .sum();
        (sum / N as f64).sqrt()
    }

    fn validate_inputs(
        &self,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(), IntegrationError> {
        if !t0.is_finite() || !tf.is_finite() || !h0.is_finite() {
            return Err(IntegrationError::InvalidInput {
                message: "t0, tf, and h0 must be finite".to_string(),
            });
        }
        if h0 == 0.0 {
            return Err(IntegrationError::InvalidInput {
                message: "h0 must be non-zero".to_string(),
            });
        }
        let direction = tf - t0;
        if direction != 0.0 && h0.signum() != direction.signum() {
            return Err(IntegrationError::InvalidInput {
                message: "h0 sign must match integration direction (tf - t0)".to_string(),
            });
        }
        for (i, &val) in y0.iter().enumerate() {
            if !val.is_finite() {
                return Err(IntegrationError::InvalidInput {
                    message: format!("y0[{}] is not finite", i),
                });
            }
        }
        for (i, (&a, &r)) in self.tol.atol.iter().zip(self.tol.rtol.iter()).enumerate() {
            if !a.is_finite() || a <= 0.0 {
                return Err(IntegrationError::InvalidInput {
                    message: format!("atol[{}] must be positive and finite", i),
                });
            }
            if !r.is_finite() || r < 0.0 {
                return Err(IntegrationError::InvalidInput {
                    message: format!("rtol[{}] must be non-negative and finite", i),
                });
            }
        }
        Ok(())
    }
}

/// Fixed-step integrator for any explicit tableau.
#[derive(Debug, Clone)]
pub struct FixedRk<const N: usize, const S: usize> {
    tableau: &'static Tableau<S>,
    k: [[f64; N]; S],
    /// Integration statistics
    pub stats: Stats,
}

impl<const N: usize, const S: usize> FixedRk<N, S> {
    /// Create a fixed-step solver for `tableau`.
    pub fn new(tableau: &'static Tableau<S>) -> Self {
        Self {
            tableau,
            k: [[0.0; N]; S],
            stats: Stats::default(),
        }
    }

    /// One step of size `h` (negative for backward integration).
    pub fn step<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> Result<[f64; N], IntegrationError> {
        compute_stages(self.tableau, &mut self.k, sys, t, y, h)?;
        self.stats.fn_evals += S as u64;
        self.stats.accepted_steps += 1;
        Ok(combine(&self.k, &self.tableau.b, y, h))
    }

    /// Sample the solution on `times`, splitting each output interval into
    /// equal substeps no longer than `h_max`.
    pub fn integrate_grid<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        times: &[f64],
        y0: &[f64; N],
        h_max: f64,
    ) -> Result<Vec<[f64; N]>, IntegrationError> {
        check_fixed_step(times, h_max)?;
        let mut out = Vec::with_capacity(times.len());
        out.push(*y0);
        let mut y = *y0;
        for pair in times.windows(2) {
            let n = substeps(pair[1] - pair[0], h_max);
            let h = (pair[1] - pair[0]) / n as f64;
            for j in 0..n {
                let t = pair[0] + j as f64 * h;
                y = self.step(sys, t, &y, h)?;
            }
            if !y.iter().all(|v| v.is_finite()) {
                return Err(IntegrationError::NonFiniteState { t: pair[1] });
            }
            out.push(y);
        }
        Ok(out)
    }
}

/// Most substeps a fixed-step run may take across its whole grid.
pub const MAX_FIXED_STEPS: usize = 1 << 24;

/// Number of substeps a fixed step `h` needs to cover `times`.
pub fn fixed_step_count(times: &[f64], h: f64) -> usize {
    times
        .windows(2)
        .map(|pair| substeps(pair[1] - pair[0], h))
        .fold(0usize, usize::saturating_add)
}

/// Reject a fixed step that is not a positive finite number or that would
/// need more than [`MAX_FIXED_STEPS`] substeps over `times`.
pub(crate) fn check_fixed_step(times: &[f64], h: f64) -> Result<(), IntegrationError> {
    if !h.is_finite() || h <= 0.0 {
        return Err(IntegrationError::InvalidInput {
            message: format!("step {} must be positive and finite", h),
        });
    }
    let count = fixed_step_count(times, h);
    if count > MAX_FIXED_STEPS {
        return Err(IntegrationError::InvalidInput {
            message: format!(
                "step {} needs {} substeps, more than {}",
                h, count, MAX_FIXED_STEPS
            ),
        });
    }
    Ok(())
}

/// Number of equal substeps of length at most `h` that cover `interval`.
pub(crate) fn substeps(interval: f64, h: f64) -> usize {
    let n = (interval.abs() / h - 1e-9).ceil();
    if n < 1.0 {
        1
    } else {
        n as usize
    }
}

#[allow(clippy::needless_range_loop)]
fn compute_stages<const N: usize, const S: usize, Sys: OdeSystem<N>>(
    tableau: &Tableau<S>,
    k: &mut [[f64; N]; S],
    sys: &Sys,
    t: f64,
    y: &[f64; N],
    h: f64,
) -> Result<(), PotentialError> {
    let mut y_temp = [0.0; N];
    sys.rhs(t, y, &mut k[0])?;
    for i in 1..S {
        for n in 0..N {
            let mut sum = 0.0;
            for j in 0..i {
                sum += tableau.a[i][j] * k[j][n];
            }
            y_temp[n] = y[n] + h * sum;
        }
        sys.rhs(t + tableau.c[i] * h, &y_temp, &mut k[i])?;
    }
    Ok(())
}

#[allow(clippy::needless_range_loop)]
fn combine<const N: usize, const S: usize>(
    k: &[[f64; N]; S],
    weights: &[f64; S],
    y: &[f64; N],
    h: f64,
) -> [f64; N] {
    let mut y_new = [0.0; N];
    for n in 0..N {
        let mut sum = 0.0;
        for i in 0..S {
            sum += weights[i] * k[i][n];
        }
        y_new[n] = y[n] + h * sum;
    }
    y_new
}

/// Errors that can occur during integration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// Step size became too small
    #[error("step size {h} too small at t = {t}")]
    StepSizeTooSmall {
        /// Time at which step size became too small
        t: f64,
        /// Step size that was too small
        h: f64,
    },
    /// Maximum number of steps exceeded
    #[error("maximum number of integration steps exceeded at t = {t}")]
    MaxStepsExceeded {
        /// Time reached when the budget ran out
        t: f64,
    },
    /// Invalid input parameters
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },
    /// Non-finite state detected during integration
    #[error("non-finite state detected at t = {t}")]
    NonFiniteState {
        /// Time at which non-finite state was detected
        t: f64,
    },
    /// The force could not be evaluated
    #[error(transparent)]
    Potential(#[from] PotentialError),
    /// The native substrate returned a non-success status
    #[error("native status {status}: {message}")]
    Native {
        /// Raw status code
        status: i32,
        /// Status description
        message: String,
    },
}
