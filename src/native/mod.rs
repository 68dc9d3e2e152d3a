//! Native integration substrate.
//!
//! The substrate works only on flat, C-layout buffers: an array of
//! [`KernelRecord`]s describing the potential, a [`NativeParams`] block,
//! the output times, and an output buffer of `2 × n_times` f64 values laid
//! out as `[x₀, v₀, x₁, v₁, …]`. It never calls back into Rust trait
//! objects, so only potentials with a native description can run here.
//!
//! Failures are reported through the `status` field of the returned
//! [`NativeReport`]; the output buffer is unspecified unless the status is
//! [`STATUS_SUCCESS`](types::STATUS_SUCCESS).
//!
//! Enable with `cargo build --features native` (on by default).

mod kernels;
pub mod types;

pub use types::{KernelRecord, NativeParams, NativeReport};

use log::trace;

use crate::coefficients::{Tableau, DOP853, DOPRI54, RK4, RK6};
use crate::potential::NativeKernel;
use crate::scaling::{absolute_difference, default_step, Scaling};
use crate::solver::{
    fixed_step_count, EmbeddedRk, FixedRk, IntegrationError, Tolerances, MAX_FIXED_STEPS,
};
use crate::symplectic::{Composition, Leapfrog, SplitSystem};
use crate::trajectory::PhaseState;

use kernels::NativeSystem;
use types::*;

/// Encode native kernel descriptions into substrate records.
pub fn encode_kernels(kernels: &[NativeKernel]) -> Vec<KernelRecord> {
    kernels.iter().map(KernelRecord::encode).collect()
}

/// Run one integration on the substrate.
///
/// `times` must start at the time of the initial condition and `out` must
/// hold `2 × params.n_times` values.
pub fn integrate(
    params: &NativeParams,
    kernels: &[KernelRecord],
    times: &[f64],
    out: &mut [f64],
) -> NativeReport {
    if let Err(message) = validate(params, kernels, times, out) {
        trace!("native: rejected input: {}", message);
        return NativeReport::with_status(STATUS_INVALID_INPUT);
    }

    let sys = NativeSystem::new(kernels);
    let y0 = [params.x0, params.v0];
    let mut report = NativeReport::with_status(STATUS_SUCCESS);

    let result = match params.scheme {
        SCHEME_DOPR54 => {
            let mut solver = EmbeddedRk::new(&DOPRI54, tolerances(params));
            adaptive(&mut solver, &sys, params, times, &y0, &mut report)
        }
        SCHEME_DOP853 => {
            let mut solver = EmbeddedRk::new(&DOP853, tolerances(params));
            adaptive(&mut solver, &sys, params, times, &y0, &mut report)
        }
        SCHEME_RK4 => runge_kutta(&RK4, &sys, params, times, &y0, &mut report),
        SCHEME_RK6 => runge_kutta(&RK6, &sys, params, times, &y0, &mut report),
        SCHEME_LEAPFROG if params.dt == 0.0 => {
            Leapfrog::new(params.rtol, absolute_difference)
                .select_step(&sys, times, &y0)
                .map(|(h, states)| {
                    report.steps = count(fixed_step_count(times, h) as u64);
                    states
                })
        }
        SCHEME_LEAPFROG => {
            symplectic(Composition::leapfrog(), &sys, params, times, &y0, &mut report)
        }
        SCHEME_SYMPLEC4 => {
            symplectic(Composition::fourth_order(), &sys, params, times, &y0, &mut report)
        }
        SCHEME_SYMPLEC6 => {
            symplectic(Composition::sixth_order(), &sys, params, times, &y0, &mut report)
        }
        _ => Err(IntegrationError::InvalidInput {
            message: format!("unknown scheme {}", params.scheme),
        }),
    };

    match result {
        Ok(states) => {
            out.copy_from_slice(bytemuck::cast_slice(&states));
            trace!(
                "native: scheme {} finished in {} steps ({} rejected)",
                params.scheme,
                report.steps,
                report.rejected
            );
        }
        Err(err) => {
            report.status = status_of(&err);
            trace!("native: scheme {} failed: {}", params.scheme, err);
        }
    }
    report
}

fn validate(
    params: &NativeParams,
    kernels: &[KernelRecord],
    times: &[f64],
    out: &[f64],
) -> Result<(), String> {
    if params.n_kernels as usize != kernels.len() {
        return Err(format!(
            "n_kernels = {} but {} records given",
            params.n_kernels,
            kernels.len()
        ));
    }
    if params.n_times == 0 || params.n_times as usize != times.len() {
        return Err(format!(
            "n_times = {} but {} times given",
            params.n_times,
            times.len()
        ));
    }
    if out.len() != 2 * times.len() {
        return Err(format!("output buffer holds {} values", out.len()));
    }
    if let Some(k) = kernels.iter().find(|k| !k.is_known()) {
        return Err(format!("unknown kernel kind {}", k.kind));
    }
    if !params.dt.is_finite() || params.dt < 0.0 {
        return Err(format!("dt = {}", params.dt));
    }
    if params.dt > 0.0 && fixed_step_count(times, params.dt) > MAX_FIXED_STEPS {
        return Err(format!("dt = {} needs more than {} steps", params.dt, MAX_FIXED_STEPS));
    }
    if !(params.rtol.is_finite() && params.rtol > 0.0 && params.atol.is_finite() && params.atol > 0.0)
    {
        return Err("tolerances must be positive and finite".to_string());
    }
    if !(params.x0.is_finite() && params.v0.is_finite()) {
        return Err("initial state is not finite".to_string());
    }
    Ok(())
}

fn tolerances(params: &NativeParams) -> Tolerances<2> {
    Tolerances::new(params.atol, params.rtol)
}

fn count(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Run a fixed-step scheme of `order` at `params.dt` when one is given,
/// otherwise at the step [`Scaling::converge_step`] settles on, starting
/// from the default step for the initial timescale. `run` returns the
/// states and the number of steps taken.
fn fixed_step<F>(
    sys: &NativeSystem<'_>,
    params: &NativeParams,
    times: &[f64],
    y0: &PhaseState,
    order: u8,
    report: &mut NativeReport,
    mut run: F,
) -> Result<Vec<PhaseState>, IntegrationError>
where
    F: FnMut(f64) -> Result<(Vec<PhaseState>, u64), IntegrationError>,
{
    if params.dt > 0.0 {
        let (states, steps) = run(params.dt)?;
        report.steps = count(steps);
        return Ok(states);
    }
    if times.len() < 2 {
        return Ok(vec![*y0]);
    }
    let t0 = times[0];
    let scaling = Scaling::from_state(y0);
    let h0 = default_step(scaling.timescale(y0, |x| sys.kick(x, t0))?, params.rtol, order);
    let mut steps = 0;
    let (_, states) =
        scaling.converge_step(times, h0, params.rtol, absolute_difference, |h| {
            let (states, n) = run(h)?;
            steps = n;
            Ok(states)
        })?;
    report.steps = count(steps);
    Ok(states)
}

fn runge_kutta<const S: usize>(
    tableau: &'static Tableau<S>,
    sys: &NativeSystem<'_>,
    params: &NativeParams,
    times: &[f64],
    y0: &PhaseState,
    report: &mut NativeReport,
) -> Result<Vec<PhaseState>, IntegrationError> {
    fixed_step(sys, params, times, y0, tableau.order, report, |h| {
        let mut solver = FixedRk::new(tableau);
        let states = solver.integrate_grid(sys, times, y0, h)?;
        Ok((states, solver.stats.accepted_steps))
    })
}

fn adaptive<const S: usize>(
    solver: &mut EmbeddedRk<2, S>,
    sys: &NativeSystem<'_>,
    params: &NativeParams,
    times: &[f64],
    y0: &PhaseState,
    report: &mut NativeReport,
) -> Result<Vec<PhaseState>, IntegrationError> {
    if times.len() < 2 {
        return Ok(vec![*y0]);
    }
    let h0 = if params.dt > 0.0 {
        params.dt
    } else {
        solver.initial_step(sys, times[0], y0, times[1])?
    };
    let states = solver.integrate_grid(sys, times, y0, h0);
    report.steps = count(solver.stats.accepted_steps);
    report.rejected = count(solver.stats.rejected_steps);
    states
}

fn symplectic(
    scheme: Composition,
    sys: &NativeSystem<'_>,
    params: &NativeParams,
    times: &[f64],
    y0: &PhaseState,
    report: &mut NativeReport,
) -> Result<Vec<PhaseState>, IntegrationError> {
    fixed_step(sys, params, times, y0, scheme.order(), report, |h| {
        let mut scheme = scheme.clone();
        let states = scheme.integrate_grid(sys, times, y0, h)?;
        Ok((states, scheme.force_evals / scheme.weights().len() as u64))
    })
}

fn status_of(err: &IntegrationError) -> i32 {
    match err {
        IntegrationError::StepSizeTooSmall { .. } => STATUS_STEP_TOO_SMALL,
        IntegrationError::MaxStepsExceeded { .. } => STATUS_MAX_STEPS,
        IntegrationError::NonFiniteState { .. } => STATUS_NON_FINITE,
        IntegrationError::InvalidInput { .. } => STATUS_INVALID_INPUT,
        IntegrationError::Potential(_) => STATUS_DOMAIN,
        IntegrationError::Native { status, .. } => *status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(scheme: u32, n_kernels: usize, times: &[f64], dt: f64) -> NativeParams {
        NativeParams {
            scheme,
            n_kernels: n_kernels as u32,
            n_times: times.len() as u32,
            _pad: 0,
            dt,
            rtol: 1e-8,
            atol: 1e-10,
            x0: 1.0,
            v0: 0.0,
        }
    }

    fn run(scheme: u32, dt: f64) -> (Vec<f64>, NativeReport) {
        let kernels = encode_kernels(&[NativeKernel::Harmonic { k: 1.0 }]);
        let times = [0.0, 0.5, 1.0];
        let mut out = vec![0.0; 6];
        let report = integrate(&params(scheme, 1, &times, dt), &kernels, &times, &mut out);
        (out, report)
    }

    #[test]
    fn test_every_scheme_solves_the_oscillator() {
        for scheme in [
            SCHEME_LEAPFROG,
            SCHEME_RK4,
            SCHEME_RK6,
            SCHEME_SYMPLEC4,
            SCHEME_SYMPLEC6,
            SCHEME_DOPR54,
            SCHEME_DOP853,
        ] {
            let (out, report) = run(scheme, 0.0);
            assert!(report.is_success(), "scheme {}: {:?}", scheme, report);
            assert!(report.steps > 0);
            assert_eq!(&out[..2], &[1.0, 0.0]);
            assert!((out[4] - 1f64.cos()).abs() < 1e-6, "scheme {}: {}", scheme, out[4]);
            assert!((out[5] + 1f64.sin()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fixed_step_is_honored() {
        let (_, coarse) = run(SCHEME_RK4, 0.25);
        assert!(coarse.is_success());
        assert_eq!(coarse.steps, 4);
    }

    #[test]
    fn test_tiny_step_is_rejected() {
        let (_, report) = run(SCHEME_RK4, 1e-300);
        assert_eq!(report.status, STATUS_INVALID_INPUT);
        assert_eq!(report.steps, 0);
    }

    #[test]
    fn test_counts_saturate() {
        assert_eq!(count(7), 7);
        assert_eq!(count(u64::from(u32::MAX) + 1), u32::MAX);
        assert_eq!(count(u64::MAX), u32::MAX);
    }

    #[test]
    fn test_mismatched_buffers_are_rejected() {
        let kernels = encode_kernels(&[NativeKernel::Harmonic { k: 1.0 }]);
        let times = [0.0, 1.0];
        let mut out = vec![0.0; 3];
        let report = integrate(&params(SCHEME_RK4, 1, &times, 0.0), &kernels, &times, &mut out);
        assert_eq!(report.status, STATUS_INVALID_INPUT);

        let mut out = vec![0.0; 4];
        let report = integrate(&params(SCHEME_RK4, 2, &times, 0.0), &kernels, &times, &mut out);
        assert_eq!(report.status, STATUS_INVALID_INPUT);

        let report = integrate(&params(42, 1, &times, 0.0), &kernels, &times, &mut out);
        assert_eq!(report.status, STATUS_INVALID_INPUT);
    }

    #[test]
    fn test_unstable_step_reports_non_finite() {
        let kernels = encode_kernels(&[NativeKernel::Harmonic { k: 1e6 }]);
        let times: Vec<f64> = (0..=1000).map(|i| i as f64).collect();
        let mut out = vec![0.0; 2 * times.len()];
        let report = integrate(&params(SCHEME_RK4, 1, &times, 1.0), &kernels, &times, &mut out);
        assert_eq!(report.status, STATUS_NON_FINITE);
    }

    #[test]
    fn test_domain_error_is_reported() {
        let kernels = encode_kernels(&[NativeKernel::KuijkenGilmore {
            k: 1.0,
            d: 0.0,
            f: 0.0,
        }]);
        let times = [0.0, 1.0];
        let mut out = vec![0.0; 4];
        let mut p = params(SCHEME_LEAPFROG, 1, &times, 0.1);
        p.x0 = 0.0;
        p.v0 = 0.0;
        let report = integrate(&p, &kernels, &times, &mut out);
        assert_eq!(report.status, STATUS_DOMAIN);
    }

    #[test]
    fn test_empty_kernel_list_is_free_motion() {
        let times = [0.0, 2.0];
        let mut out = vec![0.0; 4];
        let mut p = params(SCHEME_SYMPLEC4, 0, &times, 0.0);
        p.v0 = 0.5;
        let report = integrate(&p, &[], &times, &mut out);
        assert!(report.is_success());
        assert!((out[2] - 2.0).abs() < 1e-12);
        assert!((out[3] - 0.5).abs() < 1e-15);
    }
}
