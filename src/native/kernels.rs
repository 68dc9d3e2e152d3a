//! Force evaluation over a flat kernel buffer.

use crate::potential::{NativeKernel, PotentialError};
use crate::solver::OdeSystem;
use crate::symplectic::SplitSystem;
use crate::trajectory::{POSITION, VELOCITY};

use super::types::{
    KernelRecord, KIND_HARMONIC, KIND_ISOTHERMAL_DISK, KIND_KUIJKEN_GILMORE, KIND_UNIFORM_FIELD,
};

impl KernelRecord {
    /// Encode a native kernel description.
    pub fn encode(kernel: &NativeKernel) -> Self {
        let (kind, params) = match *kernel {
            NativeKernel::Harmonic { k } => (KIND_HARMONIC, [k, 0.0, 0.0, 0.0]),
            NativeKernel::UniformField { g } => (KIND_UNIFORM_FIELD, [g, 0.0, 0.0, 0.0]),
            NativeKernel::KuijkenGilmore { k, d, f } => (KIND_KUIJKEN_GILMORE, [k, d, f, 0.0]),
            NativeKernel::IsothermalDisk { sigma2, h } => {
                (KIND_ISOTHERMAL_DISK, [sigma2, h, 0.0, 0.0])
            }
        };
        Self {
            kind,
            _pad: 0,
            params,
        }
    }

    /// True if `kind` is one the substrate knows.
    pub fn is_known(&self) -> bool {
        matches!(
            self.kind,
            KIND_HARMONIC | KIND_UNIFORM_FIELD | KIND_KUIJKEN_GILMORE | KIND_ISOTHERMAL_DISK
        )
    }

    /// Force of this term at `(x, t)`.
    pub fn force(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        let p = &self.params;
        match self.kind {
            KIND_HARMONIC => Ok(-p[0] * x),
            KIND_UNIFORM_FIELD => Ok(-p[0]),
            KIND_KUIJKEN_GILMORE => {
                let r = (x * x + p[1] * p[1]).sqrt();
                if r == 0.0 {
                    return Err(PotentialError::domain(
                        "native KuijkenGilmore",
                        x,
                        t,
                        "force is singular at x = 0 when D = 0",
                    ));
                }
                Ok(-x * (p[0] / r + 2.0 * p[2]))
            }
            KIND_ISOTHERMAL_DISK => Ok(-p[0] * (0.5 * x / p[1]).tanh() / p[1]),
            other => Err(PotentialError::domain(
                "native",
                x,
                t,
                format!("unknown kernel kind {}", other),
            )),
        }
    }
}

/// Equations of motion driven by a kernel buffer.
#[derive(Clone, Copy)]
pub(crate) struct NativeSystem<'a> {
    kernels: &'a [KernelRecord],
}

impl<'a> NativeSystem<'a> {
    pub(crate) fn new(kernels: &'a [KernelRecord]) -> Self {
        Self { kernels }
    }

    fn total_force(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        self.kernels
            .iter()
            .try_fold(0.0, |acc, k| Ok(acc + k.force(x, t)?))
    }
}

impl OdeSystem<2> for NativeSystem<'_> {
    fn rhs(&self, t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) -> Result<(), PotentialError> {
        dydt[POSITION] = y[VELOCITY];
        dydt[VELOCITY] = self.total_force(y[POSITION], t)?;
        Ok(())
    }
}

impl SplitSystem for NativeSystem<'_> {
    fn kick(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        self.total_force(x, t)
    }
}
