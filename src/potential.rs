//! Potentials that drive one-dimensional orbits.
//!
//! A [`Potential`] supplies a scalar potential and its force (negative
//! gradient) at `(x, t)`. Potentials are always handled through a
//! [`PotentialSet`], which sums its members; a single potential converts
//! into a one-member set with `From`.
//!
//! Potentials that can be evaluated by the native substrate describe
//! themselves with a [`NativeKernel`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Failure to evaluate a potential or its force.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PotentialError {
    /// The potential is not defined at the requested point
    #[error("potential '{name}' is undefined at x = {x}, t = {t}: {reason}")]
    Domain {
        /// Name of the failing potential
        name: String,
        /// Position
        x: f64,
        /// Time
        t: f64,
        /// Why evaluation failed
        reason: String,
    },
}

impl PotentialError {
    /// Build a domain error for potential `name` at `(x, t)`.
    pub fn domain(name: impl Into<String>, x: f64, t: f64, reason: impl Into<String>) -> Self {
        PotentialError::Domain {
            name: name.into(),
            x,
            t,
            reason: reason.into(),
        }
    }
}

/// Closed-form description of a potential that the native substrate can
/// evaluate without calling back into Rust trait objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeKernel {
    /// `U = k x² / 2`
    Harmonic {
        /// Spring constant (ω²)
        k: f64,
    },
    /// `U = g x`
    UniformField {
        /// Field strength
        g: f64,
    },
    /// `U = K (√(x² + D²) − D) + F x²`
    KuijkenGilmore {
        /// Disk surface-density term
        k: f64,
        /// Disk scale height
        d: f64,
        /// Halo density term
        f: f64,
    },
    /// `U = 2σ² ln cosh(x / 2H)`
    IsothermalDisk {
        /// Velocity dispersion squared
        sigma2: f64,
        /// Scale height
        h: f64,
    },
}

/// Capability interface of a potential provider.
pub trait Potential: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Scalar potential at position `x` and time `t`.
    fn potential(&self, x: f64, t: f64) -> Result<f64, PotentialError>;

    /// Force per unit mass (−dU/dx) at position `x` and time `t`.
    fn force(&self, x: f64, t: f64) -> Result<f64, PotentialError>;

    /// Native description, if the potential has one.
    fn native_kernel(&self) -> Option<NativeKernel> {
        None
    }

    /// Whether the native substrate can evaluate this potential.
    fn supports_native(&self) -> bool {
        self.native_kernel().is_some()
    }
}

/// Ordered collection of potentials whose forces and potentials add.
///
/// Members are reference-counted, so cloning a set is cheap and a set can be
/// shared between orbits integrated on different threads. An empty set is
/// the free particle.
#[derive(Clone, Default)]
pub struct PotentialSet {
    members: Vec<Arc<dyn Potential>>,
}

impl PotentialSet {
    /// Empty set (no force anywhere).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with<P: Potential + 'static>(mut self, potential: P) -> Self {
        self.push(potential);
        self
    }

    /// Append a potential.
    pub fn push<P: Potential + 'static>(&mut self, potential: P) {
        self.members.push(Arc::new(potential));
    }

    /// Number of member potentials.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate over the members in order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Potential> + '_ {
        self.members.iter().map(|p| p.as_ref())
    }

    /// Summed potential at `(x, t)`.
    pub fn potential(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        self.members
            .iter()
            .try_fold(0.0, |acc, p| Ok(acc + p.potential(x, t)?))
    }

    /// Summed force at `(x, t)`.
    pub fn force(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        self.members
            .iter()
            .try_fold(0.0, |acc, p| Ok(acc + p.force(x, t)?))
    }

    /// True when every member can be evaluated natively.
    pub fn supports_native(&self) -> bool {
        self.members.iter().all(|p| p.supports_native())
    }

    /// Native kernels for all members, or `None` if any member lacks one.
    pub fn native_kernels(&self) -> Option<Vec<NativeKernel>> {
        self.members.iter().map(|p| p.native_kernel()).collect()
    }

    /// Names of the members without a native implementation.
    pub fn unsupported_names(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|p| !p.supports_native())
            .map(|p| p.name().to_string())
            .collect()
    }
}

impl<P: Potential + 'static> From<P> for PotentialSet {
    fn from(potential: P) -> Self {
        PotentialSet::new().with(potential)
    }
}

impl FromIterator<Arc<dyn Potential>> for PotentialSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Potential>>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for PotentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.members.iter().map(|p| p.name()))
            .finish()
    }
}

/// Harmonic well `U = k x² / 2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    /// Spring constant (ω²)
    pub k: f64,
}

impl Harmonic {
    /// Unit-frequency oscillator.
    pub fn unit() -> Self {
        Self { k: 1.0 }
    }

    /// Oscillator with angular frequency `omega`.
    pub fn with_frequency(omega: f64) -> Self {
        Self { k: omega * omega }
    }
}

impl Potential for Harmonic {
    fn name(&self) -> &str {
        "Harmonic"
    }

    fn potential(&self, x: f64, _t: f64) -> Result<f64, PotentialError> {
        Ok(0.5 * self.k * x * x)
    }

    fn force(&self, x: f64, _t: f64) -> Result<f64, PotentialError> {
        Ok(-self.k * x)
    }

    fn native_kernel(&self) -> Option<NativeKernel> {
        Some(NativeKernel::Harmonic { k: self.k })
    }
}

/// Uniform field `U = g x`. With `g = 0` this is the free particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField {
    /// Field strength; the force is `-g`
    pub g: f64,
}

impl Potential for UniformField {
    fn name(&self) -> &str {
        "UniformField"
    }

    fn potential(&self, x: f64, _t: f64) -> Result<f64, PotentialError> {
        Ok(self.g * x)
    }

    fn force(&self, _x: f64, _t: f64) -> Result<f64, PotentialError> {
        Ok(-self.g)
    }

    fn native_kernel(&self) -> Option<NativeKernel> {
        Some(NativeKernel::UniformField { g: self.g })
    }
}

/// Vertical potential of Kuijken & Gilmore (1989): a thin exponential disk
/// plus a uniform-density halo,
/// `U = K (√(x² + D²) − D) + F x²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KuijkenGilmore {
    /// Disk term K
    pub k: f64,
    /// Disk scale height D
    pub d: f64,
    /// Halo term F
    pub f: f64,
}

impl Potential for KuijkenGilmore {
    fn name(&self) -> &str {
        "KuijkenGilmore"
    }

    fn potential(&self, x: f64, _t: f64) -> Result<f64, PotentialError> {
        Ok(self.k * ((x * x + self.d * self.d).sqrt() - self.d) + self.f * x * x)
    }

    fn force(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        let r = (x * x + self.d * self.d).sqrt();
        if r == 0.0 {
            // zero scale height: the cusp at x = 0 has no gradient
            return Err(PotentialError::domain(
                self.name(),
                x,
                t,
                "force is singular at x = 0 when D = 0",
            ));
        }
        Ok(-x * (self.k / r + 2.0 * self.f))
    }

    fn native_kernel(&self) -> Option<NativeKernel> {
        Some(NativeKernel::KuijkenGilmore {
            k: self.k,
            d: self.d,
            f: self.f,
        })
    }
}

/// Self-gravitating isothermal sheet `U = 2σ² ln cosh(x / 2H)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsothermalDisk {
    /// Velocity dispersion squared σ²
    pub sigma2: f64,
    /// Scale height H
    pub h: f64,
}

impl Potential for IsothermalDisk {
    fn name(&self) -> &str {
        "IsothermalDisk"
    }

    fn potential(&self, x: f64, _t: f64) -> Result<f64, PotentialError> {
        Ok(2.0 * self.sigma2 * (0.5 * x / self.h).cosh().ln())
    }

    fn force(&self, x: f64, _t: f64) -> Result<f64, PotentialError> {
        Ok(-self.sigma2 * (0.5 * x / self.h).tanh() / self.h)
    }

    fn native_kernel(&self) -> Option<NativeKernel> {
        Some(NativeKernel::IsothermalDisk {
            sigma2: self.sigma2,
            h: self.h,
        })
    }
}

/// Potential built from two closures. Has no native kernel.
pub struct FnPotential<P, F> {
    name: String,
    potential: P,
    force: F,
}

impl<P, F> FnPotential<P, F>
where
    P: Fn(f64, f64) -> f64 + Send + Sync,
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    /// Wrap `potential(x, t)` and `force(x, t)` closures.
    pub fn new(name: impl Into<String>, potential: P, force: F) -> Self {
        Self {
            name: name.into(),
            potential,
            force,
        }
    }
}

impl<P, F> Potential for FnPotential<P, F>
where
    P: Fn(f64, f64) -> f64 + Send + Sync,
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn potential(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        Ok((self.potential)(x, t))
    }

    fn force(&self, x: f64, t: f64) -> Result<f64, PotentialError> {
        Ok((self.force)(x, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    /// Central difference of the potential; should match the force.
    fn numerical_force(p: &dyn Potential, x: f64) -> f64 {
        let h = 1e-6;
        let up = p.potential(x + h, 0.0).unwrap();
        let down = p.potential(x - h, 0.0).unwrap();
        -(up - down) / (2.0 * h)
    }

    #[test]
    fn test_forces_are_negative_gradients() {
        let potentials: Vec<Box<dyn Potential>> = vec![
            Box::new(Harmonic { k: 2.5 }),
            Box::new(UniformField { g: 0.7 }),
            Box::new(KuijkenGilmore {
                k: 1.3,
                d: 0.2,
                f: 0.05,
            }),
            Box::new(IsothermalDisk {
                sigma2: 0.4,
                h: 0.3,
            }),
        ];
        for p in &potentials {
            for &x in &[-1.5, -0.3, 0.1, 0.8, 2.0] {
                let analytic = p.force(x, 0.0).unwrap();
                let numeric = numerical_force(p.as_ref(), x);
                assert!(
                    (analytic - numeric).abs() < 1e-6,
                    "{} at x = {}: force {} vs -dU/dx {}",
                    p.name(),
                    x,
                    analytic,
                    numeric
                );
            }
        }
    }

    #[test]
    fn test_set_sums_members() {
        let set = PotentialSet::new()
            .with(Harmonic { k: 1.0 })
            .with(UniformField { g: 0.5 });
        let x = 2.0;
        assert!((set.force(x, 0.0).unwrap() - (-2.0 - 0.5)).abs() < TOL);
        assert!((set.potential(x, 0.0).unwrap() - (2.0 + 1.0)).abs() < TOL);
    }

    #[test]
    fn test_single_and_list_share_one_path() {
        let single = PotentialSet::from(Harmonic { k: 3.0 });
        let list: PotentialSet = vec![Arc::new(Harmonic { k: 3.0 }) as Arc<dyn Potential>]
            .into_iter()
            .collect();
        assert_eq!(single.force(0.4, 0.0), list.force(0.4, 0.0));
    }

    #[test]
    fn test_empty_set_is_free_particle() {
        let set = PotentialSet::new();
        assert_eq!(set.force(3.0, 1.0).unwrap(), 0.0);
        assert_eq!(set.potential(3.0, 1.0).unwrap(), 0.0);
        assert!(set.supports_native());
    }

    #[test]
    fn test_native_support_requires_every_member() {
        let closure = FnPotential::new("quartic", |x: f64, _t| 0.25 * x.powi(4), |x: f64, _t| -x.powi(3));
        let set = PotentialSet::new().with(Harmonic::unit()).with(closure);
        assert!(!set.supports_native());
        assert!(set.native_kernels().is_none());
        assert_eq!(set.unsupported_names(), vec!["quartic".to_string()]);

        let native = PotentialSet::new()
            .with(Harmonic::unit())
            .with(UniformField { g: 1.0 });
        assert_eq!(native.native_kernels().map(|k| k.len()), Some(2));
    }

    #[test]
    fn test_kuijken_gilmore_cusp_is_domain_error() {
        let kg = KuijkenGilmore {
            k: 1.0,
            d: 0.0,
            f: 0.0,
        };
        assert!(matches!(
            kg.force(0.0, 0.0),
            Err(PotentialError::Domain { .. })
        ));
        assert!(kg.force(0.5, 0.0).is_ok());
    }

    #[test]
    fn test_debug_lists_names() {
        let set = PotentialSet::new()
            .with(Harmonic::unit())
            .with(IsothermalDisk { sigma2: 1.0, h: 1.0 });
        assert_eq!(format!("{:?}", set), "[\"Harmonic\", \"IsothermalDisk\"]");
    }
}
