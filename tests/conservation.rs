//! Accuracy and conservation properties shared by every method.

use std::f64::consts::{FRAC_PI_2, PI};

use linorbit::{
    Harmonic, IsothermalDisk, KuijkenGilmore, LinearOrbit, Method, PotentialSet, Trajectory,
    UniformField,
};

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
        .collect()
}

fn run(initial: [f64; 2], pots: &PotentialSet, times: &[f64], method: Method) -> Trajectory {
    linorbit::integrate(initial, pots, times, method, None)
        .unwrap_or_else(|e| panic!("{} failed: {}", method, e))
        .into_trajectory()
}

fn max_energy_error(orbit: &LinearOrbit) -> f64 {
    let series = orbit.energy_series(None).unwrap();
    series
        .iter()
        .map(|e| (e - series[0]).abs())
        .fold(0.0, f64::max)
}

#[test]
fn test_free_particle_energy_is_kinetic() {
    let v0 = 1.3;
    let times = linspace(0.0, 10.0, 11);
    for pots in [PotentialSet::new(), PotentialSet::from(UniformField { g: 0.0 })] {
        for method in Method::ALL {
            let mut orbit = LinearOrbit::new([0.5, v0]).unwrap();
            orbit.integrate(&times, pots.clone(), method).unwrap();
            for (t, e) in times.iter().zip(orbit.energy_series(None).unwrap()) {
                assert!(
                    (e - 0.5 * v0 * v0).abs() < 1e-10,
                    "{} at t = {}: energy {}",
                    method,
                    t,
                    e
                );
            }
            let last = orbit.trajectory().unwrap().last().copied().unwrap();
            assert!((last[0] - (0.5 + v0 * 10.0)).abs() < 1e-8, "{}: {:?}", method, last);
        }
    }
}

#[test]
fn test_energy_conserved_on_oscillator() {
    let times = linspace(0.0, 10.0, 101);
    for method in Method::ALL {
        let mut orbit = LinearOrbit::new([1.0, 0.0]).unwrap();
        orbit.integrate(&times, Harmonic::unit(), method).unwrap();
        let err = max_energy_error(&orbit);
        let bound = if orbit.method_used() == Some(Method::Leapfrog) {
            1e-8
        } else {
            1e-6
        };
        assert!(err < bound, "{}: energy error {:.3e}", method, err);
    }
}

#[test]
fn test_leapfrog_quarter_periods() {
    let pots = PotentialSet::from(Harmonic::unit());
    let expected = [[1.0, 0.0], [0.0, -1.0], [-1.0, 0.0]];
    for method in Method::ALL {
        let traj = run([1.0, 0.0], &pots, &[0.0, FRAC_PI_2, PI], method);
        for (state, want) in traj.states().iter().zip(&expected) {
            assert!(
                (state[0] - want[0]).abs() < 1e-3 && (state[1] - want[1]).abs() < 1e-3,
                "{}: {:?} vs {:?}",
                method,
                state,
                want
            );
        }
    }
}

#[test]
fn test_pure_methods_agree() {
    let times = linspace(0.0, 10.0, 100);
    let potentials = [
        PotentialSet::from(Harmonic::unit()),
        PotentialSet::from(IsothermalDisk {
            sigma2: 1.0,
            h: 0.5,
        }),
    ];
    for pots in &potentials {
        let runs: Vec<(Method, Trajectory)> = [Method::Odeint, Method::Dop853, Method::Leapfrog]
            .into_iter()
            .map(|m| (m, run([1.0, 0.0], pots, &times, m)))
            .collect();
        for (i, (ma, a)) in runs.iter().enumerate() {
            for (mb, b) in &runs[i + 1..] {
                for (k, (sa, sb)) in a.states().iter().zip(b.states()).enumerate() {
                    assert!(
                        (sa[0] - sb[0]).abs() < 1e-5 && (sa[1] - sb[1]).abs() < 1e-5,
                        "{:?}: {} and {} disagree at t = {}: {:?} vs {:?}",
                        pots,
                        ma,
                        mb,
                        times[k],
                        sa,
                        sb
                    );
                }
            }
        }
    }
}

#[test]
fn test_initial_row_is_exact_for_every_method() {
    let pots = PotentialSet::from(Harmonic { k: 2.0 });
    let initial = [0.1 + 0.2, -1.0 / 3.0];
    for method in Method::ALL {
        let traj = run(initial, &pots, &[0.0, 0.7, 1.4], method);
        assert_eq!(traj.states()[0], initial, "{}", method);
        assert_eq!(traj.times(), &[0.0, 0.7, 1.4]);
    }
}

#[test]
fn test_backward_integration() {
    let pots = PotentialSet::from(Harmonic::unit());
    let times = linspace(0.0, -10.0, 51);
    for method in [Method::Odeint, Method::Dop853, Method::Leapfrog] {
        let traj = run([1.0, 0.0], &pots, &times, method);
        for (t, state) in traj.iter() {
            assert!(
                (state[0] - t.cos()).abs() < 1e-6 && (state[1] + t.sin()).abs() < 1e-6,
                "{} at t = {}: {:?}",
                method,
                t,
                state
            );
        }
    }
}

#[test]
fn test_single_point_grid() {
    let pots = PotentialSet::from(Harmonic::unit());
    for method in Method::ALL {
        let traj = run([0.4, 0.2], &pots, &[0.0], method);
        assert_eq!(traj.states(), &[[0.4, 0.2]]);
    }
}

#[test]
fn test_leapfrog_energy_does_not_drift() {
    let times = linspace(0.0, 200.0, 2001);
    let mut orbit = LinearOrbit::new([1.0, 0.0]).unwrap();
    orbit
        .integrate(&times, Harmonic::unit(), Method::Leapfrog)
        .unwrap();
    let series = orbit.energy_series(None).unwrap();
    let error = |range: std::ops::Range<usize>| {
        series[range]
            .iter()
            .map(|e| (e - 0.5).abs())
            .fold(0.0, f64::max)
    };
    let early = error(0..200);
    let late = error(1801..2001);
    assert!(late < 1e-8, "late energy error {:.3e}", late);
    assert!(late <= 1.2 * early, "early {:.3e}, late {:.3e}", early, late);
}

/// Potentials whose force changes on a scale much shorter than the orbit,
/// each with a starting point far from the midplane.
fn thin_disks() -> Vec<(PotentialSet, [f64; 2])> {
    vec![
        (
            PotentialSet::from(KuijkenGilmore {
                k: 1.0,
                d: 0.02,
                f: 0.0,
            }),
            [1.0, 0.0],
        ),
        (
            PotentialSet::from(IsothermalDisk {
                sigma2: 1.0,
                h: 0.01,
            }),
            [2.0, 0.0],
        ),
    ]
}

#[test]
fn test_pure_methods_resolve_thin_disks() {
    let times = linspace(0.0, 20.0, 201);
    for (pots, initial) in thin_disks() {
        for (method, bound) in [
            (Method::Odeint, 1e-6),
            (Method::Dop853, 1e-8),
            (Method::Leapfrog, 2e-8),
        ] {
            let mut orbit = LinearOrbit::new(initial).unwrap();
            orbit.integrate(&times, pots.clone(), method).unwrap();
            let series = orbit.energy_series(None).unwrap();
            let rel = series
                .iter()
                .map(|e| ((e - series[0]) / series[0]).abs())
                .fold(0.0, f64::max);
            assert!(
                rel < bound,
                "{} from {:?} in {:?}: relative energy error {:.3e}",
                method,
                initial,
                pots,
                rel
            );
        }
    }
}
