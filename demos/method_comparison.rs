//! Every method on the same vertical disk orbit.
//!
//! Integrates a star oscillating through a Kuijken-Gilmore disk for 100 time
//! units and reports the final state, the maximum relative energy error and
//! the wall-clock time of each method.
//!
//! Run with:
//!   cargo run --release --example method_comparison

use std::time::Instant;

use linorbit::{Integrator, KuijkenGilmore, LinearOrbit, Method, PotentialSet};

fn main() {
    let disk = PotentialSet::from(KuijkenGilmore {
        k: 1.5,
        d: 0.18,
        f: 0.05,
    });
    let times: Vec<f64> = (0..=1000).map(|i| i as f64 * 0.1).collect();
    let integrator = Integrator::new();

    println!(
        "Vertical orbit in a Kuijken-Gilmore disk (native substrate {})",
        if integrator.capabilities().native_loaded() {
            "loaded"
        } else {
            "unavailable"
        }
    );
    println!();
    println!(
        "  {:<11} {:<11} {:>14} {:>14} {:>10} {:>9}",
        "requested", "used", "x(100)", "v(100)", "max |ΔE/E|", "time"
    );

    for method in Method::ALL {
        let mut orbit = LinearOrbit::new([0.5, 0.0]).unwrap();
        let start = Instant::now();
        let result = orbit.integrate(&times, disk.clone(), method).map(|t| *t.last().unwrap());
        let elapsed = start.elapsed();
        let last = match result {
            Ok(state) => state,
            Err(e) => {
                println!("  {:<11} failed: {}", method, e);
                continue;
            }
        };
        let energies = orbit.energy_series(None).unwrap();
        let worst = energies
            .iter()
            .map(|e| ((e - energies[0]) / energies[0]).abs())
            .fold(0.0, f64::max);
        println!(
            "  {:<11} {:<11} {:>14.10} {:>14.10} {:>10.2e} {:>7.1?}",
            method.as_str(),
            orbit.method_used().unwrap().as_str(),
            last[0],
            last[1],
            worst,
            elapsed
        );
    }
}
