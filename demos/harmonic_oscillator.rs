//! Basic usage: a particle in a harmonic well.
//!
//! Integrates x'' + ω²x = 0 for one period with the default method and
//! compares with the exact solution.
//!
//! Run with:
//!   cargo run --example harmonic_oscillator

use linorbit::{Harmonic, LinearOrbit, Method};

fn main() {
    let omega = 2.0;
    let period = 2.0 * std::f64::consts::PI / omega;
    let times: Vec<f64> = (0..=64).map(|i| period * i as f64 / 64.0).collect();

    let mut orbit = LinearOrbit::new([1.0, 0.0]).unwrap();
    let traj = orbit
        .integrate(&times, Harmonic::with_frequency(omega), Method::Odeint)
        .unwrap();
    let tf = traj.times()[traj.len() - 1];
    let yf = *traj.last().unwrap();

    // Exact solution: x(t) = cos(ωt), v(t) = -ω sin(ωt)
    let x_exact = (omega * tf).cos();
    let v_exact = -omega * (omega * tf).sin();

    println!("Harmonic Oscillator (ω = {omega})");
    println!("  Period:      {period:.6}");
    println!("  Final time:  {tf:.6}");
    println!();
    println!("  x(T) = {:.15}   (exact: {:.15})", yf[0], x_exact);
    println!("  v(T) = {:.15}   (exact: {:.15})", yf[1], v_exact);
    println!();
    println!("  Position error: {:.2e}", (yf[0] - x_exact).abs());
    println!("  Velocity error: {:.2e}", (yf[1] - v_exact).abs());

    let energies = orbit.energy_series(None).unwrap();
    let drift = energies
        .iter()
        .map(|e| (e - energies[0]).abs())
        .fold(0.0, f64::max);
    println!("  Energy:         {:.15}", energies[0]);
    println!("  Max |ΔE|:       {drift:.2e}");
    println!();
    println!("  x(T/3) (interpolated): {:.10}", orbit.state_at(period / 3.0).unwrap()[0]);
}
