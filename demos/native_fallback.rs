//! Capability fallback.
//!
//! Requests native methods for a potential built from closures, which has
//! no native kernel, and for a built-in potential on an integrator that has
//! the substrate disabled. Fallback notices are printed by a minimal logger.
//!
//! Run with:
//!   cargo run --example native_fallback
//!   LINORBIT_NO_NATIVE=1 cargo run --example native_fallback

use log::{LevelFilter, Log, Metadata, Record};

use linorbit::{Capabilities, FnPotential, Harmonic, Integrator, Method, Outcome, PotentialSet};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn report(label: &str, outcome: &Outcome) {
    let last = outcome.trajectory().last().unwrap();
    match outcome.fallback() {
        None => println!("  {label}: ran as requested, x(10) = {:.10}", last[0]),
        Some(fb) => println!(
            "  {label}: {} ran instead of {} ({}), x(10) = {:.10}",
            fb.substitute, fb.requested, fb.reason, last[0]
        ),
    }
}

fn main() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Warn);

    let times: Vec<f64> = (0..=100).map(|i| i as f64 * 0.1).collect();
    let quartic = PotentialSet::from(FnPotential::new(
        "quartic",
        |x, _| 0.25 * x.powi(4),
        |x, _| -x.powi(3),
    ));
    let harmonic = PotentialSet::from(Harmonic::unit());

    let detected = Integrator::new();
    let pure = Integrator::with_capabilities(Capabilities::pure());

    println!("Native substrate loaded: {}", detected.capabilities().native_loaded());
    println!();
    for method in [Method::Symplec4C, Method::Dop853C] {
        let outcome = detected
            .integrate([1.0, 0.0], &quartic, &times, method, None)
            .unwrap();
        report(&format!("{method} / closure potential"), &outcome);

        let outcome = detected
            .integrate([1.0, 0.0], &harmonic, &times, method, None)
            .unwrap();
        report(&format!("{method} / harmonic"), &outcome);

        let outcome = pure
            .integrate([1.0, 0.0], &harmonic, &times, method, None)
            .unwrap();
        report(&format!("{method} / harmonic, pure"), &outcome);
    }
}
