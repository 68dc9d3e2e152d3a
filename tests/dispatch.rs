//! Method dispatch: validation order, fallback reporting and options.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use log::{Level, LevelFilter, Log, Metadata, Record};

use linorbit::{
    Capabilities, ConfigurationError, Error, FallbackReason, Harmonic, IntegrationOptions,
    Integrator, Method, Outcome, Potential, PotentialError, PotentialSet,
};

/// Logger that keeps every warning for inspection.
struct CaptureLogger {
    warnings: Mutex<Vec<String>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut warnings) = self.warnings.lock() {
                warnings.push(record.args().to_string());
            }
        }
    }

    fn flush(&self) {}
}

fn capture() -> &'static CaptureLogger {
    static LOGGER: OnceLock<&'static CaptureLogger> = OnceLock::new();
    LOGGER.get_or_init(|| {
        let logger: &'static CaptureLogger = Box::leak(Box::new(CaptureLogger {
            warnings: Mutex::new(Vec::new()),
        }));
        log::set_logger(logger).expect("no other logger installed");
        log::set_max_level(LevelFilter::Warn);
        logger
    })
}

fn warnings_containing(needle: &str) -> Vec<String> {
    capture()
        .warnings
        .lock()
        .unwrap()
        .iter()
        .filter(|w| w.contains(needle))
        .cloned()
        .collect()
}

/// Harmonic potential that counts force evaluations.
struct Counting {
    name: &'static str,
    calls: Arc<AtomicUsize>,
}

impl Potential for Counting {
    fn name(&self) -> &str {
        self.name
    }

    fn potential(&self, x: f64, _t: f64) -> Result<f64, PotentialError> {
        Ok(0.5 * x * x)
    }

    fn force(&self, x: f64, _t: f64) -> Result<f64, PotentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(-x)
    }
}

fn counting(name: &'static str) -> (PotentialSet, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let pots = PotentialSet::from(Counting {
        name,
        calls: Arc::clone(&calls),
    });
    (pots, calls)
}

#[test]
fn test_unknown_method_fails_before_any_force_evaluation() {
    let (pots, calls) = counting("counting-unknown");
    let err = Integrator::new()
        .integrate_named([1.0, 0.0], &pots, &[0.0, 1.0, 2.0], "rk45", None)
        .unwrap_err();
    match err {
        Error::Configuration(ConfigurationError::UnknownMethod { name, expected }) => {
            assert_eq!(name, "rk45");
            assert!(expected.contains("odeint"));
        }
        other => panic!("expected unknown method, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_grid_fails_before_any_force_evaluation() {
    let (pots, calls) = counting("counting-grid");
    for times in [
        vec![],
        vec![0.1, 1.0],
        vec![0.0, 1.0, 1.0],
        vec![0.0, 1.0, 0.5],
        vec![0.0, f64::NAN],
    ] {
        let err = Integrator::new()
            .integrate([1.0, 0.0], &pots, &times, Method::Odeint, None)
            .unwrap_err();
        assert!(
            matches!(
                err,
                Error::Configuration(ConfigurationError::InvalidTimeGrid { .. })
            ),
            "{:?}: {:?}",
            times,
            err
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_names_are_case_insensitive() {
    let pots = PotentialSet::from(Harmonic::unit());
    let outcome = Integrator::with_capabilities(Capabilities::pure())
        .integrate_named([1.0, 0.0], &pots, &[0.0, 1.0], "LeapFrog", None)
        .unwrap();
    assert!(matches!(outcome, Outcome::Success(_)));
}

#[test]
fn test_missing_substrate_warns_and_matches_pure() {
    capture();
    let (pots, _) = counting("counting-fallback");
    let times: Vec<f64> = (0..=20).map(|i| i as f64 * 0.5).collect();
    let pure = Integrator::with_capabilities(Capabilities::pure());

    let outcome = pure
        .integrate([1.0, 0.0], &pots, &times, Method::Dopr54C, None)
        .unwrap();
    let fb = outcome.fallback().cloned().expect("fallback expected");
    assert_eq!(fb.requested, Method::Dopr54C);
    assert_eq!(fb.substitute, Method::Odeint);
    assert_eq!(fb.reason, FallbackReason::SubstrateUnavailable);

    let reference = pure
        .integrate([1.0, 0.0], &pots, &times, Method::Odeint, None)
        .unwrap();
    assert_eq!(outcome.trajectory(), reference.trajectory());

    let warnings = warnings_containing("dopr54_c");
    assert!(!warnings.is_empty(), "no fallback warning was logged");
    assert!(warnings[0].contains("odeint"), "{}", warnings[0]);
}

#[test]
fn test_unsupported_potential_warns() {
    capture();
    let (pots, _) = counting("counting-unsupported");
    let outcome = Integrator::with_capabilities(Capabilities::all())
        .integrate([1.0, 0.0], &pots, &[0.0, 1.0], Method::Symplec4C, None)
        .unwrap();
    let fb = outcome.fallback().expect("fallback expected");
    assert_eq!(fb.substitute, Method::Leapfrog);
    if Capabilities::all().native_loaded() {
        assert_eq!(
            fb.reason,
            FallbackReason::UnsupportedPotential {
                names: vec!["counting-unsupported".to_string()]
            }
        );
    }
    assert!(!warnings_containing("symplec4_c").is_empty());
}

#[test]
fn test_fixed_step_must_be_positive() {
    let pots = PotentialSet::from(Harmonic::unit());
    for step in [0.0, -0.1, f64::NAN, f64::INFINITY] {
        let err = Integrator::new()
            .integrate([1.0, 0.0], &pots, &[0.0, 1.0], Method::Rk4C, Some(step))
            .unwrap_err();
        assert!(err.is_configuration(), "step {}: {:?}", step, err);
    }
}

#[test]
fn test_fixed_step_too_small_for_the_grid() {
    let pots = PotentialSet::from(Harmonic::unit());
    for method in [Method::Rk4C, Method::Symplec6C, Method::Dop853] {
        let err = Integrator::new()
            .integrate([1.0, 0.0], &pots, &[0.0, 1.0], method, Some(1e-300))
            .unwrap_err();
        assert!(
            matches!(
                err,
                Error::Configuration(ConfigurationError::InvalidFixedStep { step }) if step == 1e-300
            ),
            "{}: {:?}",
            method,
            err
        );
    }
}

#[test]
fn test_options_from_yaml() {
    let opts: IntegrationOptions = serde_yaml::from_str("method: rk6_c\nfixed_step: 0.01\n").unwrap();
    assert_eq!(opts.method, Method::Rk6C);
    assert_eq!(opts.fixed_step, Some(0.01));

    let opts: IntegrationOptions = serde_yaml::from_str("{}").unwrap();
    assert_eq!(opts, IntegrationOptions::default());

    let opts: IntegrationOptions = serde_yaml::from_str("method: dop853").unwrap();
    assert_eq!(opts.method, Method::Dop853);
    assert_eq!(opts.fixed_step, None);

    assert!(serde_yaml::from_str::<IntegrationOptions>("method: rk45").is_err());
}

#[test]
fn test_options_drive_integration() {
    let opts: IntegrationOptions = serde_yaml::from_str("method: leapfrog").unwrap();
    let pots = PotentialSet::from(Harmonic::unit());
    let outcome = Integrator::new()
        .integrate_with_options([0.0, 1.0], &pots, &[0.0, 1.0], &opts)
        .unwrap();
    let last = outcome.trajectory().last().copied().unwrap();
    assert!((last[0] - 1f64.sin()).abs() < 1e-6);

    let yaml = serde_yaml::to_string(&IntegrationOptions::new(Method::Symplec6C)).unwrap();
    assert!(yaml.contains("symplec6_c"), "{}", yaml);
}
