//! Flat, C-layout records exchanged with the native substrate.
//!
//! All types use `#[repr(C)]` and `bytemuck` derives so buffers can be
//! handed over as raw bytes. Every field is f64, i32 or u32 with explicit
//! padding.

use bytemuck::{Pod, Zeroable};

/// `params = [k, 0, 0, 0]`
pub const KIND_HARMONIC: u32 = 1;
/// `params = [g, 0, 0, 0]`
pub const KIND_UNIFORM_FIELD: u32 = 2;
/// `params = [K, D, F, 0]`
pub const KIND_KUIJKEN_GILMORE: u32 = 3;
/// `params = [σ², H, 0, 0]`
pub const KIND_ISOTHERMAL_DISK: u32 = 4;

/// Drift-kick-drift leapfrog
pub const SCHEME_LEAPFROG: u32 = 0;
/// Classical fourth-order Runge-Kutta
pub const SCHEME_RK4: u32 = 1;
/// Butcher's sixth-order Runge-Kutta
pub const SCHEME_RK6: u32 = 2;
/// Fourth-order symplectic composition
pub const SCHEME_SYMPLEC4: u32 = 3;
/// Sixth-order symplectic composition
pub const SCHEME_SYMPLEC6: u32 = 4;
/// Adaptive Dormand-Prince 5(4)
pub const SCHEME_DOPR54: u32 = 5;
/// Adaptive Dormand-Prince 8(5,3)
pub const SCHEME_DOP853: u32 = 6;

/// Integration completed
pub const STATUS_SUCCESS: i32 = 0;
/// Adaptive step fell below the minimum
pub const STATUS_STEP_TOO_SMALL: i32 = 1;
/// Step budget exhausted
pub const STATUS_MAX_STEPS: i32 = 2;
/// State became NaN or infinite
pub const STATUS_NON_FINITE: i32 = 3;
/// Malformed parameters or buffers
pub const STATUS_INVALID_INPUT: i32 = 4;
/// A kernel was evaluated outside its domain
pub const STATUS_DOMAIN: i32 = 5;

/// Describe a status code.
pub fn status_message(status: i32) -> &'static str {
    match status {
        STATUS_SUCCESS => "success",
        STATUS_STEP_TOO_SMALL => "step size fell below the minimum",
        STATUS_MAX_STEPS => "maximum number of steps exceeded",
        STATUS_NON_FINITE => "state became non-finite",
        STATUS_INVALID_INPUT => "invalid input",
        STATUS_DOMAIN => "potential evaluated outside its domain",
        _ => "unknown status",
    }
}

/// One potential term.
///
/// Layout: 40 bytes (2 × u32 + 4 × f64).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct KernelRecord {
    /// One of the `KIND_*` constants
    pub kind: u32,
    /// Padding for 8-byte alignment
    pub _pad: u32,
    /// Kind-specific parameters
    pub params: [f64; 4],
}

/// Parameters uniform across one integration.
///
/// Layout: 56 bytes (4 × u32 + 5 × f64).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct NativeParams {
    /// One of the `SCHEME_*` constants
    pub scheme: u32,
    /// Number of kernel records
    pub n_kernels: u32,
    /// Number of output times
    pub n_times: u32,
    /// Padding for 8-byte alignment
    pub _pad: u32,
    /// Fixed step, or initial step guess for adaptive schemes; 0 selects
    /// automatically
    pub dt: f64,
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Initial position
    pub x0: f64,
    /// Initial velocity
    pub v0: f64,
}

/// Outcome of one integration.
///
/// Layout: 16 bytes (i32 + 3 × u32).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct NativeReport {
    /// One of the `STATUS_*` constants
    pub status: i32,
    /// Accepted steps
    pub steps: u32,
    /// Rejected steps
    pub rejected: u32,
    /// Padding for 16-byte size
    pub _pad: u32,
}

impl NativeReport {
    pub(crate) fn with_status(status: i32) -> Self {
        Self {
            status,
            ..Self::zeroed()
        }
    }

    /// True when the integration completed.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}
