//! Phase-space states, output time grids and sampled trajectories.

use crate::error::ConfigurationError;

/// Phase-space state of a one-dimensional orbit: `[x, v]`.
pub type PhaseState = [f64; 2];

/// Index of the position component in a [`PhaseState`].
pub const POSITION: usize = 0;

/// Index of the velocity component in a [`PhaseState`].
pub const VELOCITY: usize = 1;

/// Check that both components of a state are finite.
pub fn validate_state(state: &PhaseState) -> Result<(), ConfigurationError> {
    if state.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidInitialState { state: *state })
    }
}

/// Output times for an integration.
///
/// The first entry is the time of the initial condition and must be exactly
/// `0.0`. Entries are finite and strictly monotonic; a decreasing grid
/// integrates backward in time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<f64>,
}

impl TimeGrid {
    /// Validate and wrap a list of output times.
    pub fn new(times: Vec<f64>) -> Result<Self, ConfigurationError> {
        let first = match times.first() {
            Some(&t) => t,
            None => {
                return Err(ConfigurationError::InvalidTimeGrid {
                    message: "time grid is empty".to_string(),
                })
            }
        };
        if first != 0.0 {
            return Err(ConfigurationError::InvalidTimeGrid {
                message: format!("time grid must start at 0, got {}", first),
            });
        }
        if let Some((i, t)) = times.iter().enumerate().find(|(_, t)| !t.is_finite()) {
            return Err(ConfigurationError::InvalidTimeGrid {
                message: format!("time grid entry {} is not finite ({})", i, t),
            });
        }
        if times.len() > 1 {
            let direction = (times[1] - times[0]).signum();
            for (i, pair) in times.windows(2).enumerate() {
                let step = pair[1] - pair[0];
                if step == 0.0 || step.signum() != direction {
                    return Err(ConfigurationError::InvalidTimeGrid {
                        message: format!(
                            "time grid must be strictly monotonic (entries {} and {})",
                            i,
                            i + 1
                        ),
                    });
                }
            }
        }
        Ok(Self { times })
    }

    /// Output times as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }

    /// Number of output times.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Always false for a validated grid; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// +1.0 for forward grids, -1.0 for backward grids, 0.0 for a lone `t = 0`.
    pub fn direction(&self) -> f64 {
        match self.times.get(1) {
            Some(t1) => (t1 - self.times[0]).signum(),
            None => 0.0,
        }
    }

    /// Consecutive output intervals `(t_start, t_end)`.
    pub fn intervals(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.windows(2).map(|w| (w[0], w[1]))
    }

    /// Length of the first output interval, or 0 for a one-point grid.
    pub fn first_interval(&self) -> f64 {
        match self.times.get(1) {
            Some(t1) => (t1 - self.times[0]).abs(),
            None => 0.0,
        }
    }

    /// Earliest and latest time covered by the grid.
    pub fn span(&self) -> (f64, f64) {
        let last = self.times[self.times.len() - 1];
        (self.times[0].min(last), self.times[0].max(last))
    }

    /// Position of `t` among the grid entries, if it is one of them.
    pub fn position_of(&self, t: f64) -> Option<usize> {
        self.times.iter().position(|&ti| ti == t)
    }
}

impl TryFrom<Vec<f64>> for TimeGrid {
    type Error = ConfigurationError;

    fn try_from(times: Vec<f64>) -> Result<Self, Self::Error> {
        TimeGrid::new(times)
    }
}

impl TryFrom<&[f64]> for TimeGrid {
    type Error = ConfigurationError;

    fn try_from(times: &[f64]) -> Result<Self, Self::Error> {
        TimeGrid::new(times.to_vec())
    }
}

/// States sampled at the output times of a [`TimeGrid`].
///
/// Row `i` is the state at `times()[i]`; row 0 is the initial condition.
/// A trajectory is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    grid: TimeGrid,
    states: Vec<PhaseState>,
}

impl Trajectory {
    pub(crate) fn new(grid: TimeGrid, states: Vec<PhaseState>) -> Self {
        debug_assert_eq!(grid.len(), states.len());
        Self { grid, states }
    }

    /// Output times.
    pub fn times(&self) -> &[f64] {
        self.grid.as_slice()
    }

    /// The grid the trajectory was sampled on.
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// States, one per output time.
    pub fn states(&self) -> &[PhaseState] {
        &self.states
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when the trajectory has no rows.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State at row `index`.
    pub fn get(&self, index: usize) -> Option<&PhaseState> {
        self.states.get(index)
    }

    /// Positions column.
    pub fn positions(&self) -> Vec<f64> {
        self.states.iter().map(|s| s[POSITION]).collect()
    }

    /// Velocities column.
    pub fn velocities(&self) -> Vec<f64> {
        self.states.iter().map(|s| s[VELOCITY]).collect()
    }

    /// `(t, state)` pairs in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &PhaseState)> + '_ {
        self.grid.as_slice().iter().copied().zip(self.states.iter())
    }

    /// Last sampled state.
    pub fn last(&self) -> Option<&PhaseState> {
        self.states.last()
    }
}
