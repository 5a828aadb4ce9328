//! Run-level context.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Information about the run an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunContext {
    /// Run number, if known.
    pub run_number: Option<u32>,
    /// True for collision data, false for simulation.
    pub is_data: bool,
}

impl RunContext {
    /// Context for real data from the given run.
    #[must_use]
    pub fn data(run_number: u32) -> Self {
        Self {
            run_number: Some(run_number),
            is_data: true,
        }
    }

    /// Context for simulated events.
    #[must_use]
    pub fn simulation() -> Self {
        Self {
            run_number: None,
            is_data: false,
        }
    }

    /// Positive run number of real data, if any.
    #[must_use]
    pub fn data_run(&self) -> Option<u32> {
        if self.is_data {
            self.run_number.filter(|&run| run > 0)
        } else {
            None
        }
    }
}
