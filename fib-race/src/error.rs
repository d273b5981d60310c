use std::error::Error;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::fixture::Loc;
use crate::model::Role;

/// The checker saw a cell holding more than the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundViolation {
    /// The cell that was read.
    pub loc: Loc,
    /// The value the checker observed.
    pub value: u64,
    /// The bound it was checked against.
    pub bound: u64,
}

impl fmt::Display for BoundViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bound violation: {} = {} exceeds {}",
            self.loc, self.value, self.bound
        )
    }
}

impl Error for BoundViolation {}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Each updater must run at least once.
    NoIterations,
    /// The cells would outgrow `u64` (the limit is carried along).
    TooManyIterations {
        iterations: usize,
        max: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoIterations => write!(f, "iterations must be at least 1"),
            ConfigError::TooManyIterations { iterations, max } => write!(
                f,
                "{} iterations would overflow the cells (at most {} supported)",
                iterations, max
            ),
        }
    }
}

impl Error for ConfigError {}

/// A schedule that cannot be replayed against a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The role has no instructions left at this point of the schedule.
    Finished {
        position: usize,
        role: Role,
    },
    /// The requested instruction may not be performed in the current state.
    NotEnabled {
        position: usize,
        role: Role,
        index: usize,
    },
    /// The schedule goes on after the checker halted the execution.
    Halted { position: usize },
    /// The schedule ran out before every thread completed.
    Incomplete { remaining: usize },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Finished { position, role } => {
                write!(f, "step {}: {} has already finished", position, role)
            }
            ReplayError::NotEnabled {
                position,
                role,
                index,
            } => write!(
                f,
                "step {}: instruction {} of {} is not enabled",
                position, index, role
            ),
            ReplayError::Halted { position } => {
                write!(f, "step {}: execution already halted on a violation", position)
            }
            ReplayError::Incomplete { remaining } => {
                write!(f, "schedule ended with {} instructions still unperformed", remaining)
            }
        }
    }
}

impl Error for ReplayError {}
