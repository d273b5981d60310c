//! Exhaustive exploration and schedule replay.

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::machine::Machine;
use super::machine::Outcome;
use super::machine::State;
use super::machine::Step;
use super::policy::MemoryModel;
use super::program::Fences;
use super::program::Role;
use super::program::Scenario;
use crate::error::ReplayError;
use crate::fixture::Loc;

/// How the checker takes part in an exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum CheckerMode {
    /// The checker's instructions are interleaved with the updaters'. Yields
    /// the complete outcome set, but the state space grows quickly with the
    /// iteration count.
    Interleaved,
    /// Only the updaters are interleaved. The checker can run at any moment,
    /// so any state with a cell above the bound is a violation: the execution
    /// halts there and the checker's steps are appended in program order.
    Detached,
}

impl fmt::Display for CheckerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckerMode::Interleaved => write!(f, "interleaved"),
            CheckerMode::Detached => write!(f, "detached"),
        }
    }
}

/// Everything one exploration found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub model: MemoryModel,
    pub fences: Fences,
    pub checker: CheckerMode,
    pub iterations: usize,
    pub bound: u64,
    /// Distinct states visited.
    pub states: usize,
    /// The largest value ever stored to either cell.
    pub max_value: u64,
    pub outcomes: BTreeSet<Outcome>,
    /// Unfinished states in which no thread could move. Always zero unless
    /// the machine's enabledness rules deadlock.
    #[serde(default)]
    pub stuck: usize,
    /// The first violating execution found, as performed steps.
    pub counterexample: Option<Vec<Step>>,
}

impl Report {
    pub fn is_safe(&self) -> bool {
        self.counterexample.is_none()
    }

    pub fn violations(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.violation.is_some())
    }

    /// Final `(x, y)` pairs of the executions that ran to completion.
    pub fn final_cells(&self) -> BTreeSet<(u64, u64)> {
        self.outcomes
            .iter()
            .filter(|o| o.violation.is_none())
            .map(Outcome::final_cells)
            .collect()
    }
}

struct Explorer<'a> {
    machine: Machine<'a>,
    checker: CheckerMode,
    visited: HashSet<State>,
    outcomes: BTreeSet<Outcome>,
    path: Vec<Step>,
    counterexample: Option<Vec<Step>>,
    max_value: u64,
    stuck: usize,
}

impl<'a> Explorer<'a> {
    fn visit(&mut self, state: State) {
        if self.visited.contains(&state) {
            return;
        }
        if self.visited.len() % 100_000 == 0 && !self.visited.is_empty() {
            debug!("explored {} states", self.visited.len());
        }
        self.max_value = Loc::ALL
            .iter()
            .map(|&loc| state.memory(loc))
            .fold(self.max_value, u64::max);

        if self.checker == CheckerMode::Detached && self.exposes_violation(&state) {
            self.halt(&state);
            self.visited.insert(state);
            return;
        }

        if self.is_done(&state) {
            let outcome = self.machine.outcome(&state);
            if outcome.violation.is_some() && self.counterexample.is_none() {
                info!("counterexample found: {}", outcome);
                self.counterexample = Some(self.path.clone());
            }
            self.outcomes.insert(outcome);
            self.visited.insert(state);
            return;
        }

        let mut moved = false;
        for &role in self.roles() {
            for index in self.machine.enabled(&state, role) {
                let mut next = state.clone();
                if let Some(step) = self.machine.perform(&mut next, role, index) {
                    moved = true;
                    self.path.push(step);
                    self.visit(next);
                    self.path.pop();
                }
            }
        }
        if !moved {
            warn!(
                "no instruction enabled with {} remaining",
                self.machine.remaining(&state)
            );
            self.stuck += 1;
        }
        self.visited.insert(state);
    }

    fn roles(&self) -> &'static [Role] {
        match self.checker {
            CheckerMode::Interleaved => &Role::ALL,
            CheckerMode::Detached => &[Role::UpdaterA, Role::UpdaterB],
        }
    }

    fn is_done(&self, state: &State) -> bool {
        match self.checker {
            CheckerMode::Interleaved => self.machine.is_done(state),
            CheckerMode::Detached => self
                .roles()
                .iter()
                .all(|&role| self.machine.is_finished(state, role)),
        }
    }

    fn exposes_violation(&self, state: &State) -> bool {
        let bound = self.machine.scenario().bound();
        Loc::ALL.iter().any(|&loc| state.memory(loc) > bound)
    }

    /// Runs the checker in program order from `state` until it halts.
    fn halt(&mut self, state: &State) {
        let mut halted = state.clone();
        let mut tail = Vec::new();
        while let Some(&index) = self.machine.enabled(&halted, Role::Checker).first() {
            let Some(step) = self.machine.perform(&mut halted, Role::Checker, index) else {
                break;
            };
            tail.push(step);
        }
        let outcome = self.machine.outcome(&halted);
        if self.counterexample.is_none() {
            info!("counterexample found: {}", outcome);
            let mut steps = self.path.clone();
            steps.extend(tail);
            self.counterexample = Some(steps);
        }
        self.outcomes.insert(outcome);
    }
}

/// Visits every state reachable under `model`, collecting every outcome.
pub fn explore(scenario: &Scenario, model: MemoryModel, checker: CheckerMode) -> Report {
    let machine = Machine::new(scenario, model);
    let mut explorer = Explorer {
        machine,
        checker,
        visited: HashSet::new(),
        outcomes: BTreeSet::new(),
        path: Vec::new(),
        counterexample: None,
        max_value: 0,
        stuck: 0,
    };
    debug!(
        "exploring {} iterations, bound {}, fences {}, model {}, checker {}",
        scenario.iterations(),
        scenario.bound(),
        scenario.fences(),
        model,
        checker
    );
    explorer.visit(machine.initial());

    let report = Report {
        model,
        fences: scenario.fences(),
        checker,
        iterations: scenario.iterations(),
        bound: scenario.bound(),
        states: explorer.visited.len(),
        max_value: explorer.max_value,
        outcomes: explorer.outcomes,
        stuck: explorer.stuck,
        counterexample: explorer.counterexample,
    };
    info!(
        "{} states, {} outcomes, max value {}, {}",
        report.states,
        report.outcomes.len(),
        report.max_value,
        if report.is_safe() { "safe" } else { "violated" }
    );
    report
}

/// One scheduling decision: run `role`, performing instruction `index`, or the
/// earliest enabled instruction when no index is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub role: Role,
    #[serde(default)]
    pub index: Option<usize>,
}

impl From<Role> for Choice {
    fn from(role: Role) -> Self {
        Choice { role, index: None }
    }
}

impl From<&Step> for Choice {
    fn from(step: &Step) -> Self {
        Choice {
            role: step.role,
            index: Some(step.index),
        }
    }
}

/// A replayed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub steps: Vec<Step>,
    pub outcome: Outcome,
}

/// Runs `schedule` to completion. The schedule must end exactly when every
/// thread has finished or the checker has halted.
pub fn replay(
    scenario: &Scenario,
    model: MemoryModel,
    schedule: &[Choice],
) -> Result<Execution, ReplayError> {
    let machine = Machine::new(scenario, model);
    let mut state = machine.initial();
    let mut steps = Vec::with_capacity(schedule.len());

    for (position, choice) in schedule.iter().enumerate() {
        if state.violation().is_some() {
            return Err(ReplayError::Halted { position });
        }
        let index = match choice.index {
            Some(index) => index,
            None => {
                let enabled = machine.enabled(&state, choice.role);
                *enabled.first().ok_or(ReplayError::Finished {
                    position,
                    role: choice.role,
                })?
            }
        };
        let step = machine
            .perform(&mut state, choice.role, index)
            .ok_or(ReplayError::NotEnabled {
                position,
                role: choice.role,
                index,
            })?;
        steps.push(step);
    }

    if !machine.is_done(&state) {
        return Err(ReplayError::Incomplete {
            remaining: machine.remaining(&state),
        });
    }
    Ok(Execution {
        steps,
        outcome: machine.outcome(&state),
    })
}
