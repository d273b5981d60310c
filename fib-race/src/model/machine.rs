//! One step of the fixture under a memory model.

use std::fmt;

use bitvec::vec::BitVec;
use serde::Deserialize;
use serde::Serialize;

use super::policy::MemoryModel;
use super::program::Instr;
use super::program::Kind;
use super::program::Program;
use super::program::Reg;
use super::program::Role;
use super::program::Scenario;
use crate::error::BoundViolation;
use crate::fixture::Loc;
use crate::fixture::Observation;
use crate::fixture::INITIAL;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ThreadState {
    performed: BitVec,
    /// Registers are cleared once every reader has been performed, so states
    /// that only differ in dead values compare equal.
    regs: Vec<Option<u64>>,
}

impl ThreadState {
    fn new(program: &Program) -> Self {
        ThreadState {
            performed: BitVec::repeat(false, program.len()),
            regs: vec![None; program.registers()],
        }
    }

    fn reg(&self, reg: Reg) -> Option<u64> {
        self.regs.get(reg.0).copied().flatten()
    }
}

/// A snapshot of the whole fixture: memory, every thread's progress, and what
/// the checker has seen so far.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    memory: [u64; 2],
    threads: [ThreadState; 3],
    observed: [Option<u64>; 2],
    violation: Option<BoundViolation>,
}

impl State {
    pub fn memory(&self, loc: Loc) -> u64 {
        self.memory[loc.index()]
    }

    pub fn observed(&self, loc: Loc) -> Option<u64> {
        self.observed[loc.index()]
    }

    pub fn violation(&self) -> Option<BoundViolation> {
        self.violation
    }

    pub fn is_performed(&self, role: Role, index: usize) -> bool {
        self.threads[role.index()]
            .performed
            .get(index)
            .map_or(false, |bit| *bit)
    }
}

/// One performed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub role: Role,
    pub index: usize,
    pub instr: Instr,
    /// Loaded, stored or checked value.
    pub value: u64,
    /// The load was satisfied from the thread's own pending store.
    #[serde(default)]
    pub forwarded: bool,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>9} #{:<3} {:<24} = {}",
            self.role,
            self.index,
            self.instr.to_string(),
            self.value
        )?;
        if self.forwarded {
            write!(f, " (forwarded)")?;
        }
        Ok(())
    }
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outcome {
    pub x: u64,
    pub y: u64,
    pub observed_x: Option<u64>,
    pub observed_y: Option<u64>,
    pub violation: Option<BoundViolation>,
}

impl Outcome {
    /// An outcome of the native fixture: the cells after joining, and what the
    /// checker returned.
    pub fn from_run((x, y): (u64, u64), checked: Result<Observation, BoundViolation>) -> Self {
        let (observed_x, observed_y, violation) = match checked {
            Ok(observation) => (Some(observation.x), Some(observation.y), None),
            Err(violation) => match violation.loc {
                Loc::X => (Some(violation.value), None, Some(violation)),
                Loc::Y => (None, Some(violation.value), Some(violation)),
            },
        };
        Outcome {
            x,
            y,
            observed_x,
            observed_y,
            violation,
        }
    }

    pub fn final_cells(&self) -> (u64, u64) {
        (self.x, self.y)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(value: Option<u64>) -> String {
            value.map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "x = {}, y = {}, checker saw ({}, {})",
            self.x,
            self.y,
            show(self.observed_x),
            show(self.observed_y)
        )?;
        if let Some(violation) = &self.violation {
            write!(f, ", {}", violation)?;
        }
        Ok(())
    }
}

/// Executes a scenario's instructions one at a time under a memory model.
#[derive(Debug, Clone, Copy)]
pub struct Machine<'a> {
    scenario: &'a Scenario,
    model: MemoryModel,
}

impl<'a> Machine<'a> {
    pub fn new(scenario: &'a Scenario, model: MemoryModel) -> Self {
        Machine { scenario, model }
    }

    pub fn scenario(&self) -> &'a Scenario {
        self.scenario
    }

    pub fn initial(&self) -> State {
        State {
            memory: [INITIAL; 2],
            threads: Role::ALL.map(|role| ThreadState::new(self.scenario.program(role))),
            observed: [None; 2],
            violation: None,
        }
    }

    /// Instructions of `role` that may be performed next, in program order.
    pub fn enabled(&self, state: &State, role: Role) -> Vec<usize> {
        (0..self.scenario.program(role).len())
            .filter(|&index| self.is_enabled(state, role, index))
            .collect()
    }

    pub fn is_enabled(&self, state: &State, role: Role, index: usize) -> bool {
        if state.violation.is_some() {
            return false;
        }
        let program = self.scenario.program(role);
        let thread = &state.threads[role.index()];
        let Some(instr) = program.instrs().get(index) else {
            return false;
        };
        if instr.kind().is_none() || thread.performed[index] {
            return false;
        }
        if instr.reads().iter().any(|&reg| thread.reg(reg).is_none()) {
            return false;
        }
        (0..index)
            .filter(|&earlier| !thread.performed[earlier])
            .all(|earlier| self.may_bypass(program, thread, earlier, index))
    }

    /// May `later` be performed while `earlier` (same thread) is still pending?
    fn may_bypass(
        &self,
        program: &Program,
        thread: &ThreadState,
        earlier: usize,
        later: usize,
    ) -> bool {
        let instrs = program.instrs();
        let (a, b) = (instrs[earlier], instrs[later]);
        let (Some(ka), Some(kb)) = (a.kind(), b.kind()) else {
            // Fences are never pending.
            return true;
        };
        if !self.model.may_reorder(ka, kb) {
            return false;
        }
        if let Some(dst) = a.writes() {
            if b.reads().contains(&dst) {
                return false;
            }
        }
        if let (Some(la), Some(lb)) = (a.loc(), b.loc()) {
            if la == lb {
                // Only a load may pass a same-cell store, and only by forwarding
                // the store's value.
                if (ka, kb) != (Kind::Store, Kind::Load) {
                    return false;
                }
                if a.reads().iter().any(|&reg| thread.reg(reg).is_none()) {
                    return false;
                }
            }
        }
        !instrs[earlier + 1..later]
            .iter()
            .any(|instr| matches!(instr, Instr::Fence(fence) if fence.orders(ka, kb)))
    }

    /// Performs instruction `index` of `role`, or returns `None` if it is not enabled.
    pub fn perform(&self, state: &mut State, role: Role, index: usize) -> Option<Step> {
        if !self.is_enabled(state, role, index) {
            return None;
        }
        let program = self.scenario.program(role);
        let instr = program.instrs()[index];
        let thread = &state.threads[role.index()];
        let mut forwarded = false;

        let value = match instr {
            Instr::Load { loc, dst } => {
                let value = match self.pending_store(program, thread, index, loc) {
                    Some(value) => {
                        forwarded = true;
                        value?
                    }
                    None => state.memory[loc.index()],
                };
                state.threads[role.index()].regs[dst.0] = Some(value);
                value
            }
            Instr::Store { loc, lhs, rhs } => {
                let value = thread.reg(lhs)?.saturating_add(thread.reg(rhs)?);
                state.memory[loc.index()] = value;
                value
            }
            Instr::Check { loc, src, bound } => {
                let value = thread.reg(src)?;
                state.observed[loc.index()] = Some(value);
                if value > bound {
                    state.violation = Some(BoundViolation { loc, value, bound });
                }
                value
            }
            Instr::Fence(_) => return None,
        };

        let thread = &mut state.threads[role.index()];
        thread.performed.set(index, true);
        for reg in instr.reads() {
            if program
                .readers(reg)
                .iter()
                .all(|&reader| thread.performed[reader])
            {
                thread.regs[reg.0] = None;
            }
        }

        tracing::trace!("{} #{}: {} = {}", role, index, instr, value);
        Some(Step {
            role,
            index,
            instr,
            value,
            forwarded,
        })
    }

    /// The value a load of `loc` at `index` would forward from the nearest
    /// earlier store to the same cell, if that store is still pending.
    fn pending_store(
        &self,
        program: &Program,
        thread: &ThreadState,
        index: usize,
        loc: Loc,
    ) -> Option<Option<u64>> {
        let (store, lhs, rhs) = program.instrs()[..index]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, instr)| match *instr {
                Instr::Store { loc: l, lhs, rhs } if l == loc => Some((i, lhs, rhs)),
                _ => None,
            })?;
        if thread.performed[store] {
            return None;
        }
        Some(
            thread
                .reg(lhs)
                .zip(thread.reg(rhs))
                .map(|(l, r)| l.saturating_add(r)),
        )
    }

    /// Instructions not yet performed, across all threads.
    pub fn remaining(&self, state: &State) -> usize {
        Role::ALL
            .iter()
            .map(|&role| self.remaining_in(state, role))
            .sum()
    }

    fn remaining_in(&self, state: &State, role: Role) -> usize {
        self.scenario.program(role).performable()
            - state.threads[role.index()].performed.count_ones()
    }

    /// `role` has performed all of its instructions.
    pub fn is_finished(&self, state: &State, role: Role) -> bool {
        self.remaining_in(state, role) == 0
    }

    /// Every thread ran to completion, or the checker halted the execution.
    pub fn is_done(&self, state: &State) -> bool {
        state.violation.is_some() || self.remaining(state) == 0
    }

    pub fn outcome(&self, state: &State) -> Outcome {
        Outcome {
            x: state.memory(Loc::X),
            y: state.memory(Loc::Y),
            observed_x: state.observed(Loc::X),
            observed_y: state.observed(Loc::Y),
            violation: state.violation,
        }
    }
}
