//! An interleaving simulator for the fixture.
//!
//! Each thread becomes a straight-line [`Program`] of loads, stores, fences and
//! checks. A [`Machine`] performs one instruction at a time, letting a thread
//! run ahead of its own program order as far as the [`MemoryModel`] and the
//! fences allow. [`explore`] walks every reachable state, with the checker
//! interleaved or detached (see [`CheckerMode`]); [`replay`] drives a
//! single schedule.

mod explore;
mod machine;
mod policy;
mod program;

pub use explore::explore;
pub use explore::replay;
pub use explore::CheckerMode;
pub use explore::Choice;
pub use explore::Execution;
pub use explore::Report;
pub use machine::Machine;
pub use machine::Outcome;
pub use machine::State;
pub use machine::Step;
pub use policy::MemoryModel;
pub use program::FenceKind;
pub use program::Fences;
pub use program::Instr;
pub use program::Kind;
pub use program::Program;
pub use program::Reg;
pub use program::Role;
pub use program::Scenario;
