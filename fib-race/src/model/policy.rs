//! Which reorderings a memory model allows.

use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;

use super::program::FenceKind;
use super::program::Kind;

/// The relaxation policy the simulator runs under.
///
/// Memory itself is always a single shared store (multi-copy atomic); the
/// models differ only in how far a thread may perform its own instructions
/// out of program order. Accesses carry no ordering of their own here: on
/// Power, acquire and release are exactly the fences the fixture spells out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum MemoryModel {
    /// Program order, one instruction at a time.
    #[value(alias = "sc")]
    SequentiallyConsistent,
    /// A store may be delayed past later loads.
    Tso,
    /// Any two independent instructions may be swapped (Power/ARM-like).
    Relaxed,
}

impl MemoryModel {
    pub const ALL: [MemoryModel; 3] = [
        MemoryModel::SequentiallyConsistent,
        MemoryModel::Tso,
        MemoryModel::Relaxed,
    ];

    /// May an instruction of kind `later` be performed while an earlier one of
    /// kind `earlier` is still pending? Dependencies, same-cell accesses and
    /// fences are checked separately.
    pub fn may_reorder(self, earlier: Kind, later: Kind) -> bool {
        match self {
            MemoryModel::SequentiallyConsistent => false,
            MemoryModel::Tso => matches!(
                (earlier, later),
                (Kind::Store, Kind::Load) | (Kind::Local, _) | (_, Kind::Local)
            ),
            MemoryModel::Relaxed => true,
        }
    }
}

impl fmt::Display for MemoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryModel::SequentiallyConsistent => write!(f, "sc"),
            MemoryModel::Tso => write!(f, "tso"),
            MemoryModel::Relaxed => write!(f, "relaxed"),
        }
    }
}

impl FenceKind {
    /// Does this fence, sitting between an `earlier` and a `later`
    /// instruction, keep them in order?
    pub fn orders(self, earlier: Kind, later: Kind) -> bool {
        if (earlier, later) == (Kind::Store, Kind::Load) {
            return false;
        }
        match self {
            FenceKind::Lightweight => earlier != Kind::Local && later != Kind::Local,
            FenceKind::Sync => true,
        }
    }
}
