//! The fixture as straight-line instruction sequences, one per thread.

use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;

use crate::fixture::Loc;

/// The three threads of the fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    UpdaterA,
    UpdaterB,
    Checker,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::UpdaterA, Role::UpdaterB, Role::Checker];

    pub fn index(self) -> usize {
        match self {
            Role::UpdaterA => 0,
            Role::UpdaterB => 1,
            Role::Checker => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::UpdaterA => f.pad("updater A"),
            Role::UpdaterB => f.pad("updater B"),
            Role::Checker => f.pad("checker"),
        }
    }
}

/// A thread-local register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reg(pub usize);

/// Barrier strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FenceKind {
    /// `lwsync`: orders every pair of memory accesses except a store followed by a load.
    Lightweight,
    /// `isync`: like `Lightweight`, but also holds back later non-memory
    /// instructions (the checks).
    Sync,
}

/// Where the fences go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Fences {
    /// Lightweight fences in the updaters, a sync fence in the checker.
    AsWritten,
    /// Sync fences everywhere.
    Strong,
    /// No fences at all.
    Removed,
}

impl Fences {
    fn updater(self) -> Option<FenceKind> {
        match self {
            Fences::AsWritten => Some(FenceKind::Lightweight),
            Fences::Strong => Some(FenceKind::Sync),
            Fences::Removed => None,
        }
    }

    fn checker(self) -> Option<FenceKind> {
        match self {
            Fences::AsWritten | Fences::Strong => Some(FenceKind::Sync),
            Fences::Removed => None,
        }
    }
}

impl fmt::Display for Fences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fences::AsWritten => write!(f, "as-written"),
            Fences::Strong => write!(f, "strong"),
            Fences::Removed => write!(f, "removed"),
        }
    }
}

/// What an instruction does to memory, as far as reordering is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Load,
    Store,
    /// Touches registers only.
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instr {
    /// `dst <- loc`
    Load { loc: Loc, dst: Reg },
    /// `loc <- lhs + rhs`
    Store {
        loc: Loc,
        lhs: Reg,
        rhs: Reg,
    },
    Fence(FenceKind),
    /// Halts the execution if `src > bound`; `src` was read from `loc`.
    Check {
        loc: Loc,
        src: Reg,
        bound: u64,
    },
}

impl Instr {
    /// `None` for fences, which constrain others but are never performed.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Instr::Load { .. } => Some(Kind::Load),
            Instr::Store { .. } => Some(Kind::Store),
            Instr::Check { .. } => Some(Kind::Local),
            Instr::Fence(_) => None,
        }
    }

    /// The cell this instruction accesses, if any.
    pub fn loc(&self) -> Option<Loc> {
        match *self {
            Instr::Load { loc, .. } | Instr::Store { loc, .. } => Some(loc),
            Instr::Fence(_) | Instr::Check { .. } => None,
        }
    }

    pub fn reads(&self) -> Vec<Reg> {
        match *self {
            Instr::Store { lhs, rhs, .. } => vec![lhs, rhs],
            Instr::Check { src, .. } => vec![src],
            Instr::Load { .. } | Instr::Fence(_) => Vec::new(),
        }
    }

    pub fn writes(&self) -> Option<Reg> {
        match *self {
            Instr::Load { dst, .. } => Some(dst),
            _ => None,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Load { loc, dst } => write!(f, "r{} <- {}", dst.0, loc),
            Instr::Store { loc, lhs, rhs } => write!(f, "{} <- r{} + r{}", loc, lhs.0, rhs.0),
            Instr::Fence(FenceKind::Lightweight) => write!(f, "lwsync"),
            Instr::Fence(FenceKind::Sync) => write!(f, "isync"),
            Instr::Check { loc, src, bound } => {
                write!(f, "assert r{} <= {} ({})", src.0, bound, loc)
            }
        }
    }
}

/// One thread's instructions plus, per register, the instructions that read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instrs: Vec<Instr>,
    readers: Vec<Vec<usize>>,
}

impl Program {
    pub fn new(instrs: Vec<Instr>) -> Self {
        let registers = instrs
            .iter()
            .flat_map(|instr| instr.reads().into_iter().chain(instr.writes()))
            .map(|reg| reg.0 + 1)
            .max()
            .unwrap_or(0);
        let mut readers = vec![Vec::new(); registers];
        for (index, instr) in instrs.iter().enumerate() {
            for reg in instr.reads() {
                readers[reg.0].push(index);
            }
        }
        Program { instrs, readers }
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn registers(&self) -> usize {
        self.readers.len()
    }

    /// Instructions that consume `reg`.
    pub fn readers(&self, reg: Reg) -> &[usize] {
        &self.readers[reg.0]
    }

    /// Number of instructions that are actually performed (everything but fences).
    pub fn performable(&self) -> usize {
        self.instrs.iter().filter(|i| i.kind().is_some()).count()
    }
}

/// The three programs of one fixture configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    iterations: usize,
    bound: u64,
    fences: Fences,
    programs: [Program; 3],
}

impl Scenario {
    pub fn new(iterations: usize, bound: u64, fences: Fences) -> Self {
        let programs = [
            updater(Loc::X, iterations, fences.updater()),
            updater(Loc::Y, iterations, fences.updater()),
            checker(bound, fences.checker()),
        ];
        Scenario {
            iterations,
            bound,
            fences,
            programs,
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn bound(&self) -> u64 {
        self.bound
    }

    pub fn fences(&self) -> Fences {
        self.fences
    }

    pub fn program(&self, role: Role) -> &Program {
        &self.programs[role.index()]
    }
}

fn updater(target: Loc, iterations: usize, fence: Option<FenceKind>) -> Program {
    let mut instrs = Vec::new();
    for i in 0..iterations {
        let (rx, ry) = (Reg(2 * i), Reg(2 * i + 1));
        instrs.push(Instr::Load {
            loc: Loc::X,
            dst: rx,
        });
        instrs.extend(fence.map(Instr::Fence));
        instrs.push(Instr::Load {
            loc: Loc::Y,
            dst: ry,
        });
        instrs.extend(fence.map(Instr::Fence));
        instrs.push(Instr::Store {
            loc: target,
            lhs: rx,
            rhs: ry,
        });
    }
    Program::new(instrs)
}

fn checker(bound: u64, fence: Option<FenceKind>) -> Program {
    let (rx, ry) = (Reg(0), Reg(1));
    let mut instrs = vec![
        Instr::Load {
            loc: Loc::X,
            dst: rx,
        },
        Instr::Check {
            loc: Loc::X,
            src: rx,
            bound,
        },
    ];
    instrs.extend(fence.map(Instr::Fence));
    instrs.push(Instr::Load {
        loc: Loc::Y,
        dst: ry,
    });
    instrs.push(Instr::Check {
        loc: Loc::Y,
        src: ry,
        bound,
    });
    // Trailing fence: nothing follows it, so it orders nothing.
    instrs.extend(fence.map(Instr::Fence));
    Program::new(instrs)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn updater_iteration_layout() {
        let scenario = Scenario::new(2, 144, Fences::AsWritten);
        let a = scenario.program(Role::UpdaterA);
        assert_eq!(a.len(), 10);
        assert_eq!(a.performable(), 6);
        assert_eq!(a.registers(), 4);
        assert_eq!(
            &a.instrs()[5..],
            &[
                Instr::Load {
                    loc: Loc::X,
                    dst: Reg(2),
                },
                Instr::Fence(FenceKind::Lightweight),
                Instr::Load {
                    loc: Loc::Y,
                    dst: Reg(3),
                },
                Instr::Fence(FenceKind::Lightweight),
                Instr::Store {
                    loc: Loc::X,
                    lhs: Reg(2),
                    rhs: Reg(3),
                },
            ]
        );
        assert_eq!(a.readers(Reg(3)), &[9]);
    }

    #[test]
    fn fence_placement() {
        let strong = Scenario::new(1, 144, Fences::Strong);
        assert!(strong
            .program(Role::UpdaterB)
            .instrs()
            .contains(&Instr::Fence(FenceKind::Sync)));

        let removed = Scenario::new(1, 144, Fences::Removed);
        for role in Role::ALL {
            assert!(removed
                .program(role)
                .instrs()
                .iter()
                .all(|instr| instr.kind().is_some()));
        }
        assert_eq!(removed.program(Role::Checker).len(), 4);

        let as_written = Scenario::new(1, 144, Fences::AsWritten);
        let checker = as_written.program(Role::Checker);
        assert_eq!(checker.len(), 6);
        assert_eq!(checker.performable(), 4);
        assert_eq!(checker.instrs()[2], Instr::Fence(FenceKind::Sync));
        assert_eq!(checker.instrs()[5], Instr::Fence(FenceKind::Sync));
    }

    #[test]
    fn roles_honor_width() {
        assert_eq!(format!("{:>9}", Role::Checker), "  checker");
        assert_eq!(format!("{:<9}|", Role::UpdaterA), "updater A|");
    }

    #[test]
    fn updater_b_writes_y() {
        let scenario = Scenario::new(1, 144, Fences::Removed);
        assert_eq!(
            scenario.program(Role::UpdaterB).instrs()[2].loc(),
            Some(Loc::Y)
        );
    }
}
