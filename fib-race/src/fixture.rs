//! The race itself: two cells, two updaters, one checker.

use std::fmt;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::error::BoundViolation;
use crate::fence;

/// Default number of iterations each updater performs.
pub const DEFAULT_ITERATIONS: usize = 5;

/// The largest value the checker accepts. `BOUND == fib(2 * DEFAULT_ITERATIONS + 2)`.
pub const BOUND: u64 = 144;

/// Both cells start here.
pub const INITIAL: u64 = 1;

/// Beyond this many iterations the cells no longer fit in a `u64`.
pub const MAX_ITERATIONS: usize = 45;

/// The largest value perfectly alternating updaters reach after `iterations`
/// rounds each: `fib(2 * iterations + 2)`. No interleaving does better.
pub fn fibonacci_bound(iterations: usize) -> u64 {
    let (mut a, mut b) = (INITIAL, INITIAL);
    for _ in 0..2 * iterations {
        (a, b) = (b, a.saturating_add(b));
    }
    b
}

/// One of the two shared cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Loc {
    X,
    Y,
}

impl Loc {
    pub const ALL: [Loc; 2] = [Loc::X, Loc::Y];

    pub fn index(self) -> usize {
        match self {
            Loc::X => 0,
            Loc::Y => 1,
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loc::X => write!(f, "x"),
            Loc::Y => write!(f, "y"),
        }
    }
}

/// An atomic cell the fixture can run on.
pub trait SharedCell: Send + Sync + 'static {
    fn new(value: u64) -> Self;
    fn load(&self, order: Ordering) -> u64;
    fn store(&self, value: u64, order: Ordering);
}

/// Where the fixture runs: the atomics it uses and how it emits its two fences.
pub trait Platform: 'static {
    type Cell: SharedCell;

    fn lightweight_fence();
    fn sync_fence();
}

/// Real atomics and real barriers.
#[derive(Debug)]
pub struct Native;

impl SharedCell for std::sync::atomic::AtomicU64 {
    fn new(value: u64) -> Self {
        std::sync::atomic::AtomicU64::new(value)
    }

    fn load(&self, order: Ordering) -> u64 {
        std::sync::atomic::AtomicU64::load(self, order)
    }

    fn store(&self, value: u64, order: Ordering) {
        std::sync::atomic::AtomicU64::store(self, value, order)
    }
}

impl Platform for Native {
    type Cell = std::sync::atomic::AtomicU64;

    fn lightweight_fence() {
        fence::lightweight();
    }

    fn sync_fence() {
        fence::sync();
    }
}

/// loom's atomics, so `loom::model` can explore the fixture.
#[derive(Debug)]
pub struct Loom;

impl SharedCell for loom::sync::atomic::AtomicU64 {
    fn new(value: u64) -> Self {
        loom::sync::atomic::AtomicU64::new(value)
    }

    fn load(&self, order: Ordering) -> u64 {
        loom::sync::atomic::AtomicU64::load(self, order)
    }

    fn store(&self, value: u64, order: Ordering) {
        loom::sync::atomic::AtomicU64::store(self, value, order)
    }
}

impl Platform for Loom {
    type Cell = loom::sync::atomic::AtomicU64;

    // loom has no lwsync; a release fence followed by an acquire fence gives
    // the same C11 guarantees.
    fn lightweight_fence() {
        loom::sync::atomic::fence(Ordering::Release);
        loom::sync::atomic::fence(Ordering::Acquire);
    }

    fn sync_fence() {
        loom::sync::atomic::fence(Ordering::SeqCst);
    }
}

/// The two shared cells.
pub struct Cells<P: Platform> {
    pub x: P::Cell,
    pub y: P::Cell,
}

impl<P: Platform> Cells<P> {
    pub fn new() -> Self {
        Cells {
            x: P::Cell::new(INITIAL),
            y: P::Cell::new(INITIAL),
        }
    }

    pub fn cell(&self, loc: Loc) -> &P::Cell {
        match loc {
            Loc::X => &self.x,
            Loc::Y => &self.y,
        }
    }

    /// Reads both cells. Only meaningful once the updaters have been joined.
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.x.load(Ordering::Acquire),
            self.y.load(Ordering::Acquire),
        )
    }
}

impl<P: Platform> Default for Cells<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> fmt::Debug for Cells<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cells")
            .field("x", &self.x.load(Ordering::Relaxed))
            .field("y", &self.y.load(Ordering::Relaxed))
            .finish()
    }
}

/// What the checker read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Observation {
    pub x: u64,
    pub y: u64,
}

fn update<P: Platform>(cells: &Cells<P>, target: Loc, iterations: usize) {
    for _ in 0..iterations {
        let x = cells.x.load(Ordering::Acquire);
        P::lightweight_fence();
        let y = cells.y.load(Ordering::Acquire);
        P::lightweight_fence();
        cells
            .cell(target)
            .store(x.saturating_add(y), Ordering::Release);
    }
}

/// Updater A: `x <- x + y`, `iterations` times.
pub fn updater_a<P: Platform>(cells: &Cells<P>, iterations: usize) {
    update(cells, Loc::X, iterations)
}

/// Updater B: `y <- x + y`, `iterations` times.
pub fn updater_b<P: Platform>(cells: &Cells<P>, iterations: usize) {
    update(cells, Loc::Y, iterations)
}

/// Reads `x`, then `y` behind the sync fence, failing on the first value above
/// `bound`. A passing check ends with a second sync fence.
pub fn check<P: Platform>(cells: &Cells<P>, bound: u64) -> Result<Observation, BoundViolation> {
    let x = cells.x.load(Ordering::Acquire);
    if x > bound {
        return Err(BoundViolation {
            loc: Loc::X,
            value: x,
            bound,
        });
    }
    P::sync_fence();
    let y = cells.y.load(Ordering::Acquire);
    if y > bound {
        return Err(BoundViolation {
            loc: Loc::Y,
            value: y,
            bound,
        });
    }
    P::sync_fence();
    Ok(Observation { x, y })
}

/// The checker entry point. A violation is a fatal assertion failure.
pub fn checker<P: Platform>(cells: &Cells<P>, bound: u64) {
    if let Err(violation) = check(cells, bound) {
        panic!("{}", violation);
    }
}
