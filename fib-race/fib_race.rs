use fib_race::fixture::{check, updater_a, updater_b, Cells, Loom};
use fib_race::fibonacci_bound;
use loom::sync::Arc;
use loom::thread;

// loom enumerates every interleaving of all three threads, which is only
// tractable for a couple of rounds.
const ITERATIONS: usize = 2;
const PREEMPTIONS: usize = 2;

fn main() {
    let bound = fibonacci_bound(ITERATIONS);
    let mut builder = loom::model::Builder::new();
    builder.preemption_bound = Some(PREEMPTIONS);
    builder.check(move || {
        let cells = Arc::new(Cells::<Loom>::new());
        let cells1 = cells.clone();
        let cells2 = cells.clone();
        let cells3 = cells.clone();
        let jh1 = thread::spawn(move || updater_a(&cells1, ITERATIONS));
        let jh2 = thread::spawn(move || updater_b(&cells2, ITERATIONS));
        let jh3 = thread::spawn(move || check(&cells3, bound));
        jh1.join().unwrap();
        jh2.join().unwrap();
        let observed = jh3.join().unwrap();
        let (x, y) = cells.snapshot();
        assert!(observed.is_ok(), "{:?}", observed);
        assert!(x <= bound && y <= bound, "x = {}, y = {}", x, y);
    });
    println!(
        "loom: {} iterations per updater, bound {}, at most {} preemptions: no violation",
        ITERATIONS, bound, PREEMPTIONS
    );
}
