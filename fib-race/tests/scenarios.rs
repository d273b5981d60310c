use std::collections::BTreeSet;
use std::collections::HashSet;

use fib_race::model::explore;
use fib_race::model::replay;
use fib_race::model::CheckerMode;
use fib_race::model::Choice;
use fib_race::model::Fences;
use fib_race::model::Instr;
use fib_race::model::Machine;
use fib_race::model::MemoryModel;
use fib_race::model::Outcome;
use fib_race::model::Role;
use fib_race::model::Scenario;
use fib_race::model::State;
use fib_race::BoundViolation;
use fib_race::Loc;
use fib_race::BOUND;
use fib_race::DEFAULT_ITERATIONS;
use fib_race::INITIAL;
use pretty_assertions::assert_eq;

const A: Role = Role::UpdaterA;
const B: Role = Role::UpdaterB;
const C: Role = Role::Checker;
const FENCES: [Fences; 3] = [Fences::AsWritten, Fences::Strong, Fences::Removed];

fn schedule(pattern: &[Role], times: usize) -> Vec<Choice> {
    pattern
        .iter()
        .cycle()
        .take(pattern.len() * times)
        .map(|&role| Choice::from(role))
        .collect()
}

fn lockstep(iterations: usize) -> Vec<Choice> {
    let mut choices = schedule(&[A, A, B, B, A, B], iterations);
    choices.extend(schedule(&[C], 4));
    choices
}

fn alternating(iterations: usize) -> Vec<Choice> {
    let mut choices = schedule(&[A, A, A, B, B, B], iterations);
    choices.extend(schedule(&[C], 4));
    choices
}

fn outcomes(iterations: usize, fences: Fences, model: MemoryModel) -> BTreeSet<Outcome> {
    let scenario = Scenario::new(iterations, BOUND, fences);
    explore(&scenario, model, CheckerMode::Interleaved).outcomes
}

#[test]
fn both_cells_start_at_one() {
    let scenario = Scenario::new(DEFAULT_ITERATIONS, BOUND, Fences::AsWritten);
    for model in MemoryModel::ALL {
        let machine = Machine::new(&scenario, model);
        let state = machine.initial();
        for loc in Loc::ALL {
            assert_eq!(state.memory(loc), INITIAL);
            assert_eq!(state.observed(loc), None);
        }
    }
}

#[test]
fn every_updater_runs_its_cycles() {
    let scenario = Scenario::new(DEFAULT_ITERATIONS, BOUND, Fences::AsWritten);
    let execution = replay(
        &scenario,
        MemoryModel::Relaxed,
        &alternating(DEFAULT_ITERATIONS),
    )
    .expect("completes");
    for role in [A, B] {
        let steps: Vec<_> = execution.steps.iter().filter(|s| s.role == role).collect();
        assert_eq!(steps.len(), 3 * DEFAULT_ITERATIONS);
        let stores = steps
            .iter()
            .filter(|s| matches!(s.instr, Instr::Store { .. }))
            .count();
        assert_eq!(stores, DEFAULT_ITERATIONS);
    }
}

/// Walks every reachable state, checking that each one either lets some
/// thread move or is terminal, and that every finished execution ran all of
/// both updaters' cycles.
struct Walk<'a> {
    machine: Machine<'a>,
    seen: HashSet<State>,
    path: Vec<Role>,
    finished: usize,
}

impl Walk<'_> {
    fn visit(&mut self, state: State) {
        if !self.seen.insert(state.clone()) {
            return;
        }
        if self.machine.is_done(&state) {
            if state.violation().is_none() {
                let iterations = self.machine.scenario().iterations();
                for role in [A, B] {
                    assert!(self.machine.is_finished(&state, role));
                    let steps = self.path.iter().filter(|&&r| r == role).count();
                    assert_eq!(steps, 3 * iterations);
                }
                self.finished += 1;
            }
            return;
        }
        let mut moved = false;
        for role in Role::ALL {
            for index in self.machine.enabled(&state, role) {
                let mut next = state.clone();
                self.machine
                    .perform(&mut next, role, index)
                    .expect("enabled");
                moved = true;
                self.path.push(role);
                self.visit(next);
                self.path.pop();
            }
        }
        assert!(
            moved,
            "stuck with {} remaining",
            self.machine.remaining(&state)
        );
    }
}

#[test]
fn every_execution_completes_its_cycles() {
    for iterations in 1..=2 {
        for fences in FENCES {
            let scenario = Scenario::new(iterations, BOUND, fences);
            for model in MemoryModel::ALL {
                let machine = Machine::new(&scenario, model);
                let mut walk = Walk {
                    machine,
                    seen: HashSet::new(),
                    path: Vec::new(),
                    finished: 0,
                };
                walk.visit(machine.initial());
                assert!(walk.finished > 0);

                let report = explore(&scenario, model, CheckerMode::Interleaved);
                assert_eq!(report.stuck, 0, "{} {}", fences, model);
                assert_eq!(report.states, walk.seen.len());
            }
        }
    }
}

#[test]
fn lockstep_doubles_both_cells() {
    let scenario = Scenario::new(DEFAULT_ITERATIONS, BOUND, Fences::AsWritten);
    let execution = replay(
        &scenario,
        MemoryModel::SequentiallyConsistent,
        &lockstep(DEFAULT_ITERATIONS),
    )
    .expect("completes");
    assert_eq!(
        execution.outcome,
        Outcome {
            x: 32,
            y: 32,
            observed_x: Some(32),
            observed_y: Some(32),
            violation: None,
        }
    );
}

#[test]
fn alternating_reaches_the_bound_exactly() {
    let scenario = Scenario::new(DEFAULT_ITERATIONS, BOUND, Fences::AsWritten);
    for model in MemoryModel::ALL {
        let execution =
            replay(&scenario, model, &alternating(DEFAULT_ITERATIONS)).expect("completes");
        assert_eq!(execution.outcome.final_cells(), (89, 144));
        assert_eq!(execution.outcome.violation, None);
    }
}

#[test]
fn one_more_round_breaks_the_bound_under_every_model() {
    let scenario = Scenario::new(DEFAULT_ITERATIONS + 1, BOUND, Fences::AsWritten);
    let mut choices = schedule(&[A, A, A, B, B, B], DEFAULT_ITERATIONS + 1);
    choices.extend(schedule(&[C], 2));
    for model in MemoryModel::ALL {
        let execution = replay(&scenario, model, &choices).expect("halts");
        assert_eq!(
            execution.outcome.violation,
            Some(BoundViolation {
                loc: Loc::X,
                value: 233,
                bound: BOUND,
            })
        );
    }
}

#[test]
fn bound_holds_under_sequential_consistency() {
    let scenario = Scenario::new(DEFAULT_ITERATIONS, BOUND, Fences::AsWritten);
    let report = explore(
        &scenario,
        MemoryModel::SequentiallyConsistent,
        CheckerMode::Detached,
    );
    assert!(report.is_safe());
    assert_eq!(report.max_value, BOUND);
    assert!(report.final_cells().contains(&(89, 144)));
}

#[test]
fn stale_reads_never_exceed_the_bound() {
    let scenario = Scenario::new(DEFAULT_ITERATIONS, BOUND, Fences::AsWritten);
    let report = explore(&scenario, MemoryModel::Relaxed, CheckerMode::Detached);
    assert!(report.is_safe());
    assert_eq!(report.max_value, BOUND);
}

#[test]
fn sixth_round_counterexample_replays() {
    let scenario = Scenario::new(DEFAULT_ITERATIONS + 1, BOUND, Fences::AsWritten);
    let model = MemoryModel::SequentiallyConsistent;
    let report = explore(&scenario, model, CheckerMode::Detached);
    assert!(!report.is_safe());
    assert!(report.max_value > BOUND);

    let counterexample = report.counterexample.as_ref().expect("violation");
    let choices: Vec<Choice> = counterexample.iter().map(Choice::from).collect();
    let execution = replay(&scenario, model, &choices).expect("replays");
    assert_eq!(&execution.steps, counterexample);
    let violation = execution.outcome.violation.expect("violation");
    assert!(violation.value > BOUND);
    assert!(report.violations().any(|o| *o == execution.outcome));
}

#[test]
fn weak_models_agree_with_sc_on_the_maximum() {
    let scenario = Scenario::new(3, BOUND, Fences::AsWritten);
    let sc = explore(
        &scenario,
        MemoryModel::SequentiallyConsistent,
        CheckerMode::Interleaved,
    );
    for model in [MemoryModel::Tso, MemoryModel::Relaxed] {
        let weak = explore(&scenario, model, CheckerMode::Interleaved);
        assert!(weak.is_safe());
        assert_eq!(weak.max_value, sc.max_value);
        assert_eq!(weak.max_value, 21);
    }
}

#[test]
fn store_buffering_is_weak_only() {
    let sc = outcomes(2, Fences::AsWritten, MemoryModel::SequentiallyConsistent);
    let relaxed = outcomes(2, Fences::AsWritten, MemoryModel::Relaxed);

    assert!(relaxed.contains(&Outcome {
        x: 3,
        y: 3,
        observed_x: Some(1),
        observed_y: Some(1),
        violation: None,
    }));
    assert!(!sc.iter().any(|o| o.final_cells() == (3, 3)));

    let sc_cells: BTreeSet<_> = sc.iter().map(Outcome::final_cells).collect();
    let relaxed_cells: BTreeSet<_> = relaxed.iter().map(Outcome::final_cells).collect();
    let weak_only: Vec<_> = relaxed_cells.difference(&sc_cells).copied().collect();
    assert_eq!(weak_only, vec![(3, 3)]);
}

#[test]
fn strong_updater_fences_change_nothing() {
    for model in MemoryModel::ALL {
        let as_written = outcomes(2, Fences::AsWritten, model);
        let strong = outcomes(2, Fences::Strong, model);
        assert_eq!(as_written, strong, "{}", model);

        let cells: BTreeSet<_> = strong.iter().map(Outcome::final_cells).collect();
        assert!(cells.len() > 1);
    }
}

#[test]
fn removing_fences_only_matters_when_weak() {
    assert_eq!(
        outcomes(2, Fences::AsWritten, MemoryModel::SequentiallyConsistent),
        outcomes(2, Fences::Removed, MemoryModel::SequentiallyConsistent)
    );

    let fenced = outcomes(1, Fences::AsWritten, MemoryModel::Relaxed);
    let unfenced = outcomes(1, Fences::Removed, MemoryModel::Relaxed);
    assert!(fenced.is_subset(&unfenced));
    assert!(fenced.len() < unfenced.len());

    // The checker reads y before x: the final x, but y before updater B stored.
    let reordered = Outcome {
        x: 3,
        y: 2,
        observed_x: Some(3),
        observed_y: Some(1),
        violation: None,
    };
    assert!(unfenced.contains(&reordered));
    assert!(!fenced.contains(&reordered));
    assert!(!outcomes(1, Fences::Removed, MemoryModel::Tso).contains(&reordered));
}
