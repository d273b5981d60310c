use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use anyhow::anyhow;
use anyhow::Result;
use clap::Args;
use colored::*;
use fib_race::fixture;
use fib_race::fixture::Cells;
use fib_race::fixture::Native;
use fib_race::model::Fences;
use fib_race::model::Outcome;
use fib_race::Config;
use tracing::debug;
use tracing::error;
use tracing::warn;

#[derive(Debug, Args)]
pub struct RunOpts {
    #[command(flatten)]
    config: Config,

    /// How many times to race the three threads.
    #[arg(long, default_value_t = 1000)]
    trials: usize,
}

impl RunOpts {
    /// Races the native fixture. A failed check aborts the process, as the
    /// fixture's assertion would.
    pub fn main(&self) -> Result<bool> {
        self.config.validate()?;
        if self.config.fences != Fences::AsWritten {
            warn!("native runs always use the fixture's own fences");
        }

        let mut tally: BTreeMap<Outcome, usize> = BTreeMap::new();
        for trial in 0..self.trials {
            let outcome = race(self.config.iterations, self.config.bound)?;
            debug!(trial, "{}", outcome);
            if let Some(violation) = outcome.violation {
                error!(trial, "checker assertion failed: {}", violation);
                eprintln!("{}", format!("trial {}: {}", trial, violation).red().bold());
                std::process::abort();
            }
            *tally.entry(outcome).or_default() += 1;
        }

        println!("{} trials, {} distinct outcomes:", self.trials, tally.len());
        for (outcome, count) in &tally {
            println!("  {:>6}  {}", count, outcome);
        }
        Ok(true)
    }
}

/// One run of the fixture: three threads released together by a barrier.
fn race(iterations: usize, bound: u64) -> Result<Outcome> {
    let cells = Arc::new(Cells::<Native>::new());
    let start = Arc::new(Barrier::new(3));

    let a = {
        let (cells, start) = (Arc::clone(&cells), Arc::clone(&start));
        thread::spawn(move || {
            start.wait();
            fixture::updater_a(&cells, iterations)
        })
    };
    let b = {
        let (cells, start) = (Arc::clone(&cells), Arc::clone(&start));
        thread::spawn(move || {
            start.wait();
            fixture::updater_b(&cells, iterations)
        })
    };
    let c = {
        let cells = Arc::clone(&cells);
        thread::spawn(move || {
            start.wait();
            fixture::check(&cells, bound)
        })
    };

    a.join().map_err(|_| anyhow!("updater A panicked"))?;
    b.join().map_err(|_| anyhow!("updater B panicked"))?;
    let checked = c.join().map_err(|_| anyhow!("checker panicked"))?;
    Ok(Outcome::from_run(cells.snapshot(), checked))
}
