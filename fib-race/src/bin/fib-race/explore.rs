use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use colored::*;
use fib_race::model;
use fib_race::model::CheckerMode;
use fib_race::model::Choice;
use fib_race::model::MemoryModel;
use fib_race::model::Report;
use fib_race::Config;

#[derive(Debug, Args)]
pub struct ExploreOpts {
    #[command(flatten)]
    config: Config,

    /// `interleaved` lists every outcome but only scales to a few iterations;
    /// `detached` explores the updaters alone and checks the bound on every state.
    #[arg(long, value_enum, default_value_t = CheckerMode::Detached)]
    checker: CheckerMode,

    /// Explore under every memory model instead of just `--model`.
    #[arg(long)]
    all_models: bool,

    /// Print reports as JSON.
    #[arg(long)]
    json: bool,

    /// Write the first counterexample as a replayable schedule.
    #[arg(long, value_name = "filepath")]
    save_counterexample: Option<PathBuf>,
}

impl ExploreOpts {
    pub fn main(&self) -> Result<bool> {
        let scenario = self.config.scenario()?;
        let models: Vec<MemoryModel> = if self.all_models {
            MemoryModel::ALL.to_vec()
        } else {
            vec![self.config.model]
        };

        let mut safe = true;
        for memory_model in models {
            let report = model::explore(&scenario, memory_model, self.checker);
            if self.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if let (Some(path), Some(counterexample)) =
                (&self.save_counterexample, &report.counterexample)
            {
                let schedule: Vec<Choice> = counterexample.iter().map(Choice::from).collect();
                fs::write(path, serde_json::to_string_pretty(&schedule)?)
                    .with_context(|| format!("writing counterexample to {}", path.display()))?;
            }
            anyhow::ensure!(
                report.stuck == 0,
                "{} states under {} had no enabled instruction",
                report.stuck,
                report.model
            );
            safe &= report.is_safe();
        }
        Ok(safe)
    }
}

fn print_report(report: &Report) {
    println!(
        "{} (fences {}, checker {}, {} iterations, bound {}): {} states, {} outcomes, max value {}",
        report.model.to_string().bold(),
        report.fences,
        report.checker,
        report.iterations,
        report.bound,
        report.states,
        report.outcomes.len(),
        report.max_value
    );
    if report.stuck > 0 {
        println!("  {}", format!("{} stuck states", report.stuck).yellow());
    }
    for cells in report.final_cells() {
        println!("  final x = {}, y = {}", cells.0, cells.1);
    }
    if let Some(counterexample) = &report.counterexample {
        println!("  {}", "counterexample:".red());
        for step in counterexample {
            println!("    {}", step);
        }
    }
}

#[derive(Debug, Args)]
pub struct ReplayOpts {
    #[command(flatten)]
    config: Config,

    /// JSON list of scheduling choices, as written by `explore --save-counterexample`.
    #[arg(long, value_name = "filepath")]
    schedule: PathBuf,

    /// Print the execution as JSON.
    #[arg(long)]
    json: bool,
}

impl ReplayOpts {
    pub fn main(&self) -> Result<bool> {
        let scenario = self.config.scenario()?;
        let text = fs::read_to_string(&self.schedule)
            .with_context(|| format!("reading schedule {}", self.schedule.display()))?;
        let schedule: Vec<Choice> = serde_json::from_str(&text).context("parsing schedule")?;
        let execution = model::replay(&scenario, self.config.model, &schedule)
            .context("replaying schedule")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&execution)?);
        } else {
            for step in &execution.steps {
                println!("{}", step);
            }
            println!("{}", execution.outcome);
        }
        Ok(execution.outcome.violation.is_none())
    }
}
