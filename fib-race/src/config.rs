//! Fixture configuration shared by the CLI and the simulator.

use clap::Args;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::fixture::BOUND;
use crate::fixture::DEFAULT_ITERATIONS;
use crate::fixture::MAX_ITERATIONS;
use crate::model::Fences;
use crate::model::MemoryModel;
use crate::model::Scenario;

/// Configuration options for a fixture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Args)]
pub struct Config {
    /// Iterations per updater (`NUM`).
    #[arg(
        long,
        short = 'n',
        env = "FIB_RACE_ITERATIONS",
        default_value_t = DEFAULT_ITERATIONS,
        value_name = "NUM"
    )]
    pub iterations: usize,

    /// The largest value the checker accepts.
    #[arg(long, env = "FIB_RACE_BOUND", default_value_t = BOUND, value_name = "uint64")]
    pub bound: u64,

    /// Fence placement. `strong` puts sync fences in the updaters too.
    #[arg(long, value_enum, default_value_t = Fences::AsWritten)]
    pub fences: Fences,

    /// Memory model the simulator runs under.
    #[arg(long, value_enum, default_value_t = MemoryModel::Relaxed)]
    pub model: MemoryModel,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            iterations: DEFAULT_ITERATIONS,
            bound: BOUND,
            fences: Fences::AsWritten,
            model: MemoryModel::Relaxed,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(ConfigError::TooManyIterations {
                iterations: self.iterations,
                max: MAX_ITERATIONS,
            });
        }
        Ok(())
    }

    /// The simulator programs for this configuration.
    pub fn scenario(&self) -> Result<Scenario, ConfigError> {
        self.validate()?;
        Ok(Scenario::new(self.iterations, self.bound, self.fences))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn defaults_match_the_fixture() {
        let cli = Cli::parse_from(["fib-race"]);
        assert_eq!(cli.config.iterations, 5);
        assert_eq!(cli.config.bound, 144);
        assert_eq!(cli.config, Config::default());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from([
            "fib-race", "-n", "6", "--bound", "377", "--fences", "removed", "--model", "sc",
        ]);
        assert_eq!(
            cli.config,
            Config {
                iterations: 6,
                bound: 377,
                fences: Fences::Removed,
                model: MemoryModel::SequentiallyConsistent,
            }
        );
    }

    #[test]
    fn rejects_out_of_range_iterations() {
        let config = Config {
            iterations: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoIterations));

        let config = Config {
            iterations: MAX_ITERATIONS + 1,
            ..Config::default()
        };
        assert!(matches!(
            config.scenario(),
            Err(ConfigError::TooManyIterations { .. })
        ));
        assert_eq!(Config::default().scenario().map(|s| s.iterations()), Ok(5));
    }
}
