use anyhow::Result;
use clap::ArgAction;
use clap::Parser;
use clap::Subcommand;
use colored::*;

mod explore;
mod logging;
mod run;

#[derive(Parser, Debug)]
#[command(version, about = "Race two Fibonacci updaters against a bound checker")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Log more (repeat for more detail). `RUST_LOG` is honored as well.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Race the fixture on OS threads.
    Run(run::RunOpts),
    /// Explore every execution under a memory model.
    Explore(explore::ExploreOpts),
    /// Replay a saved schedule.
    Replay(explore::ReplayOpts),
}

fn main() -> Result<()> {
    let Args { command, verbose } = Args::parse();
    logging::init_stderr_tracing(verbose)?;

    let safe = match command {
        Commands::Run(cmd) => cmd.main()?,
        Commands::Explore(cmd) => cmd.main()?,
        Commands::Replay(cmd) => cmd.main()?,
    };

    if !safe {
        println!("{}", "Bound violation reachable!".red().bold());
        anyhow::bail!("checker assertion can fail")
    } else {
        println!("{}", "Success!".green().bold());
    }

    Ok(())
}
