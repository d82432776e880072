use clap::Parser;
use tracing::error;

use uni::cli::Cli;
use uni::runner::TrainingRunner;
use uni::{logging, Result};

fn main() {
    let cli = Cli::parse();
    logging::init();

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<()> {
    let mut runner = TrainingRunner::new(cli.options())?;
    runner.run(cli.mode)
}
