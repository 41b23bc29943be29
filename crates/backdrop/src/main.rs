mod check;
mod cli;
mod paths;
mod run;
mod submit;

use std::process::ExitCode;

use anyhow::Result;

fn main() -> Result<ExitCode> {
    let args = cli::parse();
    run::dispatch(args)
}
