use clap::Parser;
use forensicstore_plugins::plugins::runkeys::{self, RunkeysCli};
use std::process::ExitCode;

fn main() -> ExitCode {
    runkeys::run_runkeys_cli(RunkeysCli::parse())
}
