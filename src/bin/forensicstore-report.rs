use clap::Parser;
use forensicstore_plugins::plugins::report::{self, ReportCli};
use std::process::ExitCode;

fn main() -> ExitCode {
    report::run_report_cli(ReportCli::parse())
}
