use clap::Parser;

/// The runner takes no arguments; clap still answers `--help` and `--version`
/// and rejects anything else with a usage error.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "polyglot-runner",
    about = "Run an embedded Python greeting inside a scoped guest context",
    version
)]
pub struct Cli {}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
