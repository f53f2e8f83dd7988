mod cli;

use std::io;
use std::process::ExitCode;

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use polyglot_runner::config::Config;
use polyglot_runner::handlers::default::DefaultHandler;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let _args = cli::Cli::parse();

    let cfg = Config::load();
    init_tracing(&cfg);
    for warning in cfg.warnings() {
        tracing::warn!(path = %cfg.config_path.display(), "{warning}");
    }
    tracing::debug!(path = %cfg.config_path.display(), "configuration loaded");

    match DefaultHandler::run(&cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

// Logs go to stderr; stdout belongs to the guest.
fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_level()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn report(err: &anyhow::Error) {
    if io::stderr().is_terminal() {
        eprintln!("{} {:#}", "error:".red().bold(), err);
    } else {
        eprintln!("error: {:#}", err);
    }
}
