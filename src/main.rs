mod bisectlog;
mod cli;
mod commands;
mod config;
mod error;
mod exec;
mod hostrefs;
mod oracle;
mod pool;
mod select;
mod signal;
mod ssh;
mod sshconfig;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Command, SignalAction};
use config::DissectConfig;
use error::{Error, Result};
use exec::SshRunner;
use oracle::{GitOracle, Oracle, Verdict};

/// Everything a round needs: the oracle, the connection pool behind the
/// runner, the configured host list, and the repo metadata directory.
struct Context {
    oracle: GitOracle,
    runner: SshRunner,
    hosts: Vec<String>,
    git_dir: PathBuf,
}

/// Builds the context, runs the command, and releases connections on every
/// path, error paths included.
fn drive(f: impl FnOnce(&mut Context) -> Result<()>) -> Result<()> {
    let oracle = GitOracle::discover()?;
    let config = DissectConfig::load()?;
    let hosts: Vec<String> = config.hosts().map(str::to_string).collect();
    if config.is_empty() {
        tracing::warn!(
            "no hosts configured; add [dissect \"<host>\"] sections with a path to the repo config"
        );
    }
    let git_dir = oracle.git_dir().to_path_buf();
    let mut context = Context {
        oracle,
        runner: SshRunner::new(config),
        hosts,
        git_dir,
    };
    let result = f(&mut context);
    context.runner.close();
    result
}

/// Runs one subcommand and returns the process exit code.
fn run_command(command: Command) -> Result<i32> {
    match command {
        Command::Fetch => {
            drive(|ctx| commands::fetch::run(&mut ctx.runner, &ctx.hosts))?;
        }
        Command::Checkout => {
            drive(|ctx| {
                commands::checkout::run(&ctx.oracle, &mut ctx.runner, &ctx.hosts, &ctx.git_dir)
            })?;
        }
        Command::Execute { cmd } => {
            drive(|ctx| {
                commands::execute::run(&mut ctx.runner, &ctx.hosts, &cmd).map(|_| ())
            })?;
        }
        Command::Collect { cmd } => {
            drive(|ctx| {
                commands::collect::run(&ctx.oracle, &mut ctx.runner, &ctx.git_dir, &cmd)
            })?;
        }
        Command::Step { cmd } => {
            drive(|ctx| {
                commands::step::run(&ctx.oracle, &mut ctx.runner, &ctx.hosts, &ctx.git_dir, &cmd)
            })?;
        }
        Command::Run { cmd } => {
            drive(|ctx| {
                commands::run::run(&ctx.oracle, &mut ctx.runner, &ctx.hosts, &ctx.git_dir, &cmd)
            })?;
        }
        Command::Signal { action } => {
            let oracle = GitOracle::discover()?;
            let path = signal::socket_path(oracle.git_dir());
            match action {
                SignalAction::Wait => return Ok(i32::from(signal::wait(&path)?)),
                SignalAction::Good => signal::send(&path, Verdict::Good)?,
                SignalAction::Bad => signal::send(&path, Verdict::Bad)?,
            }
        }
    }
    Ok(0)
}

fn main() {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(cli.log_level())
        .init();

    match run_command(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(Error::Done) => {
            // Terminal condition: the current bad tip is the answer.
            match GitOracle::discover().and_then(|oracle| oracle.tip_bad()) {
                Ok(bad) => println!("{bad} is the first bad commit"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
