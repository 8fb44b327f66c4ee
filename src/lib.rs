// Library root for vmsh: exposes modules and the shared main entry.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod options;
pub mod pty;
pub mod pump;
pub mod repl;
pub mod term;
pub mod util;

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands};
use config::Config;
use options::RuntimeOptions;

pub fn main_inner() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(binary) = cli.backend {
        config.backend.binary = binary;
    }
    let opts = RuntimeOptions::new(cli.dry_run, cli.debug);

    match cli.command {
        None | Some(Commands::Shell) => repl::run(&config, &opts),
        Some(Commands::Exec { args }) => {
            let mut vector = vec![config.backend.binary.clone()];
            vector.extend(args);
            let out = exec::run_captured(&vector, opts.dry_run(), opts.debug())?;
            if !out.stdout.is_empty() {
                print!("{}", out.stdout);
            }
            if !out.stderr.is_empty() {
                eprint!("{}", out.stderr);
            }
            if !out.success() {
                std::process::exit(out.code);
            }
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "vmsh", &mut std::io::stdout());
            Ok(())
        }
    }
}
