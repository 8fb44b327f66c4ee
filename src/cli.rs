use clap::{Parser, Subcommand};
use clap_complete::Shell as ClapShell;

#[derive(Parser)]
#[command(
    name = "vmsh",
    version = env!("VMSH_BUILD_VERSION"),
    long_version = env!("VMSH_BUILD_LONG_VERSION"),
    about = "Interactive shell for managing system containers"
)]
pub struct Cli {
    /// Print backend command lines instead of executing them
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Echo backend command lines before executing them
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Override the container backend binary (default: from config, `lxc`)
    #[arg(long)]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive container shell (the default)
    Shell,

    /// Run a single backend subcommand and print its output
    Exec {
        /// Arguments passed through to the backend binary
        #[arg(trailing_var_arg = true, required = true)]
        args: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: ClapShell,
    },
}
