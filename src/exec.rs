use std::io;
use std::process::Command;

use crate::error::{Error, Result};
use crate::pty;

/// Output of a captured backend invocation. Non-zero exit codes live here as
/// data; callers decide whether they matter.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run `command` to completion with stdout and stderr captured, never
/// touching terminal attributes.
///
/// With `dry_run` the command line is printed and nothing is spawned; with
/// `debug` the line is echoed to stderr before a real execution.
pub fn run_captured(command: &[String], dry_run: bool, debug: bool) -> Result<CapturedOutput> {
    let line = command.join(" ");
    if dry_run {
        println!("dry-run: {line}");
        return Ok(CapturedOutput::default());
    }
    if debug {
        eprintln!("+ {line}");
    }

    let (program, args) = command.split_first().ok_or_else(|| {
        Error::spawn_failed(
            command,
            io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        )
    })?;

    tracing::debug!(command = %line, "running captured");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| Error::spawn_failed(command, source))?;

    Ok(CapturedOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: pty::exit_code_of(output.status),
    })
}
