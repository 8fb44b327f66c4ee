use std::io::{self, BufRead, Write};

use crate::backend::Backend;
use crate::config::Config;
use crate::exec;
use crate::options::RuntimeOptions;
use crate::pty;
use crate::util;

const INTRO: &str = "\n Welcome to the vmsh container shell\n Type help to see commands\n Type quit or exit to leave\n";

const HELP: &str = "Commands:
  list                                      list containers
  init <name> [image]                       create a container
  start <name>                              start a container
  stop <name>                               stop a container
  restart <name>                            restart a container
  delete <name>                             stop (best effort) and delete
  shell <name>                              open a shell in a container
  push <name> <file>                        push a file from the local store
  pull <name> <file>                        pull a file into the local store
  proxy add <name> <dev> <listen> <connect> add a TCP proxy device
  proxy remove <name> <dev>                 remove a proxy device
  set <name> <key> <value>                  set a container config key
  reboot                                    reboot the host (asks first)
  dry-run on|off                            print commands instead of running
  debug on|off                              echo commands before running
  help                                      this text
  quit | exit                               leave the shell";

/// Cap on captured output echoed back to the REPL.
const MAX_DISPLAY_CHARS: usize = 16_000;

/// A resolved REPL line. Parsing is pure so dispatch can be tested without
/// spawning anything.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Fire-and-forget backend call with captured output.
    Run(Vec<String>),
    /// Captured backend call that stages through the local file store.
    Transfer(Vec<String>),
    /// Interactive bridged session.
    Session(Vec<String>),
    /// Best-effort stop, then delete regardless of the stop's status.
    StopThenDelete {
        stop: Vec<String>,
        delete: Vec<String>,
    },
    RebootHost,
    SetDryRun(bool),
    SetDebug(bool),
    Help,
    Quit,
    Empty,
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_line(line: &str, backend: &Backend, config: &Config) -> Action {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Action::Empty,
        ["quit"] | ["exit"] => Action::Quit,
        ["help"] => Action::Help,

        ["dry-run", state] if matches!(*state, "on" | "off") => {
            Action::SetDryRun(*state == "on")
        }
        ["dry-run", ..] => Action::Usage("dry-run on|off"),
        ["debug", state] if matches!(*state, "on" | "off") => Action::SetDebug(*state == "on"),
        ["debug", ..] => Action::Usage("debug on|off"),

        ["list"] => Action::Run(backend.list()),
        ["init", name] => Action::Run(backend.init(&config.backend.default_image, name)),
        ["init", name, image] => Action::Run(backend.init(image, name)),
        ["init", ..] => Action::Usage("init <name> [image]"),

        ["start", name] => Action::Run(backend.start(name)),
        ["start", ..] => Action::Usage("start <name>"),
        ["stop", name] => Action::Run(backend.stop(name)),
        ["stop", ..] => Action::Usage("stop <name>"),
        ["restart", name] => Action::Run(backend.restart(name)),
        ["restart", ..] => Action::Usage("restart <name>"),

        ["delete", name] => Action::StopThenDelete {
            stop: backend.stop(name),
            delete: backend.delete(name),
        },
        ["delete", ..] => Action::Usage("delete <name>"),

        ["shell", name] => Action::Session(backend.shell(name)),
        ["shell", ..] => Action::Usage("shell <name>"),

        ["push", name, file] => {
            let local = config.file_store_dir().join(file);
            Action::Transfer(backend.file_push(&local, name, file))
        }
        ["push", ..] => Action::Usage("push <name> <file>"),
        ["pull", name, file] => {
            Action::Transfer(backend.file_pull(name, file, &config.file_store_dir()))
        }
        ["pull", ..] => Action::Usage("pull <name> <file>"),

        ["proxy", "add", name, device, listen, connect] => {
            Action::Run(backend.proxy_add(name, device, listen, connect))
        }
        ["proxy", "remove", name, device] => Action::Run(backend.proxy_remove(name, device)),
        ["proxy", ..] => {
            Action::Usage("proxy add <name> <dev> <listen> <connect> | proxy remove <name> <dev>")
        }

        ["set", name, key, value] => Action::Run(backend.config_set(name, key, value)),
        ["set", ..] => Action::Usage("set <name> <key> <value>"),

        ["reboot"] => Action::RebootHost,

        [verb, ..] => Action::Unknown((*verb).to_string()),
    }
}

/// The REPL proper: prompt, read, resolve, dispatch, loop. Every failure
/// from the execution paths is reported and the loop continues; only exit
/// keywords and EOF end it.
pub fn run(config: &Config, opts: &RuntimeOptions) -> anyhow::Result<()> {
    let backend = Backend::new(&config.backend.binary);
    println!("{INTRO}");

    let stdin = io::stdin();
    let mut out = io::stdout();
    let mut line = String::new();

    loop {
        write!(out, "{}", config.repl.prompt)?;
        out.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let action = parse_line(&line, &backend, config);
        tracing::debug!(?action, "dispatching");
        match dispatch(action, config, opts) {
            Ok(LoopControl::Quit) => break,
            Ok(LoopControl::Continue) => {}
            Err(e) => eprintln!("vmsh: {e:#}"),
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
pub enum LoopControl {
    Continue,
    Quit,
}

fn dispatch(action: Action, config: &Config, opts: &RuntimeOptions) -> anyhow::Result<LoopControl> {
    match action {
        Action::Empty => {}
        Action::Quit => return Ok(LoopControl::Quit),
        Action::Help => println!("{HELP}"),

        Action::SetDryRun(on) => {
            opts.set_dry_run(on);
            println!("dry-run {}", if on { "enabled" } else { "disabled" });
        }
        Action::SetDebug(on) => {
            opts.set_debug(on);
            println!("debug {}", if on { "enabled" } else { "disabled" });
        }

        Action::Run(vector) => {
            let out = exec::run_captured(&vector, opts.dry_run(), opts.debug())?;
            report(&out);
        }
        Action::Transfer(vector) => {
            config.ensure_file_store()?;
            let out = exec::run_captured(&vector, opts.dry_run(), opts.debug())?;
            report(&out);
        }
        Action::StopThenDelete { stop, delete } => {
            // Best effort: the delete runs even when the stop reports a
            // nonzero code (already stopped, never started, ...).
            let stopped = exec::run_captured(&stop, opts.dry_run(), opts.debug())?;
            if !stopped.success() {
                tracing::debug!(code = stopped.code, "stop before delete was nonzero");
            }
            let out = exec::run_captured(&delete, opts.dry_run(), opts.debug())?;
            report(&out);
        }

        Action::Session(vector) => {
            let code = pty::run_interactive(&vector, opts.dry_run())?;
            if code != 0 {
                println!("session exited with status {code}");
            }
        }
        Action::RebootHost => {
            if confirm("Reboot the host? [y/N] ")? {
                let vector = vec!["sudo".to_string(), "reboot".to_string()];
                pty::run_interactive(&vector, opts.dry_run())?;
            } else {
                println!("reboot cancelled");
            }
        }

        Action::Usage(usage) => println!("usage: {usage}"),
        Action::Unknown(verb) => println!("unknown command: {verb} (try help)"),
    }
    Ok(LoopControl::Continue)
}

fn report(out: &exec::CapturedOutput) {
    if !out.stdout.is_empty() {
        println!("{}", util::clip_for_display(out.stdout.trim_end(), MAX_DISPLAY_CHARS));
    }
    if !out.stderr.is_empty() {
        eprintln!("{}", util::clip_for_display(out.stderr.trim_end(), MAX_DISPLAY_CHARS));
    }
    if !out.success() {
        eprintln!("(backend exited with status {})", out.code);
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Backend, Config) {
        (Backend::new("lxc"), Config::default())
    }

    #[test]
    fn resolves_lifecycle_lines_to_captured_runs() {
        let (backend, config) = fixture();
        assert_eq!(
            parse_line("list", &backend, &config),
            Action::Run(vec!["lxc".into(), "list".into()])
        );
        assert_eq!(
            parse_line("start box1", &backend, &config),
            Action::Run(vec!["lxc".into(), "start".into(), "box1".into()])
        );
    }

    #[test]
    fn init_uses_the_default_image_when_omitted() {
        let (backend, config) = fixture();
        assert_eq!(
            parse_line("init box1", &backend, &config),
            Action::Run(vec![
                "lxc".into(),
                "init".into(),
                "ubuntu:22.04".into(),
                "box1".into()
            ])
        );
        assert_eq!(
            parse_line("init box1 alpine:3.20", &backend, &config),
            Action::Run(vec![
                "lxc".into(),
                "init".into(),
                "alpine:3.20".into(),
                "box1".into()
            ])
        );
    }

    #[test]
    fn shell_resolves_to_an_interactive_session() {
        let (backend, config) = fixture();
        match parse_line("shell box1", &backend, &config) {
            Action::Session(vector) => {
                assert_eq!(vector, ["lxc", "exec", "box1", "--", "/bin/bash", "-l"]);
            }
            other => panic!("expected a session, got {other:?}"),
        }
    }

    #[test]
    fn delete_is_a_stop_then_delete_sequence() {
        let (backend, config) = fixture();
        match parse_line("delete box1", &backend, &config) {
            Action::StopThenDelete { stop, delete } => {
                assert_eq!(stop, ["lxc", "stop", "box1"]);
                assert_eq!(delete, ["lxc", "delete", "box1"]);
            }
            other => panic!("expected stop-then-delete, got {other:?}"),
        }
    }

    #[test]
    fn push_stages_through_the_file_store() {
        let (backend, config) = fixture();
        match parse_line("push box1 notes.txt", &backend, &config) {
            Action::Transfer(vector) => {
                assert_eq!(vector[0..3], ["lxc", "file", "push"]);
                assert_eq!(
                    vector[3],
                    config.file_store_dir().join("notes.txt").display().to_string()
                );
                assert_eq!(vector[4], "box1/root/notes.txt");
            }
            other => panic!("expected a transfer, got {other:?}"),
        }
    }

    #[test]
    fn proxy_lines_resolve_to_device_vectors() {
        let (backend, config) = fixture();
        match parse_line(
            "proxy add box1 web tcp:0.0.0.0:8080 tcp:127.0.0.1:80",
            &backend,
            &config,
        ) {
            Action::Run(vector) => {
                assert_eq!(vector[vector.len() - 2], "listen=tcp:0.0.0.0:8080");
                assert_eq!(vector[vector.len() - 1], "connect=tcp:127.0.0.1:80");
            }
            other => panic!("expected a captured run, got {other:?}"),
        }
        assert!(matches!(
            parse_line("proxy remove box1 web", &backend, &config),
            Action::Run(_)
        ));
        assert!(matches!(
            parse_line("proxy frobnicate", &backend, &config),
            Action::Usage(_)
        ));
    }

    #[test]
    fn toggles_exits_and_noise() {
        let (backend, config) = fixture();
        assert_eq!(parse_line("dry-run on", &backend, &config), Action::SetDryRun(true));
        assert_eq!(parse_line("dry-run off", &backend, &config), Action::SetDryRun(false));
        assert_eq!(parse_line("debug on", &backend, &config), Action::SetDebug(true));
        assert_eq!(parse_line("quit", &backend, &config), Action::Quit);
        assert_eq!(parse_line("exit", &backend, &config), Action::Quit);
        assert_eq!(parse_line("   ", &backend, &config), Action::Empty);
        assert_eq!(
            parse_line("frobnicate box1", &backend, &config),
            Action::Unknown("frobnicate".into())
        );
        assert!(matches!(
            parse_line("dry-run maybe", &backend, &config),
            Action::Usage(_)
        ));
    }

    #[test]
    fn missing_arguments_report_usage() {
        let (backend, config) = fixture();
        for line in ["init", "start", "stop", "restart", "delete", "shell", "push x", "pull"] {
            assert!(
                matches!(parse_line(line, &backend, &config), Action::Usage(_)),
                "expected usage for {line:?}"
            );
        }
    }

    #[test]
    fn dispatching_a_dry_toggle_updates_the_gate() {
        let config = Config::default();
        let opts = RuntimeOptions::default();
        let control = dispatch(Action::SetDryRun(true), &config, &opts).unwrap();
        assert_eq!(control, LoopControl::Continue);
        assert!(opts.dry_run());
    }

    #[test]
    fn dispatching_quit_ends_the_loop() {
        let config = Config::default();
        let opts = RuntimeOptions::default();
        assert_eq!(
            dispatch(Action::Quit, &config, &opts).unwrap(),
            LoopControl::Quit
        );
    }
}
