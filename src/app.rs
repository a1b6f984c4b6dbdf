use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;

use crate::cli::{parse_issue_number, Cli};
use crate::config::load_config;
use crate::lock::{IssueLock, LockError};
use crate::logger::{sanitize_log_value, Logger};
use crate::mirror;
use crate::notifier::DesktopNotifier;
use crate::session::{spawn_editor, spawn_watcher, EditSession};
use crate::tracker::{project_base_url, TrackerClient};

const DEFAULT_CONFIG_REL: &str = ".config/workon-issue/config.yml";
const STATE_DIR_REL: &str = ".config/workon-issue";

#[derive(Debug)]
pub(crate) struct Quit {
    pub(crate) code: i32,
    #[allow(dead_code)]
    pub(crate) reason: String,
}

impl Quit {
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code as u8)
    }
}

pub(crate) fn quit(logger: &Logger, reason: &str, code: i32) -> Quit {
    let sanitized = if reason.trim().is_empty() {
        "unknown".to_string()
    } else {
        sanitize_log_value(reason)
    };
    logger.log_transition(&format!("quit reason={}", sanitized));
    Quit {
        code,
        reason: reason.to_string(),
    }
}

fn home_dir() -> Result<PathBuf, String> {
    env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| "Missing HOME environment variable".to_string())
}

pub(crate) fn run_with_cli(cli: Cli) -> Result<(), Quit> {
    // Argument validation comes first; a bad ticket number must not touch
    // the lock directory or the network.
    let issue_number = parse_issue_number(&cli.issue).map_err(|message| {
        eprintln!("{}", message);
        Quit {
            code: 1,
            reason: "bad_issue_number".to_string(),
        }
    })?;

    let home = home_dir().map_err(|message| {
        eprintln!("{}", message);
        Quit {
            code: 1,
            reason: message,
        }
    })?;

    let config_path = cli
        .config
        .unwrap_or_else(|| home.join(DEFAULT_CONFIG_REL));
    let loaded = load_config(&config_path).map_err(|message| {
        eprintln!("{}", message);
        Quit {
            code: 1,
            reason: format!("config:{}", config_path.display()),
        }
    })?;
    let config = loaded.config;

    let logger = Arc::new(Logger::new(config.log_path.clone().map(PathBuf::from)));

    let state_dir = home.join(STATE_DIR_REL);
    let _lock = IssueLock::acquire(&state_dir.join("locks"), issue_number).map_err(|err| {
        eprintln!("{}", err);
        let reason = match err {
            LockError::AlreadyLocked(_) => "already_locked".to_string(),
            LockError::Io(_) => "lock_io".to_string(),
        };
        quit(&logger, &reason, 1)
    })?;
    logger.log_transition(&format!("lock acquired issue={}", issue_number));

    let base_url = project_base_url(&config.gitlab.url, &config.gitlab.repo);
    let client = TrackerClient::new(base_url, config.gitlab.token.clone());
    let issue = client.fetch(issue_number).map_err(|err| {
        eprintln!("Failed to fetch issue {}: {}", issue_number, err);
        quit(&logger, &format!("fetch:{}", err), 1)
    })?;
    logger.log_transition(&format!("fetch ok issue={} id={}", issue.iid, issue.id));

    let issues_dir = state_dir.join("issues");
    std::fs::create_dir_all(&issues_dir).map_err(|err| {
        eprintln!("Failed to create {}: {}", issues_dir.display(), err);
        quit(&logger, "issues_dir", 1)
    })?;
    let mirror_path = issues_dir.join(format!("{}.org", issue_number));
    mirror::write(&mirror_path, &issue.description).map_err(|err| {
        eprintln!("Failed to write {}: {}", mirror_path.display(), err);
        quit(&logger, "mirror_write", 1)
    })?;
    logger.log_transition(&format!("mirror written issue={}", issue_number));

    // Watch before the editor opens so the very first save is never missed.
    let session = EditSession {
        client,
        issue,
        mirror_path: mirror_path.clone(),
        notifier: Arc::new(DesktopNotifier),
        logger: Arc::clone(&logger),
    };
    spawn_watcher(session).map_err(|err| {
        eprintln!("Failed to watch {}: {}", mirror_path.display(), err);
        quit(&logger, "watch_setup", 1)
    })?;
    spawn_editor(&config.editor, &mirror_path);
    logger.log_transition(&format!("session start issue={}", issue_number));

    // The editor and watch threads are never joined; the session runs until
    // the process is told to stop. The interrupt handler wakes this thread
    // so the shutdown gets logged and the lock dies with us.
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let handler_tx = shutdown_tx.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = handler_tx.send(());
    }) {
        eprintln!("Failed to set interrupt handler: {}", err);
    }
    let _ = shutdown_rx.recv();
    drop(shutdown_tx);
    Err(quit(&logger, "interrupted", 130))
}

pub(crate) fn run_with_args(args: Vec<OsString>) -> Result<(), Quit> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // clap's `Error::print()` uses termcolor and can bypass Rust's test
            // output capturing. Rendering it ourselves keeps CLI errors
            // capture-friendly.
            eprintln!("{err}");
            return Err(Quit {
                code: err.exit_code(),
                reason: "cli_parse".to_string(),
            });
        }
    };
    run_with_cli(cli)
}

pub(crate) fn main_with_args(args: Vec<OsString>) -> ExitCode {
    match run_with_args(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(quit) => quit.exit_code(),
    }
}

pub(crate) fn main() -> ExitCode {
    main_with_args(env::args_os().collect())
}
