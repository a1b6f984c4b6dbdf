use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::logger::{sanitize_log_value, Logger};
use crate::mirror;
use crate::notifier::Notifier;
use crate::tracker::{Issue, TrackerClient};

/// One editing session on one issue. The issue record is resolved once at
/// setup and never mutated; every save re-reads the mirror file and pushes
/// its current content.
pub(crate) struct EditSession {
    pub(crate) client: TrackerClient,
    pub(crate) issue: Issue,
    pub(crate) mirror_path: PathBuf,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) logger: Arc<Logger>,
}

impl EditSession {
    /// One `Syncing` transition: read the mirror, push it, report. Failures
    /// are contained here; the watch loop keeps running either way.
    pub(crate) fn sync_once(&self) {
        self.logger
            .log_transition(&format!("sync start issue={}", self.issue.iid));
        let result = mirror::read(&self.mirror_path)
            .map_err(|err| err.to_string())
            .and_then(|content| {
                self.client
                    .update(&self.issue, &content)
                    .map_err(|err| err.to_string())
            });
        match result {
            Ok(()) => {
                self.logger
                    .log_transition(&format!("sync ok issue={}", self.issue.iid));
                self.notifier.push(
                    "Updated issue",
                    &format!("Issue {} was updated successfully", self.issue.iid),
                );
            }
            Err(message) => {
                self.logger.log_transition(&format!(
                    "sync failed issue={} error={}",
                    self.issue.iid,
                    sanitize_log_value(&message)
                ));
                self.notifier.push("Failed to update issue", &message);
            }
        }
    }
}

/// Launch the editor on the mirror file, fire and forget. The session does
/// not end when the editor exits; the user may keep saving from a second
/// editor, and the watch loop outlives this child.
pub(crate) fn spawn_editor(editor: &str, mirror_path: &Path) -> thread::JoinHandle<()> {
    let editor = editor.to_string();
    let mirror_path = mirror_path.to_path_buf();
    thread::spawn(move || {
        let mut parts = editor.split_whitespace();
        let Some(program) = parts.next() else {
            // Config validation rejects an empty editor before we get here.
            return;
        };
        let args: Vec<&str> = parts.collect();
        let result = Command::new(program).args(args).arg(&mirror_path).status();
        if let Err(err) = result {
            eprintln!("Failed to open editor: {}", err);
        }
    })
}

/// Register the file watch and start the sync loop on its own thread. Watch
/// registration failure is fatal and reported to the caller; errors after
/// that are per-save and only reach the notification sink.
pub(crate) fn spawn_watcher(session: EditSession) -> Result<thread::JoinHandle<()>, notify::Error> {
    let (event_tx, event_rx) = mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            let _ = event_tx.send(res);
        },
        notify::Config::default(),
    )?;
    watcher.watch(&session.mirror_path, RecursiveMode::NonRecursive)?;

    Ok(thread::spawn(move || {
        // The watcher owns the event sender; parking it here keeps the watch
        // registered for as long as the loop runs.
        let _watcher = watcher;
        for event in event_rx {
            match event {
                Ok(event) if event.kind.is_modify() => session.sync_once(),
                Ok(_) => {}
                Err(err) => {
                    session.logger.log_transition(&format!(
                        "watch error issue={} error={}",
                        session.issue.iid,
                        sanitize_log_value(&err.to_string())
                    ));
                    eprintln!("File watch failed: {}", err);
                    std::process::exit(1);
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::test_support::RecordingNotifier;
    use httpmock::prelude::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn session_with(
        server: &MockServer,
        mirror_path: PathBuf,
        notifier: Arc<RecordingNotifier>,
    ) -> EditSession {
        EditSession {
            client: TrackerClient::new(server.url("/api/v3/projects/1"), "sekrit".to_string()),
            issue: Issue {
                id: 100,
                iid: 42,
                description: "fix bug".to_string(),
            },
            mirror_path,
            notifier,
            logger: Arc::new(Logger::new(None)),
        }
    }

    #[test]
    fn successful_sync_notifies_with_the_ticket_number() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/v3/projects/1/issues/100")
                .query_param("description", "fixed");
            then.status(200);
        });

        let temp = TempDir::new().expect("temp dir");
        let mirror_path = temp.path().join("42.org");
        mirror::write(&mirror_path, "fixed").expect("write mirror");

        let notifier = Arc::new(RecordingNotifier::default());
        let session = session_with(&server, mirror_path, Arc::clone(&notifier));
        session.sync_once();

        mock.assert();
        let pushed = notifier.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "Updated issue");
        assert!(
            pushed[0].1.contains("42"),
            "body should name iid 42, got: {}",
            pushed[0].1
        );
    }

    #[test]
    fn failed_sync_notifies_with_the_error_text() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/api/v3/projects/1/issues/100");
            then.status(500);
        });

        let temp = TempDir::new().expect("temp dir");
        let mirror_path = temp.path().join("42.org");
        mirror::write(&mirror_path, "fixed").expect("write mirror");

        let notifier = Arc::new(RecordingNotifier::default());
        let session = session_with(&server, mirror_path, Arc::clone(&notifier));
        session.sync_once();

        let pushed = notifier.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "Failed to update issue");
        assert!(
            pushed[0].1.contains("HTTP Error: 500"),
            "body should carry the status, got: {}",
            pushed[0].1
        );
    }

    #[test]
    fn unreadable_mirror_is_reported_not_fatal() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT).path("/api/v3/projects/1/issues/100");
            then.status(200);
        });

        let temp = TempDir::new().expect("temp dir");
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session_with(&server, temp.path().join("gone.org"), Arc::clone(&notifier));
        session.sync_once();

        assert_eq!(mock.hits(), 0, "no update should be attempted");
        let pushed = notifier.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "Failed to update issue");
    }

    #[test]
    fn rapid_identical_saves_push_independently() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/v3/projects/1/issues/100")
                .query_param("description", "same each time");
            then.status(200);
        });

        let temp = TempDir::new().expect("temp dir");
        let mirror_path = temp.path().join("42.org");
        mirror::write(&mirror_path, "same each time").expect("write mirror");

        let notifier = Arc::new(RecordingNotifier::default());
        let session = session_with(&server, mirror_path, Arc::clone(&notifier));
        session.sync_once();
        session.sync_once();

        assert_eq!(mock.hits(), 2, "no de-duplication of identical saves");
        assert_eq!(notifier.pushed().len(), 2);
    }

    #[test]
    fn watch_loop_pushes_saved_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/v3/projects/1/issues/100")
                .query_param("description", "fixed");
            then.status(200);
        });

        let temp = TempDir::new().expect("temp dir");
        let mirror_path = temp.path().join("42.org");
        mirror::write(&mirror_path, "fix bug").expect("write mirror");

        let notifier = Arc::new(RecordingNotifier::default());
        let session = session_with(&server, mirror_path.clone(), Arc::clone(&notifier));
        let _handle = spawn_watcher(session).expect("watch setup");

        mirror::write(&mirror_path, "fixed").expect("overwrite mirror");

        // One save can surface as several modify events depending on the
        // platform backend, so wait for at least one push.
        let deadline = Instant::now() + Duration::from_secs(10);
        while mock.hits() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(mock.hits() >= 1, "expected the save to reach the tracker");
    }

    #[test]
    fn watching_a_missing_file_fails_setup() {
        let server = MockServer::start();
        let temp = TempDir::new().expect("temp dir");
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session_with(&server, temp.path().join("gone.org"), notifier);
        assert!(spawn_watcher(session).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn editor_command_is_space_split_with_the_mirror_appended() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("temp dir");
        let mirror_path = temp.path().join("42.org");
        let out_path = temp.path().join("editor.args");
        mirror::write(&mirror_path, "fix bug").expect("write mirror");

        let script = temp.path().join("fake-editor");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", out_path.display()),
        )
        .expect("write fake editor");
        let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod fake editor");

        let editor = format!("{} --wait", script.display());
        let handle = spawn_editor(&editor, &mirror_path);
        handle.join().expect("editor thread");

        let recorded = std::fs::read_to_string(&out_path).expect("editor ran");
        let lines: Vec<&str> = recorded.lines().collect();
        let mirror_arg = mirror_path.display().to_string();
        assert_eq!(lines, vec!["--wait", mirror_arg.as_str()]);
    }
}
