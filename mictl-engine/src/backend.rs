//! Debugger backend process
//!
//! Spawns the backend with piped stdio and runs an [`MiControl`] over it.
//! A watcher task owns the child: when the process exits, the control is
//! shut down so nothing waits on a dead backend.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use mictl_protocol::gdb_exit;
use mictl_utils::{MictlError, Result};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::control::{BackendStreams, MiControl};
use crate::run_state::{RunState, ThreadStateTracker};
use crate::trace::MiTrace;

pub struct DebuggerSession {
    control: Arc<MiControl>,
    tracker: Arc<ThreadStateTracker>,
    exit_timeout: Duration,
    watcher: JoinHandle<Option<ExitStatus>>,
    kill: Option<oneshot::Sender<()>>,
}

impl DebuggerSession {
    /// Spawn the configured backend and start the engine over its streams
    pub fn launch(config: &AppConfig) -> Result<Self> {
        let backend = &config.backend;

        let mut command = Command::new(&backend.program);
        command
            .args(&backend.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if backend.capture_stderr {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .kill_on_drop(true);
        if let Some(dir) = &backend.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| MictlError::ProcessSpawn {
            program: backend.program.clone(),
            source: e,
        })?;
        info!(program = %backend.program, pid = ?child.id(), "Debugger backend started");

        let stdin = child.stdin.take().ok_or(MictlError::MissingStream("stdin"))?;
        let stdout = child.stdout.take().ok_or(MictlError::MissingStream("stdout"))?;
        let mut streams = BackendStreams::new(stdout, stdin);
        if let Some(stderr) = child.stderr.take() {
            streams = streams.with_errors(stderr);
        }

        let trace = MiTrace::from_config(&config.trace)?;
        let control = Arc::new(MiControl::start_with_trace(streams, &config.control, trace));

        let tracker = Arc::new(ThreadStateTracker::new());
        control.add_event_listener(tracker.clone());
        control.set_run_state(Some(Arc::clone(&tracker) as Arc<dyn RunState>));

        let (kill_tx, kill_rx) = oneshot::channel();
        let watcher = tokio::spawn(watch(child, Arc::clone(&control), kill_rx));

        Ok(Self {
            control,
            tracker,
            exit_timeout: Duration::from_millis(backend.exit_timeout_ms),
            watcher,
            kill: Some(kill_tx),
        })
    }

    pub fn control(&self) -> &Arc<MiControl> {
        &self.control
    }

    /// Thread run state fed from the session's events
    pub fn tracker(&self) -> &Arc<ThreadStateTracker> {
        &self.tracker
    }

    /// Ask the backend to exit, killing it if it has not gone within the
    /// configured grace period
    ///
    /// Returns the exit status when the process could be reaped.
    pub async fn terminate(mut self) -> Option<ExitStatus> {
        let deadline = Instant::now() + self.exit_timeout;

        if self.control.is_active() {
            match timeout_at(deadline, self.control.execute(gdb_exit())).await {
                Ok(Ok(_)) => debug!("Backend acknowledged exit"),
                Ok(Err(e)) => debug!(error = %e, "Exit command failed"),
                Err(_) => warn!("Backend did not answer the exit command"),
            }
        }

        let status = match timeout_at(deadline, &mut self.watcher).await {
            Ok(joined) => joined.ok().flatten(),
            Err(_) => {
                warn!("Backend still running, killing it");
                if let Some(kill) = self.kill.take() {
                    let _ = kill.send(());
                }
                (&mut self.watcher).await.ok().flatten()
            }
        };

        self.control.shutdown();
        self.control.closed().await;
        info!(status = ?status, "Debugger backend terminated");
        status
    }
}

/// Wait for the child to exit, or kill it on request, then shut the control down
async fn watch(
    mut child: Child,
    control: Arc<MiControl>,
    kill: oneshot::Receiver<()>,
) -> Option<ExitStatus> {
    let status = tokio::select! {
        status = child.wait() => status,
        // Also taken when the session is dropped
        _ = kill => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill debugger backend");
            }
            child.wait().await
        }
    };

    control.shutdown();
    match status {
        Ok(status) => {
            debug!(%status, "Debugger backend exited");
            Some(status)
        }
        Err(e) => {
            warn!(error = %e, "Failed to wait for debugger backend");
            None
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::listener::{EventListener, MiEvent};
    use mictl_protocol::gdb_version;
    use parking_lot::Mutex;

    /// A shell loop answering every tokenized command with `^done`
    const ECHO_BACKEND: &str = r#"while read line; do
  echo "${line%%-*}^done"
  case "$line" in *-gdb-exit) exit 0;; esac
done"#;

    fn shell_config(script: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.backend.program = "sh".into();
        config.backend.args = vec!["-c".into(), script.into()];
        config.backend.exit_timeout_ms = 5000;
        config
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<MiEvent>>);

    impl EventListener for Collect {
        fn event_received(&self, event: &MiEvent) {
            self.0.lock().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_launch_missing_program() {
        let mut config = AppConfig::default();
        config.backend.program = "/nonexistent/mictl-test-backend".into();

        let result = DebuggerSession::launch(&config);
        assert!(matches!(result, Err(MictlError::ProcessSpawn { .. })));
    }

    #[tokio::test]
    async fn test_execute_and_terminate() {
        let session = DebuggerSession::launch(&shell_config(ECHO_BACKEND)).unwrap();

        let info = session.control().execute(gdb_version()).await.unwrap();
        assert!(!info.is_error());

        let control = Arc::clone(session.control());
        let status = session.terminate().await;
        assert!(status.map(|s| s.success()).unwrap_or(false));
        assert!(!control.is_active());
    }

    #[tokio::test]
    async fn test_backend_exit_shuts_control_down() {
        let session = DebuggerSession::launch(&shell_config("exit 3")).unwrap();
        let control = Arc::clone(session.control());

        control.closed().await;
        assert!(!control.is_active());

        let status = session.terminate().await;
        assert_eq!(status.and_then(|s| s.code()), Some(3));
    }

    #[tokio::test]
    async fn test_stderr_becomes_console_event() {
        let script = format!("echo 'warning: no symbols' >&2\n{}", ECHO_BACKEND);
        let session = DebuggerSession::launch(&shell_config(&script)).unwrap();
        let events = Arc::new(Collect::default());
        session.control().add_event_listener(events.clone());

        session.terminate().await;

        let events = events.0.lock();
        let texts: Vec<&str> = events
            .iter()
            .filter_map(|e| e.oob())
            .filter_map(|r| r.as_stream())
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(texts, vec!["warning: no symbols\n"]);
    }
}
