//! Configuration schema structs

use std::path::PathBuf;

use mictl_protocol::DEFAULT_MAX_LINE_LENGTH;
use mictl_utils::LogConfig;
use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub control: ControlConfig,
    pub backend: BackendConfig,
    pub trace: TraceConfig,
    pub logging: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            backend: BackendConfig::default(),
            trace: TraceConfig::default(),
            logging: LogConfig::cli(),
        }
    }
}

/// Command scheduling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Maximum commands in flight at once (default: 3)
    pub window_size: usize,
    /// Out-of-band records retained between result records (default: 20)
    pub oob_history: usize,
    /// Address commands with `--thread`/`--frame` instead of selecting first
    pub use_thread_and_frame_options: bool,
    /// Longest line accepted from the backend, in bytes (default: 16 MB)
    pub max_line_length: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            oob_history: 20,
            use_thread_and_frame_options: false,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Debugger backend process settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Debugger executable (default: "gdb")
    pub program: String,
    /// Arguments selecting the MI interpreter
    pub args: Vec<String>,
    /// Working directory of the backend process
    pub working_dir: Option<PathBuf>,
    /// Drain the backend's stderr into console events (default: true)
    pub capture_stderr: bool,
    /// Grace period after `-gdb-exit` before the process is killed
    pub exit_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "gdb".into(),
            args: vec!["--interpreter=mi2".into(), "--nx".into(), "-q".into()],
            working_dir: None,
            capture_stderr: true,
            exit_timeout_ms: 2000,
        }
    }
}

/// MI trace settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Append every wire line to this file
    pub file: Option<PathBuf>,
    /// Wrap traced lines at this width (default: 100)
    pub wrap_width: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            file: None,
            wrap_width: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_defaults() {
        let control = ControlConfig::default();
        assert_eq!(control.window_size, 3);
        assert_eq!(control.oob_history, 20);
        assert!(!control.use_thread_and_frame_options);
        assert_eq!(control.max_line_length, 16 * 1024 * 1024);
    }

    #[test]
    fn test_backend_defaults() {
        let backend = BackendConfig::default();
        assert_eq!(backend.program, "gdb");
        assert_eq!(backend.args, vec!["--interpreter=mi2", "--nx", "-q"]);
        assert!(backend.capture_stderr);
        assert_eq!(backend.exit_timeout_ms, 2000);
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [control]
            window_size = 5

            [backend]
            program = "/opt/gdb/bin/gdb"
            "#,
        )
        .unwrap();

        assert_eq!(config.control.window_size, 5);
        assert_eq!(config.control.oob_history, 20);
        assert_eq!(config.backend.program, "/opt/gdb/bin/gdb");
        assert_eq!(config.backend.args.len(), 3);
        assert_eq!(config.trace.wrap_width, 100);
    }

    #[test]
    fn test_trace_file_path() {
        let config: AppConfig = toml::from_str(
            r#"
            [trace]
            file = "/tmp/mi.log"
            "#,
        )
        .unwrap();
        assert_eq!(config.trace.file, Some(PathBuf::from("/tmp/mi.log")));
    }
}
