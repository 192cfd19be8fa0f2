//! Command-line argument parsing for mictl
//!
//! Uses clap for argument parsing with derive macros.

use std::path::PathBuf;

use clap::Parser;
use mictl_engine::AppConfig;

/// mictl - interactive shell over a debugger's machine interface
#[derive(Parser, Debug)]
#[command(name = "mictl", author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file
    ///
    /// Defaults to config.toml in the mictl config directory. Unlike the
    /// default location, a file named here must exist.
    #[arg(long, short = 'c', env = "MICTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debugger executable (overrides backend.program)
    #[arg(long, env = "MICTL_GDB")]
    pub gdb: Option<String>,

    /// Address MI commands with --thread/--frame instead of selecting first
    #[arg(long, default_value_t = false)]
    pub native_targeting: bool,

    /// Append every line exchanged with the debugger to this file
    #[arg(long)]
    pub trace_file: Option<PathBuf>,

    /// Print events and results as JSON, one object per line
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Log verbosely to stderr
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// Extra debugger arguments, e.g. the program to debug
    ///
    /// Example: mictl -- ./a.out
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub backend_args: Vec<String>,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Overlay the flags on a loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(gdb) = &self.gdb {
            config.backend.program = gdb.clone();
        }
        if self.native_targeting {
            config.control.use_thread_and_frame_options = true;
        }
        if let Some(path) = &self.trace_file {
            config.trace.file = Some(path.clone());
        }
        config.backend.args.extend(self.backend_args.iter().cloned());
    }
}
