//! Default configuration values
//!
//! These are embedded in the binary and used when no config file exists.

/// Default configuration as TOML (for reference/documentation)
pub const DEFAULT_CONFIG_TOML: &str = r##"
# mictl configuration

[control]
# Commands allowed in flight at once
window_size = 3
# Out-of-band records kept between two result records
oob_history = 20
# Address commands with --thread/--frame instead of selecting first
use_thread_and_frame_options = false
max_line_length = 16777216

[backend]
program = "gdb"
args = ["--interpreter=mi2", "--nx", "-q"]
# working_dir = "/path/to/project"
capture_stderr = true
exit_timeout_ms = 2000

[trace]
# file = "/tmp/mictl-trace.log"
wrap_width = 100

[logging]
output = "file"
filter = "warn"
"##;
