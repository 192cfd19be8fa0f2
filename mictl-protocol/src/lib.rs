//! mictl-protocol: Wire format of the debugger machine interface
//!
//! This crate classifies lines printed by the debugger backend into records,
//! frames the byte streams into lines, and defines the boundary commands
//! implement so the engine can transmit them and decode their answers.

pub mod codec;
pub mod command;
pub mod commands;
pub mod cstring;
pub mod parser;
pub mod record;

// Re-export main types at crate root
pub use codec::{CodecError, MiLineCodec, DEFAULT_MAX_LINE_LENGTH};
pub use command::{CommandContext, DecodeError, Framing, MiCommand, MiInfo, WireCommand};
pub use commands::{
    gdb_exit, gdb_version, list_features, stack_select_frame, thread_select, CliCommand,
    FeaturesInfo, ListFeatures, MiCommandLine, RawCommand,
};
pub use parser::{parse_line, parse_results};
pub use record::{
    AsyncKind, MiAsyncRecord, MiOobRecord, MiOutput, MiRecord, MiResult, MiResultRecord,
    MiStreamRecord, MiValue, ResultClass, StreamKind, Token,
};
