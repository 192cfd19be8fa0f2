//! Shell input parsing
//!
//! A line starting with `-` is an MI command, `!text` is written to the
//! debugger verbatim and anything else goes through its console.

use mictl_protocol::{CliCommand, MiCommandLine, RawCommand};

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Mi(MiCommandLine),
    Raw(RawCommand),
    Console(CliCommand),
    Quit,
    Empty,
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return Input::Empty;
    }
    if trimmed == "quit" || trimmed == "q" {
        return Input::Quit;
    }
    if let Some(raw) = line.strip_prefix('!') {
        return Input::Raw(RawCommand::new(raw));
    }
    if trimmed.starts_with('-') {
        return Input::Mi(MiCommandLine::parse(trimmed));
    }
    Input::Console(CliCommand::new(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mi_command() {
        let input = parse_input("-break-insert main\n");
        assert_eq!(input, Input::Mi(MiCommandLine::parse("-break-insert main")));
        if let Input::Mi(cmd) = input {
            assert_eq!(cmd.operation(), "-break-insert");
        }
    }

    #[test]
    fn test_parse_raw_keeps_text_verbatim() {
        assert_eq!(parse_input("! y "), Input::Raw(RawCommand::new(" y ")));
    }

    #[test]
    fn test_parse_console_command() {
        assert_eq!(
            parse_input("  info threads  "),
            Input::Console(CliCommand::new("info threads"))
        );
    }

    #[test]
    fn test_parse_quit_and_empty() {
        assert_eq!(parse_input("quit"), Input::Quit);
        assert_eq!(parse_input(" q "), Input::Quit);
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(parse_input("\r\n"), Input::Empty);
    }
}
