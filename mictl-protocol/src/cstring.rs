//! C-string escaping as used by the MI protocol
//!
//! The backend quotes every string constant and escapes it the way a C
//! compiler would read it back. Octal escapes carry raw bytes, which are
//! usually UTF-8 sequences of non-ASCII text.

/// Map an escape letter to the character it stands for
pub fn parse_special_char(c: char) -> Option<char> {
    match c {
        'a' => Some('\x07'),
        'b' => Some('\x08'),
        'e' | 'E' => Some('\x1b'),
        'f' => Some('\x0c'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'v' => Some('\x0b'),
        '\'' | '"' | '\\' | '?' => Some(c),
        _ => None,
    }
}

/// Map a character to its escape letter, if it has one
pub fn special_char_for(c: char) -> Option<char> {
    match c {
        '\x07' => Some('a'),
        '\x08' => Some('b'),
        '\x1b' => Some('e'),
        '\x0c' => Some('f'),
        '\n' => Some('n'),
        '\r' => Some('r'),
        '\t' => Some('t'),
        '\x0b' => Some('v'),
        '\'' | '"' | '\\' | '?' => Some(c),
        _ => None,
    }
}

fn is_quote_like(c: char) -> bool {
    matches!(c, '\'' | '"' | '\\' | '?')
}

/// Unicode noncharacters are never printable
fn is_noncharacter(c: char) -> bool {
    let cp = c as u32;
    (0xFDD0..=0xFDEF).contains(&cp) || (cp & 0xFFFE) == 0xFFFE
}

fn is_printable(c: char) -> bool {
    !c.is_control() && !is_noncharacter(c)
}

/// Resolve the escapes in the body of a C-string (without the quotes)
///
/// Unknown escapes keep the escaped character. A trailing lone backslash is
/// kept as is.
pub fn unescape(body: &str) -> String {
    let mut bytes: Vec<u8> = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    let mut buf = [0u8; 4];

    while let Some(c) = chars.next() {
        if c != '\\' {
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let Some(next) = chars.next() else {
            bytes.push(b'\\');
            break;
        };

        if let Some(digit) = next.to_digit(8) {
            let mut value = digit;
            for _ in 0..2 {
                match chars.peek().and_then(|d| d.to_digit(8)) {
                    Some(d) => {
                        value = value * 8 + d;
                        chars.next();
                    }
                    None => break,
                }
            }
            bytes.push((value & 0xFF) as u8);
            continue;
        }

        let resolved = parse_special_char(next).unwrap_or(next);
        bytes.extend_from_slice(resolved.encode_utf8(&mut buf).as_bytes());
    }

    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Escape text so the backend reads it back unchanged
///
/// With `escape_quotes` set, `\\`, `'`, `?` and `"` are escaped as well;
/// without it only non-printable characters are.
pub fn escape_string(text: &str, escape_quotes: bool) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        if is_quote_like(c) {
            if escape_quotes {
                out.push('\\');
            }
            out.push(c);
        } else if let Some(letter) = special_char_for(c) {
            out.push('\\');
            out.push(letter);
        } else if c == '\0' {
            out.push_str("\\0");
        } else if is_printable(c) {
            out.push(c);
        } else {
            let cp = c as u32;
            if cp <= 0xFF {
                out.push_str(&format!("\\{:03o}", cp));
            } else if cp <= 0xFFFF {
                out.push_str(&format!("\\u{:04x}", cp));
            } else {
                out.push_str(&format!("\\U{:08x}", cp));
            }
        }
    }

    out
}

/// Render a command parameter, quoting it when the backend would otherwise
/// split or misread it
pub fn quote_parameter(param: &str) -> String {
    let needs_quotes = param.is_empty()
        || param
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\' || !is_printable(c));

    if needs_quotes {
        let mut out = String::with_capacity(param.len() + 2);
        out.push('"');
        for c in param.chars() {
            match c {
                '"' | '\\' => {
                    out.push('\\');
                    out.push(c);
                }
                _ => out.push_str(&escape_string(c.encode_utf8(&mut [0u8; 4]), false)),
            }
        }
        out.push('"');
        out
    } else {
        param.to_string()
    }
}
