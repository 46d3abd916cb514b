//! Header value escaping.
//!
//! The wire format reserves four characters inside header keys and values:
//!
//! | char | escaped |
//! |------|---------|
//! | `\`  | `\\`    |
//! | CR   | `\r`    |
//! | LF   | `\n`    |
//! | `:`  | `\c`    |

/// Escape a header key or value for transmission.
pub fn encode_value(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\r' => result.push_str("\\r"),
            '\n' => result.push_str("\\n"),
            ':' => result.push_str("\\c"),
            _ => result.push(ch),
        }
    }
    result
}

/// Reverse [`encode_value`] on raw header bytes.
///
/// Works on bytes rather than `&str` so the caller can report invalid UTF-8
/// separately from a bad escape. Returns an error for an unknown escape
/// sequence or a trailing lone backslash.
pub fn decode_value(input: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(input.len());
    let mut iter = input.iter();
    while let Some(&b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(b'\\') => out.push(b'\\'),
            Some(b'r') => out.push(b'\r'),
            Some(b'n') => out.push(b'\n'),
            Some(b'c') => out.push(b':'),
            Some(&other) => {
                return Err(format!("invalid escape sequence '\\{}'", other as char));
            }
            None => return Err("dangling backslash at end of header".to_string()),
        }
    }
    Ok(out)
}
