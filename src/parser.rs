// Slice-based frame parser: works on whatever bytes have arrived so far and
// reports how many it consumed.
use crate::escape::decode_value;
use crate::frame::{Command, Frame};

/// Largest body a frame may declare through `content-length`.
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

/// Which commands the parser accepts on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// Only the verbs a broker sends (CONNECTED, MESSAGE, RECEIPT, ERROR).
    ServerFrames,
    /// Any known command.
    AnyCommand,
}

/// Outcome of a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// An empty line where a command was expected.
    Heartbeat { consumed: usize },
    /// A complete frame.
    Frame { frame: Frame, consumed: usize },
}

type ParseResult = Result<Option<Parsed>, String>;

/// Find the next LF at or after `from` and return the line without its
/// terminator (and without a trailing CR), plus the index just past the LF.
fn next_line(input: &[u8], from: usize) -> Option<(&[u8], usize)> {
    let rel = input[from..].iter().position(|&b| b == b'\n')?;
    let mut line = &input[from..from + rel];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }
    Some((line, from + rel + 1))
}

fn decode_header_part(raw: &[u8], escaped: bool, what: &str) -> Result<String, String> {
    let bytes = if escaped {
        decode_value(raw).map_err(|e| format!("invalid escape in header {}: {}", what, e))?
    } else {
        raw.to_vec()
    };
    String::from_utf8(bytes).map_err(|e| format!("invalid utf8 in header {}: {}", what, e))
}

/// Parse one item (heartbeat or frame) from the front of `input`.
///
/// Returns `Ok(None)` when more bytes are needed; nothing is consumed in that
/// case. Returns `Err` on a protocol violation, after which the stream
/// position can no longer be trusted.
pub fn parse_frame_slice(input: &[u8], accept: Accept) -> ParseResult {
    let Some((cmd_line, mut pos)) = next_line(input, 0) else {
        return Ok(None);
    };

    if cmd_line.is_empty() {
        return Ok(Some(Parsed::Heartbeat { consumed: pos }));
    }

    let cmd_str = std::str::from_utf8(cmd_line)
        .map_err(|e| format!("invalid utf8 in command: {}", e))?;
    let command: Command = cmd_str.parse()?;
    if accept == Accept::ServerFrames && !command.is_server_command() {
        return Err(format!("unexpected command from server: {}", command));
    }

    let escaped = command.escapes_headers();
    let mut frame = Frame::new(command);
    loop {
        let Some((line, next)) = next_line(input, pos) else {
            return Ok(None);
        };
        pos = next;
        if line.is_empty() {
            break;
        }
        let colon = match line.iter().position(|&b| b == b':') {
            Some(0) => return Err("header line with empty key".to_string()),
            Some(i) => i,
            None => {
                return Err(format!(
                    "malformed header line: {:?}",
                    String::from_utf8_lossy(line)
                ));
            }
        };
        let key = decode_header_part(&line[..colon], escaped, "key")?;
        let value = decode_header_part(&line[colon + 1..], escaped, "value")?;
        frame.headers.push((key, value));
    }

    match frame.content_length().filter(|n| *n > 0) {
        Some(n) => {
            if n > MAX_CONTENT_LENGTH {
                return Err(format!(
                    "content-length {} exceeds limit of {} bytes",
                    n, MAX_CONTENT_LENGTH
                ));
            }
            // body plus the NUL terminator
            let end = pos
                .checked_add(n)
                .and_then(|e| e.checked_add(1))
                .ok_or_else(|| "content-length too large".to_string())?;
            if input.len() < end {
                return Ok(None);
            }
            if input[pos + n] != 0 {
                return Err("declared length does not match framing".to_string());
            }
            frame.body = input[pos..pos + n].to_vec();
            Ok(Some(Parsed::Frame {
                frame,
                consumed: pos + n + 1,
            }))
        }
        None => match input[pos..].iter().position(|&b| b == 0) {
            Some(nul_rel) => {
                frame.body = input[pos..pos + nul_rel].to_vec();
                Ok(Some(Parsed::Frame {
                    frame,
                    consumed: pos + nul_rel + 1,
                }))
            }
            None => Ok(None),
        },
    }
}
