use std::borrow::Cow;

/// Returns true for bytes that must never reach stored text or log lines.
///
/// Tab, newline and carriage return are allowed through.
#[inline]
fn is_control(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences.
///
/// Feed titles and summaries are attacker-controlled and end up both in the
/// database and in structured log lines, so escape sequences are removed:
///
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - CSI sequences: `\x1b[` up to a final byte in 0x40-0x7E
/// - OSC sequences: `\x1b]` up to BEL or ST (`\x1b\\`)
/// - a bare ESC
///
/// Returns `Cow::Borrowed` when nothing needs stripping (the common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if !bytes.iter().copied().any(is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    let mut run_start = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if !is_control(b) {
            i += 1;
            continue;
        }

        // Control bytes are ASCII, so `run_start..i` is always on a char boundary.
        out.push_str(&s[run_start..i]);

        i = if b == 0x1b {
            skip_escape(bytes, i)
        } else {
            i + 1
        };
        run_start = i;
    }
    out.push_str(&s[run_start..]);

    Cow::Owned(out)
}

/// Given `bytes[start] == ESC`, returns the index just past the escape sequence.
fn skip_escape(bytes: &[u8], start: usize) -> usize {
    match bytes.get(start + 1) {
        Some(b'[') => {
            let mut i = start + 2;
            while i < bytes.len() {
                let c = bytes[i];
                i += 1;
                if (0x40..=0x7e).contains(&c) {
                    break;
                }
            }
            i
        }
        Some(b']') => {
            let mut i = start + 2;
            while i < bytes.len() {
                if bytes[i] == 0x07 {
                    return i + 1;
                }
                if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                    return i + 2;
                }
                i += 1;
            }
            i
        }
        _ => start + 1,
    }
}

/// Collapses every run of whitespace into a single space and trims the ends.
///
/// Text extracted from markup keeps the source document's indentation and
/// line breaks; summaries are stored as one flowing line.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
