//! Listing wire format
//!
//! One line per entry, streamed by the device during a remote walk:
//!
//! ```text
//! <kind>,<depth>,<quoted-path>,<modTime>,<size>
//! ```
//!
//! The path field is a quoted string literal with backslash escaping so that
//! paths containing commas or quotes survive field splitting. Decoding scans
//! the literal to its closing quote instead of splitting the whole line on
//! commas. The decoder understands escape sequences only; it never evaluates
//! device output.

use crate::error::{Result, SyncError};
use crate::walk::{EntryKind, FileEntry};

/// Encode one entry as a listing line.
pub fn encode_entry(entry: &FileEntry) -> String {
    let kind = match entry.kind {
        EntryKind::Directory => 'D',
        EntryKind::File => 'F',
    };
    format!(
        "{},{},{},{},{}",
        kind,
        entry.depth,
        quote(&entry.path),
        format_mtime(entry.mtime),
        entry.size
    )
}

/// Decode one listing line into an entry.
pub fn decode_entry(line: &str) -> Result<FileEntry> {
    let err = |reason: &str| SyncError::parse(line, reason);

    let (kind_field, rest) = line.split_once(',').ok_or_else(|| err("missing fields"))?;
    let kind = match kind_field {
        "D" => EntryKind::Directory,
        "F" => EntryKind::File,
        _ => return Err(err("kind must be D or F")),
    };

    let (depth_field, rest) = rest.split_once(',').ok_or_else(|| err("missing fields"))?;
    let depth: u32 = depth_field
        .parse()
        .map_err(|_| err("depth is not a non-negative integer"))?;

    let (path, consumed) = unquote(rest).map_err(|reason| err(&reason))?;
    let rest = &rest[consumed..];
    let rest = rest
        .strip_prefix(',')
        .ok_or_else(|| err("expected comma after path literal"))?;

    let (mtime_field, size_field) = rest.split_once(',').ok_or_else(|| err("missing fields"))?;
    if size_field.contains(',') {
        return Err(err("too many fields"));
    }
    let mtime: f64 = mtime_field
        .parse()
        .map_err(|_| err("mtime is not a decimal number"))?;
    let size: u64 = size_field
        .parse()
        .map_err(|_| err("size is not a non-negative integer"))?;

    Ok(FileEntry {
        kind,
        depth,
        path,
        mtime,
        size,
    })
}

fn format_mtime(mtime: f64) -> String {
    if mtime.fract() == 0.0 && mtime.abs() < 9.0e15 {
        format!("{}", mtime as i64)
    } else {
        format!("{}", mtime)
    }
}

/// Encode a string as a double-quoted literal with backslash escaping.
///
/// Also valid as a MicroPython string literal, so it doubles as the encoder
/// for binding script arguments on the device side.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Decode a quoted literal at the start of `s`.
///
/// Accepts both `'` and `"` delimiters since MicroPython's `repr()` prefers
/// single quotes. Returns the decoded string and the number of input bytes
/// consumed, including the closing quote.
pub fn unquote(s: &str) -> std::result::Result<(String, usize), String> {
    let mut chars = s.char_indices();
    let delim = match chars.next() {
        Some((_, c @ ('"' | '\''))) => c,
        _ => return Err("path is not a quoted literal".into()),
    };

    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c == delim => return Ok((out, i + c.len_utf8())),
            '\\' => {
                let (_, esc) = chars.next().ok_or("unterminated escape")?;
                match esc {
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    '0' => out.push('\0'),
                    'x' => {
                        let hi = chars.next().ok_or("truncated \\x escape")?.1;
                        let lo = chars.next().ok_or("truncated \\x escape")?.1;
                        let byte = u8::from_str_radix(&format!("{}{}", hi, lo), 16)
                            .map_err(|_| "invalid \\x escape".to_string())?;
                        out.push(byte as char);
                    }
                    other => return Err(format!("unsupported escape \\{}", other)),
                }
            }
            c => out.push(c),
        }
    }
    Err("unterminated string literal".into())
}

/// Encode raw bytes as a MicroPython bytes literal (`b"..."`).
///
/// Used to ship upload chunks through `exec` without any binary framing.
pub fn bytes_literal(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() + 3);
    out.push_str("b\"");
    for &b in data {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push('"');
    out
}
