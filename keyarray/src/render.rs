//! Text rendering of key subscripts.
//!
//! Subscripts are joined with commas. A subscript whose bytes are exactly the canonical decimal
//! text of an integer is written bare; anything else (`"05"`, `"+1"`, `" 7"`, `"abc"`) is quoted
//! as a string literal.
use crate::{
    error::{KeyError, KeyResult},
    key::KeyArray,
};

const RENDER: &str = "render key array";

/// Output of [`KeyArray::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Comma-separated subscripts, empty when the depth limit is 0.
    pub text: String,
    /// Name bytes, or `None` when the key has an empty name.
    pub name: Option<Vec<u8>>,
}

pub(crate) fn render(key: &KeyArray, depth: Option<i64>) -> KeyResult<Rendered> {
    let limit = match depth {
        None => key.depth(),
        Some(d) if d >= 0 && d as u64 <= key.depth() as u64 => d as usize,
        Some(d) => {
            return Err(KeyError::RangeError {
                operation: RENDER,
                requested: d,
                depth: key.depth(),
            });
        }
    };

    let mut text = String::new();
    for index in 0..limit {
        if index > 0 {
            text.push(',');
        }
        if let Some(subscript) = key.subscript(index) {
            write_subscript(&mut text, &subscript);
        }
    }

    let name = key.name();
    Ok(Rendered {
        text,
        name: (!name.is_empty()).then(|| name.to_vec()),
    })
}

/// Whether `bytes` is the canonical decimal text of an `i64`.
pub fn is_canonical_integer(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .is_some_and(|n| n.to_string().as_bytes() == bytes)
}

fn write_subscript(out: &mut String, bytes: &[u8]) {
    if is_canonical_integer(bytes) {
        // Canonical integers are ASCII.
        out.extend(bytes.iter().map(|&b| b as char));
    } else {
        write_quoted(out, bytes);
    }
}

/// Append `bytes` as a double-quoted literal.
///
/// Quotes and backslashes are escaped, common control characters use their short escapes and
/// every other non-printable or non-ASCII byte becomes a three digit decimal escape, so that the
/// output reads back to the same bytes.
pub fn write_quoted(out: &mut String, bytes: &[u8]) {
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{b:03}")),
        }
    }
    out.push('"');
}
