//! The wire codec: `|`-separated fields, one packet per `\n`-terminated line.
//!
//! The codec is stateless. [`decode`] consumes as many complete lines as a
//! buffer holds and hands back the unframed remainder; [`encode`] renders
//! fields back into a line. Decoding never fails: a malformed line simply
//! produces a packet whose tag is not one the server knows.
//!
//! ```text
//! "move|up\n"        → RawPacket [Text("move"), Text("up")]
//! "pos|3|-1|7\n"     → RawPacket [Text("pos"), Number(3), Number(-1), Number(7)]
//! ```

use std::fmt;

use crate::text::escape_text;

/// Separator between the fields of one packet.
pub const FIELD_SEPARATOR: char = '|';

/// Terminator of one packet.
pub const PACKET_TERMINATOR: u8 = b'\n';

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A numeric field. Keeps the literal it was parsed from so that
/// re-encoding a decoded packet reproduces the original bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    literal: String,
    value: f64,
}

impl Number {
    /// Parses `s` if it matches `-?\d+(\.\d+)?`.
    pub fn parse(s: &str) -> Option<Self> {
        if !is_numeric(s) {
            return None;
        }
        let value = s.parse::<f64>().ok()?;
        Some(Self {
            literal: s.to_string(),
            value,
        })
    }

    /// The numeric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The literal text this number was read from (or rendered as).
    pub fn as_literal(&self) -> &str {
        &self.literal
    }
}

/// One field of a packet: either a number or a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Matched `-?\d+(\.\d+)?`.
    Number(Number),
    /// Anything else.
    Text(String),
}

impl Field {
    /// Builds a text field. The text is escaped when encoded, not here.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Classifies a raw token the way the decoder does.
    pub fn sniff(token: &str) -> Self {
        match Number::parse(token) {
            Some(n) => Self::Number(n),
            None => Self::Text(token.to_string()),
        }
    }

    /// The field's textual form, whether numeric or not.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Number(n) => n.as_literal(),
            Self::Text(s) => s,
        }
    }

    /// Returns the string if this is a text field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    /// Returns the value if this is a numeric field.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.value()),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! field_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Field {
                fn from(v: $ty) -> Self {
                    Self::Number(Number {
                        literal: v.to_string(),
                        value: v as f64,
                    })
                }
            }
        )*
    };
}

field_from_integer!(u16, u32, u64, usize, i32, i64);

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Matches `-?\d+(\.\d+)?` without pulling in a regex engine.
fn is_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.is_none_or(all_digits)
}

// ---------------------------------------------------------------------------
// RawPacket
// ---------------------------------------------------------------------------

/// A decoded line before it is matched against the packet schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPacket {
    /// All fields, tag included.
    pub fields: Vec<Field>,
}

impl RawPacket {
    /// The type tag (first field). Empty for an empty line.
    pub fn tag(&self) -> &str {
        self.fields.first().map(Field::as_str).unwrap_or("")
    }

    /// Fields after the tag.
    pub fn args(&self) -> &[Field] {
        self.fields.get(1..).unwrap_or(&[])
    }

    /// Returns the `i`-th argument (0 = first after the tag).
    pub fn arg(&self, i: usize) -> Option<&Field> {
        self.args().get(i)
    }
}

// ---------------------------------------------------------------------------
// encode / decode
// ---------------------------------------------------------------------------

/// Encodes fields into one `\n`-terminated line.
///
/// Text fields are escaped: `|` and anything outside printable ASCII is
/// dropped, so a field can never split or terminate the packet.
pub fn encode(fields: &[Field]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(&mut out, fields);
    out
}

/// Appends one encoded line to `out`. Used to build multi-packet batches.
pub fn encode_into(out: &mut Vec<u8>, fields: &[Field]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR as u8);
        }
        match field {
            Field::Number(n) => out.extend_from_slice(n.as_literal().as_bytes()),
            Field::Text(s) => out.extend_from_slice(escape_text(s).as_bytes()),
        }
    }
    out.push(PACKET_TERMINATOR);
}

/// Decodes a single line (without its terminator).
///
/// A trailing `\r` is ignored. Invalid UTF-8 is replaced rather than
/// rejected; the replacement characters fail text validation later.
pub fn decode_line(line: &[u8]) -> RawPacket {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = String::from_utf8_lossy(line);
    RawPacket {
        fields: line.split(FIELD_SEPARATOR).map(Field::sniff).collect(),
    }
}

/// Decodes every complete line in `buffer`.
///
/// Returns the packets in arrival order plus the bytes after the last
/// terminator, which the caller keeps for the next read.
pub fn decode(buffer: &[u8]) -> (Vec<RawPacket>, &[u8]) {
    let mut packets = Vec::new();
    let mut rest = buffer;
    while let Some(pos) = rest.iter().position(|b| *b == PACKET_TERMINATOR) {
        packets.push(decode_line(&rest[..pos]));
        rest = &rest[pos + 1..];
    }
    (packets, rest)
}
