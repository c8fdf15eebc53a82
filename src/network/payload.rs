//! Command payload building
//!
//! Turns user supplied command text into the exact bytes that go on the wire.
//! Text is never UTF-8 encoded: every UTF-16 code unit becomes a single byte
//! (latin1 style), so values 0x80-0xFF survive unchanged.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Line terminator appended to every outgoing command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Terminator {
    #[default]
    #[serde(alias = "")]
    None,
    #[serde(alias = "\n")]
    Lf,
    #[value(name = "crlf")]
    #[serde(alias = "\r\n")]
    CrLf,
    #[serde(alias = "\r")]
    Cr,
    #[serde(alias = "\0")]
    Nul,
    #[value(name = "lfcr")]
    #[serde(alias = "\n\r")]
    LfCr,
}

impl Terminator {
    /// All terminators in the order they are offered to the user
    pub fn all() -> [Terminator; 6] {
        [
            Terminator::None,
            Terminator::Lf,
            Terminator::CrLf,
            Terminator::Cr,
            Terminator::Nul,
            Terminator::LfCr,
        ]
    }

    /// Raw bytes appended to the command
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Terminator::None => b"",
            Terminator::Lf => b"\n",
            Terminator::CrLf => b"\r\n",
            Terminator::Cr => b"\r",
            Terminator::Nul => b"\0",
            Terminator::LfCr => b"\n\r",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Terminator::None => "None",
            Terminator::Lf => "LF - \\n (Common UNIX/Mac)",
            Terminator::CrLf => "CRLF - \\r\\n (Common Windows)",
            Terminator::Cr => "CR - \\r (1970's RS232 terminal)",
            Terminator::Nul => "NULL - \\x00 (Can happen)",
            Terminator::LfCr => "LFCR - \\n\\r (Just stupid)",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Terminator::None => "none",
            Terminator::Lf => "lf",
            Terminator::CrLf => "crlf",
            Terminator::Cr => "cr",
            Terminator::Nul => "nul",
            Terminator::LfCr => "lfcr",
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Terminator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // raw terminator bytes, as stored by the action form
            "" | "none" => Ok(Terminator::None),
            "lf" | "\\n" | "\n" => Ok(Terminator::Lf),
            "crlf" | "\\r\\n" | "\r\n" => Ok(Terminator::CrLf),
            "cr" | "\\r" | "\r" => Ok(Terminator::Cr),
            "nul" | "null" | "\\x00" | "\0" => Ok(Terminator::Nul),
            "lfcr" | "\\n\\r" | "\n\r" => Ok(Terminator::LfCr),
            other => Err(format!("unknown terminator '{}'", other)),
        }
    }
}

fn hex_value(unit: u16) -> Option<u16> {
    char::from_u32(unit as u32)
        .and_then(|c| c.to_digit(16))
        .map(|d| d as u16)
}

fn hex_run(units: &[u16]) -> Option<u16> {
    units
        .iter()
        .try_fold(0u16, |acc, &u| hex_value(u).map(|d| (acc << 4) | d))
}

/// Expand `%hh` and `%uhhhh` escapes into UTF-16 code units.
///
/// A `%` that does not start a complete escape is kept as is.
fn unescape_units(text: &str) -> Vec<u16> {
    let input: Vec<u16> = text.encode_utf16().collect();
    let mut out = Vec::with_capacity(input.len());
    let percent = b'%' as u16;
    let u_lower = b'u' as u16;
    let mut i = 0;

    while i < input.len() {
        let unit = input[i];
        if unit == percent {
            if input.get(i + 1) == Some(&u_lower) && i + 6 <= input.len() {
                if let Some(value) = hex_run(&input[i + 2..i + 6]) {
                    out.push(value);
                    i += 6;
                    continue;
                }
            }
            if i + 3 <= input.len() {
                if let Some(value) = hex_run(&input[i + 1..i + 3]) {
                    out.push(value);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(unit);
        i += 1;
    }

    out
}

/// Expand `%hh` / `%uhhhh` escapes in `text`
pub fn unescape(text: &str) -> String {
    String::from_utf16_lossy(&unescape_units(text))
}

/// Encode text one byte per UTF-16 code unit, keeping only the low 8 bits
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.encode_utf16().map(|unit| (unit & 0xFF) as u8).collect()
}

/// Decode a stream of hex digits.
///
/// Decoding stops at the first character that is not a hex digit. If the
/// valid run has an odd length it is left-padded with a single `0`.
///
/// Padding applies to the valid run, not the whole input, so `"41 42"`
/// decodes to `[0x41]`. The price is that an even-length input with a bad
/// digit in an odd position decodes differently from a pair-wise decoder
/// padded up front: `"123g45"` gives `[0x01, 0x23]` here, not `[0x12]`.
pub fn decode_hex(text: &str) -> Vec<u8> {
    let digits: Vec<u8> = text
        .chars()
        .map_while(|c| c.to_digit(16))
        .map(|d| d as u8)
        .collect();

    let mut padded = Vec::with_capacity(digits.len() + 1);
    if digits.len() % 2 == 1 {
        padded.push(0);
    }
    padded.extend_from_slice(&digits);

    padded
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect()
}

/// Build the wire bytes for a literal command.
///
/// Returns `None` when the unescaped command is empty; nothing is sent then.
pub fn build_literal(text: &str, end: Terminator) -> Option<Vec<u8>> {
    let units = unescape_units(text);
    if units.is_empty() {
        return None;
    }

    let mut buf: Vec<u8> = units.iter().map(|unit| (unit & 0xFF) as u8).collect();
    buf.extend_from_slice(end.as_bytes());
    Some(buf)
}

/// Build the wire bytes for a hex encoded command.
///
/// Returns `None` when nothing could be decoded.
pub fn build_hex(text: &str, end: Terminator) -> Option<Vec<u8>> {
    let mut buf = decode_hex(text);
    if buf.is_empty() {
        return None;
    }

    buf.extend_from_slice(end.as_bytes());
    Some(buf)
}

/// Format bytes as lowercase hex without separators
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode bytes one char per byte, the inverse of [`encode_latin1`]
pub fn decode_latin1(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_escapes_with_lf() {
        let buf = build_literal("%41%42", Terminator::Lf).unwrap();
        assert_eq!(buf, vec![0x41, 0x42, 0x0A]);
    }

    #[test]
    fn test_literal_keeps_high_bytes() {
        let buf = build_literal("%FF%80abc", Terminator::None).unwrap();
        assert_eq!(buf, vec![0xFF, 0x80, b'a', b'b', b'c']);

        // A literal non-ASCII character is one byte, not a UTF-8 sequence
        let buf = build_literal("é", Terminator::None).unwrap();
        assert_eq!(buf, vec![0xE9]);
    }

    #[test]
    fn test_literal_unicode_escape() {
        assert_eq!(unescape("%u0041%u00e9"), "Aé");
        let buf = build_literal("%u01FF", Terminator::None).unwrap();
        assert_eq!(buf, vec![0xFF]);
    }

    #[test]
    fn test_incomplete_escape_kept() {
        assert_eq!(unescape("100%"), "100%");
        assert_eq!(unescape("%zz"), "%zz");
        assert_eq!(unescape("%4"), "%4");
        assert_eq!(unescape("%u12"), "%u12");
    }

    #[test]
    fn test_literal_terminators() {
        for end in Terminator::all() {
            let buf = build_literal("PWR", end).unwrap();
            assert_eq!(&buf[..3], b"PWR");
            assert_eq!(&buf[3..], end.as_bytes());
        }
    }

    #[test]
    fn test_empty_literal_suppressed() {
        assert!(build_literal("", Terminator::CrLf).is_none());
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(decode_hex("0a0B ff"), vec![0x0A, 0x0B]);
        assert_eq!(decode_hex("abc"), vec![0x0A, 0xBC]);
        assert_eq!(decode_hex("xyz"), Vec::<u8>::new());
    }

    #[test]
    fn test_hex_stops_at_space() {
        let buf = build_hex("41 42", Terminator::Lf).unwrap();
        assert_eq!(buf, vec![0x41, 0x0A]);
    }

    #[test]
    fn test_hex_pads_valid_run_only() {
        assert_eq!(decode_hex("123g45"), vec![0x01, 0x23]);
        assert_eq!(decode_hex("41 42"), vec![0x41]);
        assert_eq!(decode_hex("abc"), vec![0x0a, 0xbc]);
    }

    #[test]
    fn test_empty_hex_suppressed() {
        assert!(build_hex("", Terminator::Lf).is_none());
        assert!(build_hex("zz", Terminator::Nul).is_none());
    }

    #[test]
    fn test_terminator_from_str() {
        assert_eq!("crlf".parse::<Terminator>().unwrap(), Terminator::CrLf);
        assert_eq!("".parse::<Terminator>().unwrap(), Terminator::None);
        assert_eq!("NULL".parse::<Terminator>().unwrap(), Terminator::Nul);
        assert!("tab".parse::<Terminator>().is_err());
    }

    #[test]
    fn test_terminator_from_raw_bytes() {
        assert_eq!("\n".parse::<Terminator>().unwrap(), Terminator::Lf);
        assert_eq!("\r\n".parse::<Terminator>().unwrap(), Terminator::CrLf);
        assert_eq!("\r".parse::<Terminator>().unwrap(), Terminator::Cr);
        assert_eq!("\0".parse::<Terminator>().unwrap(), Terminator::Nul);
        assert_eq!("\n\r".parse::<Terminator>().unwrap(), Terminator::LfCr);

        let end: Terminator = serde_json::from_str(r#""\r\n""#).unwrap();
        assert_eq!(end, Terminator::CrLf);
        let end: Terminator = serde_json::from_str(r#""\u0000""#).unwrap();
        assert_eq!(end, Terminator::Nul);
        let end: Terminator = serde_json::from_str(r#""lfcr""#).unwrap();
        assert_eq!(end, Terminator::LfCr);
    }

    #[test]
    fn test_latin1_round_trip() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        assert_eq!(encode_latin1(&decode_latin1(&bytes)), bytes);
        assert_eq!(to_hex(&[0x00, 0xAB, 0x10]), "00ab10");
    }
}
