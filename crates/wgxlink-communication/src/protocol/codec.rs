//! Machine-mode wire codec
//!
//! Requests are up to four text fragments followed by `\r\n`. Responses
//! start with a fixed 9-byte header, `R<E><LLLLL>\r\n`, where `<E>` is the
//! module's error digit and `<LLLLL>` the payload length in decimal.

use wgxlink_core::{LinkError, RX_HEADER_LEN};

/// First byte of every response header
pub const HEADER_MARKER: u8 = b'R';

/// Line terminator for requests and reply bodies
pub const LINE_END: &[u8] = b"\r\n";

/// Width of a numeric parameter field
pub const NUMBER_FIELD_WIDTH: usize = 7;

/// Largest payload length the 5-digit field can declare
pub const MAX_PAYLOAD_LEN: usize = 99_999;

/// Parsed response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Error digit, 0 on success
    pub code: u8,
    /// Declared payload length
    pub payload_len: usize,
}

impl Header {
    /// Header plus payload
    pub fn total_len(&self) -> usize {
        self.payload_len + RX_HEADER_LEN
    }

    /// Whether the module accepted the command
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// A request to the module
///
/// Holds the command keyword and up to three further fragments, sent back
/// to back with no separator. Keywords carry their own trailing spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    fragments: Vec<String>,
}

impl Command {
    /// Start a request with its command keyword
    pub fn new(cmd0: impl Into<String>) -> Self {
        Self {
            fragments: vec![cmd0.into()],
        }
    }

    /// Append a text fragment
    pub fn arg(mut self, fragment: impl Into<String>) -> Self {
        self.fragments.push(fragment.into());
        self
    }

    /// Append a fragment when present
    pub fn arg_opt(self, fragment: Option<&str>) -> Self {
        match fragment {
            Some(fragment) => self.arg(fragment),
            None => self,
        }
    }

    /// Append a number in the fixed-width numeric layout
    pub fn number(self, value: u16) -> Self {
        self.arg(format_number(value))
    }

    /// Append a module stream handle in the numeric layout
    pub fn handle(self, handle: i8) -> Self {
        self.number(u16::try_from(handle).unwrap_or(0))
    }

    /// Frame the request for a transmit buffer of `buffer_size` bytes
    pub fn encode(&self, buffer_size: usize) -> Result<Vec<u8>, LinkError> {
        encode_fragments(self.fragments.iter().map(String::as_str), buffer_size)
    }

    /// The request text without its line ending, for logs
    pub fn text(&self) -> String {
        self.fragments.concat()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for fragment in &self.fragments {
            f.write_str(fragment)?;
        }
        Ok(())
    }
}

/// Frame `cmd0 cmd1 param0 param1` followed by `\r\n`.
///
/// The fragments' running length must stay below `buffer_size - 2`, which
/// leaves room for the line ending.
pub fn encode(
    buffer_size: usize,
    cmd0: &str,
    cmd1: Option<&str>,
    param0: Option<&str>,
    param1: Option<&str>,
) -> Result<Vec<u8>, LinkError> {
    let fragments = std::iter::once(cmd0).chain(cmd1).chain(param0).chain(param1);
    encode_fragments(fragments, buffer_size)
}

fn encode_fragments<'a>(
    fragments: impl IntoIterator<Item = &'a str>,
    buffer_size: usize,
) -> Result<Vec<u8>, LinkError> {
    let limit = buffer_size.saturating_sub(LINE_END.len());
    let mut bytes = Vec::with_capacity(buffer_size);

    for fragment in fragments {
        if bytes.len() + fragment.len() >= limit {
            return Err(LinkError::Framing {
                reason: format!(
                    "command exceeds {} byte buffer at fragment {:?}",
                    buffer_size, fragment
                ),
            });
        }
        bytes.extend_from_slice(fragment.as_bytes());
    }

    bytes.extend_from_slice(LINE_END);
    Ok(bytes)
}

/// Parse the 9-byte response header at the start of `bytes`
pub fn decode_header(bytes: &[u8]) -> Result<Header, LinkError> {
    if bytes.len() < RX_HEADER_LEN {
        return Err(LinkError::Protocol {
            reason: format!("short header: {} bytes", bytes.len()),
        });
    }

    if bytes[0] != HEADER_MARKER {
        return Err(LinkError::Protocol {
            reason: format!("bad header marker 0x{:02x}", bytes[0]),
        });
    }

    let code = bytes[1];
    if !code.is_ascii_digit() {
        return Err(LinkError::Protocol {
            reason: format!("bad error digit 0x{:02x}", code),
        });
    }

    let digits = &bytes[2..7];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(LinkError::Protocol {
            reason: format!(
                "bad length field {:?}",
                String::from_utf8_lossy(digits)
            ),
        });
    }

    let payload_len = digits
        .iter()
        .fold(0usize, |acc, d| acc * 10 + usize::from(d - b'0'));

    Ok(Header {
        code: code - b'0',
        payload_len,
    })
}

/// Build a response header; values beyond the field widths are clamped
pub fn encode_header(code: u8, payload_len: usize) -> [u8; RX_HEADER_LEN] {
    let text = format!(
        "R{}{:05}\r\n",
        code.min(9),
        payload_len.min(MAX_PAYLOAD_LEN)
    );
    let mut header = [0u8; RX_HEADER_LEN];
    header.copy_from_slice(text.as_bytes());
    header
}

/// Render a number right-aligned and space-padded in a 7-character field
pub fn format_number(value: u16) -> String {
    format!("{:>width$}", value, width = NUMBER_FIELD_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_joins_fragments() {
        let bytes = encode(64, "set ", Some("sy c b"), Some(" 1"), None).unwrap();
        assert_eq!(bytes, b"set sy c b 1\r\n".to_vec());
    }

    #[test]
    fn test_encode_length_limit() {
        // 8 byte buffer leaves room for 5 bytes of text
        assert!(encode(8, "abcde", None, None, None).is_ok());
        let err = encode(8, "abc", Some("def"), None, None).unwrap_err();
        assert!(matches!(err, LinkError::Framing { .. }));
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::new("read ").handle(3).number(64);
        assert_eq!(cmd.text(), "read       3     64");
        assert_eq!(cmd.to_string(), cmd.text());
        assert_eq!(cmd.encode(64).unwrap(), b"read       3     64\r\n".to_vec());

        let cmd = Command::new("set ").arg("wl s ").arg_opt(None);
        assert_eq!(cmd.text(), "set wl s ");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "      0");
        assert_eq!(format_number(8080), "   8080");
        assert_eq!(format_number(u16::MAX), "  65535");
    }

    #[test]
    fn test_decode_header() {
        let header = decode_header(b"R000003\r\n2\r\n").unwrap();
        assert_eq!(header, Header { code: 0, payload_len: 3 });
        assert_eq!(header.total_len(), 12);
        assert!(header.is_success());

        let header = decode_header(b"R600000\r\n").unwrap();
        assert_eq!(header.code, 6);
        assert!(!header.is_success());
    }

    #[test]
    fn test_decode_header_rejects_garbage() {
        assert!(decode_header(b"R0000").is_err());
        assert!(decode_header(b"X000003\r\n").is_err());
        assert!(decode_header(b"RA00003\r\n").is_err());
        assert!(decode_header(b"R0 0003\r\n").is_err());
    }

    proptest! {
        #[test]
        fn prop_header_round_trip(code in 0u8..=9, len in 0usize..=MAX_PAYLOAD_LEN) {
            let header = decode_header(&encode_header(code, len)).unwrap();
            prop_assert_eq!(header.code, code);
            prop_assert_eq!(header.payload_len, len);
            prop_assert_eq!(header.total_len(), len + RX_HEADER_LEN);
        }
    }
}
