//! Reply and listing parsers
//!
//! Pure functions over reply payloads and listing rows. Listing rows use
//! fixed columns, for example:
//!
//! ```text
//! # 0 TCPS  10.1.54.31:12345 10.1.54.11:59584
//! #  0   1995     1.5.0  webapp/index.html
//! #  0  1  -72 FE:EC:DA:81:30:32 SiliconLabsGuest
//! ```

use serde::{Deserialize, Serialize};
use wgxlink_core::{StreamError, StreamType};

const ROW_MARKER: u8 = b'#';

/// Handle reply: `<handle>[,<bytes-remaining>]\r\n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle {
    pub handle: i8,
    pub remaining: Option<i64>,
}

/// Row of the module's stream listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamListEntry {
    pub handle: i8,
    pub stream_type: StreamType,
}

/// Row of the module's file listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u32,
}

/// Row of a Wi-Fi scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub ssid: String,
    pub channel: u8,
    pub mac: String,
    pub rssi: i8,
}

/// Parse a leading decimal integer.
///
/// Leading whitespace and one sign are accepted; parsing stops at the first
/// non-digit. Returns 0 when no digits are found.
pub fn atoi(bytes: &[u8]) -> i64 {
    let mut rest = bytes;
    while let Some((first, tail)) = rest.split_first() {
        if !first.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let value = rest
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });

    if negative {
        -value
    } else {
        value
    }
}

fn column(line: &[u8], start: usize) -> &[u8] {
    line.get(start..).unwrap_or(&[])
}

fn check_marker(line: &[u8], what: &str) -> Result<(), StreamError> {
    if line.first() == Some(&ROW_MARKER) {
        Ok(())
    } else {
        Err(StreamError::MalformedReply {
            reason: format!(
                "{} row does not start with '#': {:?}",
                what,
                String::from_utf8_lossy(line)
            ),
        })
    }
}

/// Parse a handle reply payload
pub fn parse_stream_handle(payload: &[u8]) -> Result<StreamHandle, StreamError> {
    if payload.len() < 3 {
        return Err(StreamError::MalformedReply {
            reason: format!("handle reply too short: {} bytes", payload.len()),
        });
    }

    let handle = i8::try_from(atoi(payload)).map_err(|_| StreamError::MalformedReply {
        reason: format!(
            "handle out of range: {:?}",
            String::from_utf8_lossy(payload)
        ),
    })?;

    let remaining = payload
        .iter()
        .position(|&b| b == b',')
        .map(|comma| atoi(&payload[comma + 1..]));

    Ok(StreamHandle { handle, remaining })
}

/// Map the type tag of a stream listing row to a stream type.
///
/// `tag` starts at the tag's first character: `C`, `F`, `H`, or a
/// four-letter `TCPC`/`TLSS`/`UDPS`/`WEBC`-style tag where the fourth
/// character `C` marks a client.
pub fn stream_type_from_tag(tag: &[u8]) -> StreamType {
    let client = tag.get(3) == Some(&b'C');
    match tag.first() {
        Some(b'C') => StreamType::Command,
        Some(b'F') => StreamType::File,
        Some(b'H') => StreamType::Http,
        Some(b'T') if tag.get(1) == Some(&b'C') => {
            if client {
                StreamType::TcpClient
            } else {
                StreamType::TcpServer
            }
        }
        Some(b'T') => {
            if client {
                StreamType::TlsClient
            } else {
                StreamType::TlsServer
            }
        }
        Some(b'U') => {
            if client {
                StreamType::UdpClient
            } else {
                StreamType::UdpServer
            }
        }
        Some(b'W') => {
            if client {
                StreamType::WebClient
            } else {
                StreamType::WebServer
            }
        }
        _ => StreamType::None,
    }
}

/// Parse a stream listing row; an empty line ends the listing
pub fn parse_stream_row(line: &str) -> Result<Option<StreamListEntry>, StreamError> {
    let line = line.as_bytes();
    if line.is_empty() {
        return Ok(None);
    }
    check_marker(line, "stream")?;

    let handle = i8::try_from(atoi(column(line, 2))).unwrap_or(-1);
    Ok(Some(StreamListEntry {
        handle,
        stream_type: stream_type_from_tag(column(line, 4)),
    }))
}

/// Parse a file listing row; an empty line ends the listing
pub fn parse_file_row(line: &str) -> Result<Option<FileEntry>, StreamError> {
    let bytes = line.as_bytes();
    if bytes.is_empty() {
        return Ok(None);
    }
    check_marker(bytes, "file")?;

    Ok(Some(FileEntry {
        name: String::from_utf8_lossy(column(bytes, 23)).into_owned(),
        size: u32::try_from(atoi(column(bytes, 4))).unwrap_or(0),
    }))
}

/// Parse a scan row; rows shorter than 32 bytes end the listing
pub fn parse_scan_row(line: &str) -> Result<Option<ScanEntry>, StreamError> {
    let bytes = line.as_bytes();
    if bytes.len() < 32 {
        return Ok(None);
    }
    check_marker(bytes, "scan")?;

    Ok(Some(ScanEntry {
        ssid: String::from_utf8_lossy(column(bytes, 31)).into_owned(),
        channel: u8::try_from(atoi(column(bytes, 5))).unwrap_or(0),
        mac: String::from_utf8_lossy(&bytes[13..30]).into_owned(),
        rssi: i8::try_from(atoi(column(bytes, 8))).unwrap_or(i8::MIN),
    }))
}

/// Number of soft AP clients from an info dump, 0 when absent
pub fn parse_client_count(dump: &[u8]) -> u8 {
    let key = crate::protocol::commands::CLIENTS_KEY.as_bytes();
    dump.windows(key.len())
        .position(|window| window == key)
        .map(|at| u8::try_from(atoi(column(dump, at + 8))).unwrap_or(u8::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoi() {
        assert_eq!(atoi(b"  42abc"), 42);
        assert_eq!(atoi(b"-72 FE"), -72);
        assert_eq!(atoi(b"+7"), 7);
        assert_eq!(atoi(b"x1"), 0);
        assert_eq!(atoi(b""), 0);
    }

    #[test]
    fn test_parse_stream_handle() {
        let parsed = parse_stream_handle(b"3,120\r\n").unwrap();
        assert_eq!(parsed.handle, 3);
        assert_eq!(parsed.remaining, Some(120));

        let parsed = parse_stream_handle(b"0\r\n").unwrap();
        assert_eq!(parsed.handle, 0);
        assert_eq!(parsed.remaining, None);

        assert!(parse_stream_handle(b"1\r").is_err());
        assert!(parse_stream_handle(b"300\r\n").is_err());
    }

    #[test]
    fn test_stream_row_types() {
        let cases = [
            ("# 0 TCPS  10.1.54.31:12345 10.1.54.11:59584", 0, StreamType::TcpServer),
            ("# 1 TCPC  10.1.54.31:80", 1, StreamType::TcpClient),
            ("# 2 TLSS  0.0.0.0:443", 2, StreamType::TlsServer),
            ("# 3 TLSC  1.2.3.4:443", 3, StreamType::TlsClient),
            ("# 4 UDPS  0.0.0.0:5000", 4, StreamType::UdpServer),
            ("# 5 UDPC  1.2.3.4:5000", 5, StreamType::UdpClient),
            ("# 6 WEBS  x", 6, StreamType::WebServer),
            ("# 7 WEBC  x", 7, StreamType::WebClient),
            ("# 8 CMD", 8, StreamType::Command),
            ("# 9 FILE  x", 9, StreamType::File),
            ("# 1 HTTP  x", 1, StreamType::Http),
        ];
        for (line, handle, stream_type) in cases {
            let row = parse_stream_row(line).unwrap().unwrap();
            assert_eq!(row.handle, handle, "{}", line);
            assert_eq!(row.stream_type, stream_type, "{}", line);
        }
    }

    #[test]
    fn test_stream_row_end_and_garbage() {
        assert_eq!(parse_stream_row("").unwrap(), None);
        assert!(parse_stream_row("! # Type  Info").is_err());
    }

    #[test]
    fn test_file_row() {
        let row = parse_file_row("#  0   1995     1.5.0  webapp/index.html")
            .unwrap()
            .unwrap();
        assert_eq!(row.size, 1995);
        assert_eq!(row.name, "webapp/index.html");

        let row = parse_file_row("#  1  22670     1.5.0  webapp/zentrios.css.gz")
            .unwrap()
            .unwrap();
        assert_eq!(row.size, 22670);
        assert_eq!(row.name, "webapp/zentrios.css.gz");
    }

    #[test]
    fn test_scan_row() {
        let row = parse_scan_row("#  0  1  -72 FE:EC:DA:81:30:32 SiliconLabsGuest")
            .unwrap()
            .unwrap();
        assert_eq!(row.channel, 1);
        assert_eq!(row.rssi, -72);
        assert_eq!(row.mac, "FE:EC:DA:81:30:32");
        assert_eq!(row.ssid, "SiliconLabsGuest");
    }

    #[test]
    fn test_short_scan_row_ends_listing() {
        assert_eq!(parse_scan_row("#  0  1  -72 FE:EC:DA:81:30:32").unwrap(), None);
        assert_eq!(parse_scan_row("").unwrap(), None);
    }

    #[test]
    fn test_client_count() {
        let dump = b"! softap info\r\nclients 3\r\nchannel 6\r\n";
        assert_eq!(parse_client_count(dump), 3);
        assert_eq!(parse_client_count(b"nothing here"), 0);
    }
}
