//! Machine-mode protocol
//!
//! Wire framing, the command vocabulary, response code decoding and the
//! parsers for handle replies and fixed-column listings.

pub mod codec;
pub mod commands;
pub mod listing;
pub mod response_code;

pub use codec::{decode_header, encode, encode_header, format_number, Command, Header};
pub use listing::{FileEntry, ScanEntry, StreamHandle, StreamListEntry};
pub use response_code::{decode_code, format_rejection, ResponseCode};
