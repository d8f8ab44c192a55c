//! Module response code decoder
//! Converts the error digit of a response header to a readable message

use serde::{Deserialize, Serialize};

/// Error digit carried in a response header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseCode {
    Success,
    CommandFailed,
    ParseError,
    UnknownCommand,
    TooFewArgs,
    TooManyArgs,
    UnknownVariable,
    InvalidArgument,
    Overflow,
    BoundsError,
    Unknown(u8),
}

impl ResponseCode {
    /// Map a header digit to its code
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::CommandFailed,
            2 => Self::ParseError,
            3 => Self::UnknownCommand,
            4 => Self::TooFewArgs,
            5 => Self::TooManyArgs,
            6 => Self::UnknownVariable,
            7 => Self::InvalidArgument,
            8 => Self::Overflow,
            9 => Self::BoundsError,
            other => Self::Unknown(other),
        }
    }
}

/// Decode a response error digit to a human-readable message
pub fn decode_code(code: u8) -> String {
    match ResponseCode::from_code(code) {
        ResponseCode::Success => "Command succeeded.".to_string(),
        ResponseCode::CommandFailed => "Command failed.".to_string(),
        ResponseCode::ParseError => "Command could not be parsed.".to_string(),
        ResponseCode::UnknownCommand => "Unknown command.".to_string(),
        ResponseCode::TooFewArgs => "Too few arguments.".to_string(),
        ResponseCode::TooManyArgs => "Too many arguments.".to_string(),
        ResponseCode::UnknownVariable => "Unknown variable or option.".to_string(),
        ResponseCode::InvalidArgument => "Invalid argument.".to_string(),
        ResponseCode::Overflow => "Serial command buffer overflow.".to_string(),
        ResponseCode::BoundsError => "Value out of bounds.".to_string(),
        ResponseCode::Unknown(code) => format!("Unknown response code: {}", code),
    }
}

/// Format a rejection with code and description
pub fn format_rejection(code: u8) -> String {
    format!("R{} - {}", code, decode_code(code))
}
