//! Error types for the BBQr codec.

use thiserror::Error;

/// Reasons a string cannot be parsed as a BBQr fragment header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Fragment is shorter than the fixed header.
    #[error("Fragment too short: {0} chars (header is 8)")]
    TooShort(usize),

    /// Fragment does not start with "B$".
    #[error("Invalid magic: expected 'B$', got {0:?}")]
    InvalidMagic(String),

    /// Encoding character is not one of the known codes.
    #[error("Unknown transfer encoding: {0:?}")]
    UnknownEncoding(char),

    /// Type character is not one of the known codes.
    #[error("Unknown content type: {0:?}")]
    UnknownContentType(char),

    /// Total or index field is not two base-36 digits.
    #[error("Invalid base-36 field: {0:?}")]
    InvalidBase36(String),
}

/// Errors raised while building a transfer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Payload needs more parts than the header can number.
    #[error("Fragment budget exceeded: {required} parts needed (max: {max})")]
    FragmentBudgetExceeded { required: usize, max: usize },

    /// A fragment must carry at least one character of body.
    #[error("Invalid fragment length: must be at least 1")]
    InvalidFragmentLength,

    /// The deflate stream could not be produced.
    #[error("Compression failed: {0}")]
    Compression(String),
}

/// Why a completed transfer could not be turned back into a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Concatenated body is not valid base32 or hex.
    #[error("Bad encoding: {0}")]
    BadEncoding(String),

    /// Inflating the decoded bytes failed.
    #[error("Bad compression: {0}")]
    BadCompression(String),

    /// A compressed transfer carried no data at all.
    #[error("Empty payload")]
    EmptyPayload,
}
