//! Fragment header codec and payload packing.
//!
//! Fragment format:
//! ```text
//! +-------+----------+------+--------+--------+-------------------+
//! | Magic | Encoding | Type | Total  | Index  |       Body        |
//! | "B$"  |  1 char  |1 char| base36 | base36 | base32 / hex text |
//! +-------+----------+------+--------+--------+-------------------+
//! |2 chars|          |      |2 chars |2 chars |     variable      |
//! ```

use std::fmt;
use std::io::Write;

use data_encoding::{BASE32_NOPAD, HEXUPPER, HEXUPPER_PERMISSIVE};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::Serialize;

use crate::error::{EncodeError, FailureReason, HeaderError};
use crate::types::*;

const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Parsed fixed-width fragment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub encoding: TransferEncoding,
    pub content_type: ContentType,
    pub total_parts: usize,
    pub part_index: usize,
}

impl Header {
    /// Parse the header of a fragment, returning it with the body slice.
    ///
    /// Surrounding whitespace and trailing `=` padding are not part of the
    /// body; scanners often append a line ending.
    pub fn parse(fragment: &str) -> Result<(Header, &str), HeaderError> {
        let fragment = fragment.trim_matches(|c: char| c.is_ascii_whitespace());
        if fragment.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort(fragment.len()));
        }
        if !fragment.starts_with(MAGIC) {
            let prefix: String = fragment.chars().take(MAGIC.len()).collect();
            return Err(HeaderError::InvalidMagic(prefix));
        }

        let bytes = fragment.as_bytes();
        let encoding = TransferEncoding::from_code(bytes[2] as char)
            .ok_or(HeaderError::UnknownEncoding(bytes[2] as char))?;
        let content_type = ContentType::from_code(bytes[3] as char)
            .ok_or(HeaderError::UnknownContentType(bytes[3] as char))?;
        let total_parts = decode_base36(&bytes[4..6])?;
        let part_index = decode_base36(&bytes[6..8])?;

        // Bytes 0..8 are all ASCII at this point, so 8 is a char boundary.
        let body = fragment[HEADER_SIZE..]
            .trim_end_matches(|c: char| c == '=' || c.is_ascii_whitespace());

        Ok((
            Header {
                encoding,
                content_type,
                total_parts,
                part_index,
            },
            body,
        ))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = encode_base36(self.total_parts);
        let index = encode_base36(self.part_index);
        write!(
            f,
            "{}{}{}{}{}",
            MAGIC,
            self.encoding.code(),
            self.content_type.code(),
            total,
            index
        )
    }
}

/// Returns true if the string carries a parseable BBQr header.
pub fn is_bbqr_fragment(fragment: &str) -> bool {
    Header::parse(fragment).is_ok()
}

/// Two-digit uppercase base-36. Callers keep `value <= MAX_PARTS`.
fn encode_base36(value: usize) -> String {
    debug_assert!(value <= MAX_PARTS);
    let hi = BASE36_DIGITS[(value / 36) % 36] as char;
    let lo = BASE36_DIGITS[value % 36] as char;
    format!("{}{}", hi, lo)
}

fn decode_base36(field: &[u8]) -> Result<usize, HeaderError> {
    let invalid = || HeaderError::InvalidBase36(String::from_utf8_lossy(field).into_owned());
    let mut value = 0usize;
    for &b in field {
        let digit = (b as char).to_digit(36).ok_or_else(invalid)?;
        value = value * 36 + digit as usize;
    }
    Ok(value)
}

/// Turn payload bytes into the transfer text for `encoding`.
pub fn pack(encoding: TransferEncoding, payload: &[u8]) -> Result<String, EncodeError> {
    match encoding {
        TransferEncoding::Plain => Ok(BASE32_NOPAD.encode(payload)),
        TransferEncoding::Compressed => Ok(BASE32_NOPAD.encode(&deflate(payload)?)),
        TransferEncoding::Hex => Ok(HEXUPPER.encode(payload)),
    }
}

/// Inverse of [`pack`], applied to the concatenated bodies of a transfer.
///
/// `max_len` bounds the inflated size of a `Compressed` transfer.
pub fn unpack(
    encoding: TransferEncoding,
    text: &str,
    max_len: usize,
) -> Result<Vec<u8>, FailureReason> {
    match encoding {
        TransferEncoding::Plain => decode_base32(text),
        TransferEncoding::Hex => HEXUPPER_PERMISSIVE
            .decode(text.as_bytes())
            .map_err(|e| FailureReason::BadEncoding(e.to_string())),
        TransferEncoding::Compressed => {
            let deflated = decode_base32(text)?;
            if deflated.is_empty() {
                return Err(FailureReason::EmptyPayload);
            }
            inflate(&deflated, max_len)
        }
    }
}

/// Unpadded base32, either case.
fn decode_base32(text: &str) -> Result<Vec<u8>, FailureReason> {
    BASE32_NOPAD
        .decode(text.to_ascii_uppercase().as_bytes())
        .map_err(|e| FailureReason::BadEncoding(e.to_string()))
}

/// Raw deflate (no zlib header) at the best compression level.
fn deflate(data: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| EncodeError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| EncodeError::Compression(e.to_string()))
}

/// Inflate a raw deflate stream of at most `max_len` bytes. A stream that
/// ends before its final block is an error, not a short read.
fn inflate(data: &[u8], max_len: usize) -> Result<Vec<u8>, FailureReason> {
    let mut inflater = Decompress::new(false);
    let initial = data.len().saturating_mul(4).clamp(64, max_len.saturating_add(1).max(64));
    let mut out = Vec::with_capacity(initial);
    let too_large = || {
        FailureReason::BadCompression(format!("inflated payload exceeds {} bytes", max_len))
    };

    loop {
        if out.len() > max_len {
            return Err(too_large());
        }
        if out.len() == out.capacity() {
            // Never grow past one byte over the limit.
            let room = (max_len.saturating_add(1) - out.len()).min(out.capacity());
            out.reserve_exact(room);
        }
        let in_before = inflater.total_in();
        let out_before = inflater.total_out();
        let consumed = in_before as usize;

        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| FailureReason::BadCompression(e.to_string()))?;

        if status == Status::StreamEnd {
            if out.len() > max_len {
                return Err(too_large());
            }
            return Ok(out);
        }
        let stalled = inflater.total_in() == in_before && inflater.total_out() == out_before;
        if stalled && out.len() < out.capacity() {
            return Err(FailureReason::BadCompression(
                "unexpected end of deflate stream".to_string(),
            ));
        }
    }
}
