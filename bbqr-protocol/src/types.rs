//! Wire-level type definitions for the BBQr protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Magic marker every fragment starts with.
pub const MAGIC: &str = "B$";

/// Header size: 2 (magic) + 1 (encoding) + 1 (type) + 2 (total) + 2 (index).
pub const HEADER_SIZE: usize = 8;

/// Largest part count two base-36 digits can carry ("ZZ").
pub const MAX_PARTS: usize = 36 * 36 - 1;

/// Semantic kind of the payload carried by a transfer.
///
/// Purely descriptive: the codec moves the bytes the same way regardless of
/// the type, the receiver uses it to interpret the reconstructed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Partially signed bitcoin transaction.
    Psbt,
    /// Raw signed transaction.
    Transaction,
    Json,
    Cbor,
    /// UTF-8 text.
    Unicode,
    /// Generic binary blob.
    Binary,
    Executable,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Psbt,
        ContentType::Transaction,
        ContentType::Json,
        ContentType::Cbor,
        ContentType::Unicode,
        ContentType::Binary,
        ContentType::Executable,
    ];

    /// Wire character for this type.
    pub fn code(self) -> char {
        match self {
            ContentType::Psbt => 'P',
            ContentType::Transaction => 'T',
            ContentType::Json => 'J',
            ContentType::Cbor => 'C',
            ContentType::Unicode => 'U',
            ContentType::Binary => 'B',
            ContentType::Executable => 'X',
        }
    }

    /// Look up a type by its wire character.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'P' => Some(ContentType::Psbt),
            'T' => Some(ContentType::Transaction),
            'J' => Some(ContentType::Json),
            'C' => Some(ContentType::Cbor),
            'U' => Some(ContentType::Unicode),
            'B' => Some(ContentType::Binary),
            'X' => Some(ContentType::Executable),
            _ => None,
        }
    }

    /// Whether payloads of this type are UTF-8 text.
    pub fn is_text(self) -> bool {
        matches!(self, ContentType::Json | ContentType::Unicode)
    }

    pub fn name(self) -> &'static str {
        match self {
            ContentType::Psbt => "psbt",
            ContentType::Transaction => "transaction",
            ContentType::Json => "json",
            ContentType::Cbor => "cbor",
            ContentType::Unicode => "unicode",
            ContentType::Binary => "binary",
            ContentType::Executable => "executable",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "psbt" | "p" => Ok(ContentType::Psbt),
            "transaction" | "txn" | "t" => Ok(ContentType::Transaction),
            "json" | "j" => Ok(ContentType::Json),
            "cbor" | "c" => Ok(ContentType::Cbor),
            "unicode" | "text" | "u" => Ok(ContentType::Unicode),
            "binary" | "b" => Ok(ContentType::Binary),
            "executable" | "x" => Ok(ContentType::Executable),
            other => Err(format!("unknown content type: {}", other)),
        }
    }
}

/// How the payload bytes are turned into fragment text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferEncoding {
    /// Unpadded RFC 4648 base32 of the raw payload.
    Plain,
    /// Raw deflate, then unpadded base32.
    #[serde(alias = "zlib")]
    Compressed,
    /// Uppercase hexadecimal of the raw payload.
    Hex,
}

impl TransferEncoding {
    pub const ALL: [TransferEncoding; 3] = [
        TransferEncoding::Plain,
        TransferEncoding::Compressed,
        TransferEncoding::Hex,
    ];

    /// Wire character for this encoding.
    pub fn code(self) -> char {
        match self {
            TransferEncoding::Plain => '2',
            TransferEncoding::Compressed => 'Z',
            TransferEncoding::Hex => 'H',
        }
    }

    /// Look up an encoding by its wire character.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '2' => Some(TransferEncoding::Plain),
            'Z' => Some(TransferEncoding::Compressed),
            'H' => Some(TransferEncoding::Hex),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransferEncoding::Plain => "plain",
            TransferEncoding::Compressed => "compressed",
            TransferEncoding::Hex => "hex",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransferEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "base32" | "2" => Ok(TransferEncoding::Plain),
            "compressed" | "zlib" | "z" => Ok(TransferEncoding::Compressed),
            "hex" | "h" => Ok(TransferEncoding::Hex),
            other => Err(format!("unknown transfer encoding: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_codes_round_trip() {
        for ty in ContentType::ALL {
            assert_eq!(ContentType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(ContentType::from_code('Q'), None);
        assert_eq!(ContentType::from_code('p'), None);
    }

    #[test]
    fn test_encoding_codes_round_trip() {
        for enc in TransferEncoding::ALL {
            assert_eq!(TransferEncoding::from_code(enc.code()), Some(enc));
        }
        assert_eq!(TransferEncoding::from_code('z'), None);
    }

    #[test]
    fn test_wire_codes_match_bbqr() {
        assert_eq!(ContentType::Psbt.code(), 'P');
        assert_eq!(ContentType::Transaction.code(), 'T');
        assert_eq!(ContentType::Json.code(), 'J');
        assert_eq!(TransferEncoding::Plain.code(), '2');
        assert_eq!(TransferEncoding::Compressed.code(), 'Z');
        assert_eq!(TransferEncoding::Hex.code(), 'H');
        assert_eq!(MAX_PARTS, 1295);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("JSON".parse::<ContentType>(), Ok(ContentType::Json));
        assert_eq!("txn".parse::<ContentType>(), Ok(ContentType::Transaction));
        assert_eq!("zlib".parse::<TransferEncoding>(), Ok(TransferEncoding::Compressed));
        assert!("gzip".parse::<TransferEncoding>().is_err());
    }

    #[test]
    fn test_text_types() {
        assert!(ContentType::Json.is_text());
        assert!(ContentType::Unicode.is_text());
        assert!(!ContentType::Psbt.is_text());
    }
}
