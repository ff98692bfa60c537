//! BBQr ("Better Bitcoin QR") fragment codec.
//!
//! This crate splits a binary payload into short text fragments, one per QR
//! code, and reassembles the payload from fragments scanned in any order.
//!
//! # Fragment Format
//!
//! ```text
//! +-------+----------+------+--------+--------+-------------------+
//! | Magic | Encoding | Type | Total  | Index  |       Body        |
//! | "B$"  |  2/Z/H   |1 char| base36 | base36 | base32 / hex text |
//! +-------+----------+------+--------+--------+-------------------+
//! ```
//!
//! # Example
//!
//! ```rust
//! use bbqr_protocol::{encode, ContentType, Decoder, Outcome, TransferEncoding};
//!
//! let payload = br#"{"label":"example","value":1}"#;
//! let transfer = encode(payload, ContentType::Json, TransferEncoding::Compressed, 20).unwrap();
//!
//! let mut decoder = Decoder::new();
//! for part in transfer.all_parts().iter().rev() {
//!     decoder.receive_part(part);
//! }
//!
//! match decoder.result() {
//!     Some(Outcome::Success { data, content_type }) => {
//!         assert_eq!(&data[..], &payload[..]);
//!         assert_eq!(content_type, ContentType::Json);
//!     }
//!     other => panic!("unexpected outcome: {:?}", other),
//! }
//! ```

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod types;

pub use codec::{is_bbqr_fragment, Header};
pub use decoder::{Decoder, DecoderConfig, Outcome, DEFAULT_MAX_PAYLOAD_LEN};
pub use encoder::{
    encode, EncodedTransfer, EncoderConfig, DEFAULT_FRAGMENT_LENGTH, DEFAULT_FRAME_INTERVAL_MS,
};
pub use error::{EncodeError, FailureReason, HeaderError};
pub use types::{ContentType, TransferEncoding, HEADER_SIZE, MAGIC, MAX_PARTS};
