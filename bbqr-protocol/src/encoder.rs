//! Splitting a payload into an ordered set of fragments.

use log::debug;
use serde::Deserialize;

use crate::codec::{pack, Header};
use crate::error::EncodeError;
use crate::types::*;

/// Default body length per fragment.
pub const DEFAULT_FRAGMENT_LENGTH: usize = 2000;

/// Default delay between frames when cycling fragments on a display.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 250;

/// Encoder defaults, usually loaded from the `[encoder]` config section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub content_type: ContentType,
    pub encoding: TransferEncoding,
    pub max_fragment_length: usize,
    pub frame_interval_ms: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            content_type: ContentType::Binary,
            encoding: TransferEncoding::Compressed,
            max_fragment_length: DEFAULT_FRAGMENT_LENGTH,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

/// A fully prepared transfer with a display cursor.
#[derive(Debug, Clone)]
pub struct EncodedTransfer {
    parts: Vec<String>,
    content_type: ContentType,
    encoding: TransferEncoding,
    cursor: usize,
}

impl EncodedTransfer {
    /// Number of fragments in the transfer.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn is_single_part(&self) -> bool {
        self.parts.len() == 1
    }

    /// Return the fragment under the cursor and advance it, wrapping to the
    /// first fragment after the last.
    pub fn next_part(&mut self) -> &str {
        let current = self.cursor;
        self.cursor = (self.cursor + 1) % self.parts.len();
        &self.parts[current]
    }

    /// All fragments in index order. Does not touch the cursor.
    pub fn all_parts(&self) -> &[String] {
        &self.parts
    }

    /// Move the cursor so the next `next_part` call returns fragment `index`
    /// (taken modulo the part count).
    pub fn with_first_part(mut self, index: usize) -> Self {
        self.cursor = index % self.parts.len();
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// The encoding actually carried in the headers. May be `Plain` when
    /// `Compressed` was requested but did not shrink the payload.
    pub fn encoding(&self) -> TransferEncoding {
        self.encoding
    }
}

/// Split `payload` into BBQr fragments whose bodies are at most
/// `max_fragment_length` characters long.
///
/// A length that is a multiple of 8 (base32) or 2 (hex) keeps every body
/// decodable on its own, which some readers of this format require.
pub fn encode(
    payload: &[u8],
    content_type: ContentType,
    encoding: TransferEncoding,
    max_fragment_length: usize,
) -> Result<EncodedTransfer, EncodeError> {
    if max_fragment_length == 0 {
        return Err(EncodeError::InvalidFragmentLength);
    }

    let (encoding, text) = prepare(payload, encoding)?;

    let total_parts = text.len().div_ceil(max_fragment_length).max(1);
    if total_parts > MAX_PARTS {
        return Err(EncodeError::FragmentBudgetExceeded {
            required: total_parts,
            max: MAX_PARTS,
        });
    }

    // Body text is ASCII, so byte offsets are char offsets.
    let parts = (0..total_parts)
        .map(|part_index| {
            let header = Header {
                encoding,
                content_type,
                total_parts,
                part_index,
            };
            let start = (part_index * max_fragment_length).min(text.len());
            let end = (start + max_fragment_length).min(text.len());
            format!("{}{}", header, &text[start..end])
        })
        .collect();

    debug!(
        "Encoded {} bytes as {} {} fragment(s) ({} chars, encoding={})",
        payload.len(),
        total_parts,
        content_type,
        text.len(),
        encoding
    );

    Ok(EncodedTransfer {
        parts,
        content_type,
        encoding,
        cursor: 0,
    })
}

/// Pack the payload, dropping compression when it does not pay for itself.
fn prepare(
    payload: &[u8],
    encoding: TransferEncoding,
) -> Result<(TransferEncoding, String), EncodeError> {
    let packed = pack(encoding, payload)?;
    if encoding != TransferEncoding::Compressed {
        return Ok((encoding, packed));
    }

    let plain = pack(TransferEncoding::Plain, payload)?;
    if packed.len() > plain.len() {
        debug!(
            "Compressed form is larger ({} > {} chars), sending plain",
            packed.len(),
            plain.len()
        );
        Ok((TransferEncoding::Plain, plain))
    } else {
        Ok((TransferEncoding::Compressed, packed))
    }
}
