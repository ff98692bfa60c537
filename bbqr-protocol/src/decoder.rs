//! Reassembling a payload from fragments scanned in any order.

use bytes::Bytes;
use log::{debug, info, trace, warn};
use serde::Deserialize;

use crate::codec::{unpack, Header};
use crate::error::FailureReason;
use crate::types::*;

/// Default ceiling on the size of a decoded payload.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Decoder limits, usually loaded from the `[decoder]` config section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Largest declared part count accepted before allocating the part table.
    pub max_parts: usize,
    /// Largest payload a compressed transfer may inflate to.
    pub max_payload_len: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_parts: MAX_PARTS,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

/// Terminal result of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        data: Bytes,
        content_type: ContentType,
    },
    Failure {
        reason: FailureReason,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The payload as text, for text content types that decode as UTF-8.
    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::Success { data, content_type } if content_type.is_text() => {
                std::str::from_utf8(data).ok()
            }
            _ => None,
        }
    }
}

/// Transfer parameters captured from the first accepted fragment.
#[derive(Debug)]
struct Session {
    encoding: TransferEncoding,
    content_type: ContentType,
    parts: Vec<Option<String>>,
    filled: usize,
}

impl Session {
    fn matches(&self, header: &Header) -> bool {
        self.encoding == header.encoding
            && self.content_type == header.content_type
            && self.parts.len() == header.total_parts
    }

    fn reconstruct(&self, max_payload_len: usize) -> Outcome {
        let text: String = self.parts.iter().flatten().map(String::as_str).collect();
        match unpack(self.encoding, &text, max_payload_len) {
            Ok(data) => Outcome::Success {
                data: Bytes::from(data),
                content_type: self.content_type,
            },
            Err(reason) => Outcome::Failure { reason },
        }
    }
}

/// Decoder state machine.
#[derive(Debug)]
enum State {
    /// No fragment accepted yet.
    Empty,
    /// Some parts stored, more expected.
    Collecting(Session),
    /// Every part arrived; the outcome is fixed.
    Done { total_parts: usize, outcome: Outcome },
}

/// Accumulates fragments of one transfer.
///
/// Fragments may arrive in any order and more than once. Strings that are
/// not BBQr fragments, or that belong to a different transfer, are rejected
/// without disturbing the transfer in progress.
#[derive(Debug)]
pub struct Decoder {
    config: DecoderConfig,
    state: State,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            config,
            state: State::Empty,
        }
    }

    /// Feed one scanned string.
    ///
    /// Returns true only when the fragment was accepted and filled a part
    /// that was still missing.
    pub fn receive_part(&mut self, fragment: &str) -> bool {
        let (header, body) = match Header::parse(fragment) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!("Ignoring non-BBQr fragment: {}", e);
                return false;
            }
        };

        if let State::Empty = self.state {
            if header.total_parts == 0 || header.total_parts > self.config.max_parts {
                debug!(
                    "Rejecting fragment declaring {} parts (max: {})",
                    header.total_parts, self.config.max_parts
                );
                return false;
            }
            if header.part_index >= header.total_parts {
                trace!(
                    "Rejecting fragment index {} of {}",
                    header.part_index,
                    header.total_parts
                );
                return false;
            }
            debug!(
                "Starting {} transfer: {} part(s), encoding={}",
                header.content_type, header.total_parts, header.encoding
            );
            self.state = State::Collecting(Session {
                encoding: header.encoding,
                content_type: header.content_type,
                parts: vec![None; header.total_parts],
                filled: 0,
            });
        }

        let session = match &mut self.state {
            State::Collecting(session) => session,
            State::Done { .. } => {
                trace!("Transfer already finished, ignoring fragment");
                return false;
            }
            State::Empty => return false,
        };

        if !session.matches(&header) {
            debug!(
                "Ignoring fragment from another transfer ({} {} parts={})",
                header.content_type, header.encoding, header.total_parts
            );
            return false;
        }
        if header.part_index >= session.parts.len() {
            trace!(
                "Rejecting fragment index {} of {}",
                header.part_index,
                session.parts.len()
            );
            return false;
        }

        let slot = &mut session.parts[header.part_index];
        if slot.is_some() {
            trace!("Duplicate part {}", header.part_index);
            return false;
        }
        *slot = Some(body.to_string());
        session.filled += 1;
        debug!(
            "Stored part {} ({}/{})",
            header.part_index,
            session.filled,
            session.parts.len()
        );

        if session.filled == session.parts.len() {
            let total_parts = session.parts.len();
            let outcome = session.reconstruct(self.config.max_payload_len);
            match &outcome {
                Outcome::Success { data, content_type } => {
                    info!(
                        "BBQr transfer complete: {} bytes of {}",
                        data.len(),
                        content_type
                    );
                }
                Outcome::Failure { reason } => {
                    warn!("BBQr transfer failed: {}", reason);
                }
            }
            self.state = State::Done {
                total_parts,
                outcome,
            };
        }

        true
    }

    /// Number of distinct parts stored so far.
    pub fn processed_parts_count(&self) -> usize {
        match &self.state {
            State::Empty => 0,
            State::Collecting(session) => session.filled,
            State::Done { total_parts, .. } => *total_parts,
        }
    }

    /// Declared part count of the current transfer, 0 before any fragment.
    pub fn expected_part_count(&self) -> usize {
        match &self.state {
            State::Empty => 0,
            State::Collecting(session) => session.parts.len(),
            State::Done { total_parts, .. } => *total_parts,
        }
    }

    /// Fraction of parts received, in `0.0..=1.0`.
    pub fn percent_complete(&self) -> f64 {
        let total = self.expected_part_count();
        if total == 0 {
            return 0.0;
        }
        self.processed_parts_count() as f64 / total as f64
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Done { .. })
    }

    /// The outcome once every part has arrived, `None` before that.
    pub fn result(&self) -> Option<Outcome> {
        match &self.state {
            State::Done { outcome, .. } => Some(outcome.clone()),
            _ => None,
        }
    }

    /// Drop the current transfer and start over.
    pub fn reset(&mut self) {
        self.state = State::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode, DEFAULT_FRAGMENT_LENGTH};

    const LABEL_JSON: &str = r#"{"label":"example","value":1}"#;

    fn json_parts() -> Vec<String> {
        encode(
            LABEL_JSON.as_bytes(),
            ContentType::Json,
            TransferEncoding::Compressed,
            20,
        )
        .unwrap()
        .all_parts()
        .to_vec()
    }

    fn expected_json() -> Outcome {
        Outcome::Success {
            data: Bytes::from_static(LABEL_JSON.as_bytes()),
            content_type: ContentType::Json,
        }
    }

    #[test]
    fn test_compressed_json_in_order() {
        let mut transfer = encode(
            LABEL_JSON.as_bytes(),
            ContentType::Json,
            TransferEncoding::Compressed,
            20,
        )
        .unwrap();
        let mut decoder = Decoder::new();

        for _ in 0..transfer.part_count() {
            assert!(decoder.receive_part(transfer.next_part()));
        }

        assert_eq!(decoder.processed_parts_count(), transfer.part_count());
        let result = decoder.result().unwrap();
        assert_eq!(result, expected_json());
        assert_eq!(result.text(), Some(LABEL_JSON));
    }

    #[test]
    fn test_compressed_json_reversed() {
        let parts = json_parts();
        let mut decoder = Decoder::new();
        for part in parts.iter().rev() {
            assert!(decoder.receive_part(part));
        }
        assert_eq!(decoder.result(), Some(expected_json()));
    }

    #[test]
    fn test_missing_part() {
        let parts = json_parts();
        assert!(parts.len() > 1);
        let mut decoder = Decoder::new();
        for part in &parts[1..] {
            assert!(decoder.receive_part(part));
        }
        assert_eq!(decoder.result(), None);
        assert!(!decoder.is_complete());
        assert_eq!(decoder.processed_parts_count(), parts.len() - 1);
        assert_eq!(decoder.expected_part_count(), parts.len());
    }

    #[test]
    fn test_duplicates_rejected() {
        let parts = json_parts();
        let mut decoder = Decoder::new();
        assert!(decoder.receive_part(&parts[0]));
        assert!(!decoder.receive_part(&parts[0]));
        assert_eq!(decoder.processed_parts_count(), 1);
        for part in &parts[1..] {
            assert!(decoder.receive_part(part));
        }
        assert!(!decoder.receive_part(&parts[1]));
        assert_eq!(decoder.result(), Some(expected_json()));
    }

    #[test]
    fn test_foreign_strings_ignored() {
        let parts = json_parts();
        let mut decoder = Decoder::new();
        assert!(!decoder.receive_part("https://example.com"));
        assert!(!decoder.receive_part("B$"));
        for part in &parts {
            assert!(!decoder.receive_part("UR:BYTES/1-2/LPADAO"));
            assert!(decoder.receive_part(part));
        }
        assert_eq!(decoder.result(), Some(expected_json()));
    }

    #[test]
    fn test_incompatible_transfer_ignored() {
        let parts = json_parts();
        let other = encode(&[7u8; 64], ContentType::Psbt, TransferEncoding::Hex, 20).unwrap();

        let mut decoder = Decoder::new();
        assert!(decoder.receive_part(&parts[0]));
        for part in other.all_parts() {
            assert!(!decoder.receive_part(part));
        }
        assert_eq!(decoder.processed_parts_count(), 1);
        for part in &parts[1..] {
            assert!(decoder.receive_part(part));
        }
        assert_eq!(decoder.result(), Some(expected_json()));
    }

    #[test]
    fn test_mismatched_total_ignored() {
        let mut decoder = Decoder::new();
        assert!(decoder.receive_part("B$2B0200MZXW"));
        assert!(!decoder.receive_part("B$2B0301MZXW"));
        assert_eq!(decoder.processed_parts_count(), 1);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut decoder = Decoder::new();
        assert!(!decoder.receive_part("B$2B0202MZXW"));
        assert_eq!(decoder.expected_part_count(), 0);
        assert!(decoder.receive_part("B$2B0200MZXW"));
        assert!(!decoder.receive_part("B$2B0205MZXW"));
        assert_eq!(decoder.processed_parts_count(), 1);
    }

    #[test]
    fn test_zero_total_rejected() {
        let mut decoder = Decoder::new();
        assert!(!decoder.receive_part("B$2B0000"));
        assert_eq!(decoder.expected_part_count(), 0);
    }

    #[test]
    fn test_max_parts_ceiling() {
        let mut decoder = Decoder::with_config(DecoderConfig {
            max_parts: 10,
            ..DecoderConfig::default()
        });
        assert!(!decoder.receive_part("B$2BZZ00MZXW"));
        assert_eq!(decoder.expected_part_count(), 0);
        assert!(decoder.receive_part("B$2B0A00MZXW"));
        assert_eq!(decoder.expected_part_count(), 10);
    }

    #[test]
    fn test_bad_base32_fails_transfer() {
        let mut decoder = Decoder::new();
        assert!(decoder.receive_part("B$2U0200MZ1"));
        assert!(decoder.receive_part("B$2U0201W"));
        let result = decoder.result().unwrap();
        assert!(matches!(
            result,
            Outcome::Failure {
                reason: FailureReason::BadEncoding(_)
            }
        ));
        assert!(!decoder.receive_part("B$2U0200MZXW"));
        assert_eq!(decoder.result(), Some(result));
    }

    #[test]
    fn test_line_endings_and_padding_tolerated() {
        let transfer = encode(
            b"hello bbqr payload",
            ContentType::Unicode,
            TransferEncoding::Plain,
            16,
        )
        .unwrap();
        let parts = transfer.all_parts();
        assert_eq!(parts.len(), 2);

        let mut decoder = Decoder::new();
        assert!(decoder.receive_part(&format!("{}\r\n", parts[0])));
        assert!(decoder.receive_part(&format!("{}====", parts[1])));
        assert_eq!(decoder.result().unwrap().text(), Some("hello bbqr payload"));
    }

    #[test]
    fn test_lowercase_body_accepted() {
        let mut decoder = Decoder::new();
        assert!(decoder.receive_part("B$2U0100nbswy3dp"));
        assert_eq!(decoder.result().unwrap().text(), Some("hello"));
    }

    #[test]
    fn test_payload_limit_fails_transfer() {
        let transfer = encode(
            &[0u8; 50_000],
            ContentType::Binary,
            TransferEncoding::Compressed,
            DEFAULT_FRAGMENT_LENGTH,
        )
        .unwrap();
        assert_eq!(transfer.encoding(), TransferEncoding::Compressed);

        let mut decoder = Decoder::with_config(DecoderConfig {
            max_payload_len: 1024,
            ..DecoderConfig::default()
        });
        for part in transfer.all_parts() {
            assert!(decoder.receive_part(part));
        }
        assert!(matches!(
            decoder.result(),
            Some(Outcome::Failure {
                reason: FailureReason::BadCompression(_)
            })
        ));
    }

    #[test]
    fn test_bad_deflate_fails_transfer() {
        // "AAAA" decodes to bytes that are not a complete deflate stream
        let mut decoder = Decoder::new();
        assert!(decoder.receive_part("B$ZB0100AAAA"));
        assert!(matches!(
            decoder.result(),
            Some(Outcome::Failure {
                reason: FailureReason::BadCompression(_)
            })
        ));
    }

    #[test]
    fn test_empty_compressed_fails() {
        let mut decoder = Decoder::new();
        assert!(decoder.receive_part("B$ZB0100"));
        assert_eq!(
            decoder.result(),
            Some(Outcome::Failure {
                reason: FailureReason::EmptyPayload
            })
        );
    }

    #[test]
    fn test_empty_plain_succeeds() {
        let mut decoder = Decoder::new();
        assert!(decoder.receive_part("B$2U0100"));
        assert_eq!(
            decoder.result(),
            Some(Outcome::Success {
                data: Bytes::new(),
                content_type: ContentType::Unicode,
            })
        );
    }

    #[test]
    fn test_result_is_idempotent() {
        let parts = json_parts();
        let mut decoder = Decoder::new();
        for part in &parts {
            decoder.receive_part(part);
        }
        let first = decoder.result();
        assert!(first.is_some());
        assert_eq!(decoder.result(), first);
        assert_eq!(decoder.result(), first);
    }

    #[test]
    fn test_progress_and_reset() {
        let parts = json_parts();
        let mut decoder = Decoder::new();
        assert_eq!(decoder.percent_complete(), 0.0);
        decoder.receive_part(&parts[0]);
        let expected = 1.0 / parts.len() as f64;
        assert!((decoder.percent_complete() - expected).abs() < f64::EPSILON);

        decoder.reset();
        assert_eq!(decoder.processed_parts_count(), 0);
        assert_eq!(decoder.expected_part_count(), 0);
        assert_eq!(decoder.result(), None);

        for part in &parts {
            assert!(decoder.receive_part(part));
        }
        assert_eq!(decoder.percent_complete(), 1.0);
        assert_eq!(decoder.result(), Some(expected_json()));
    }

    #[test]
    fn test_binary_outcome_has_no_text() {
        let transfer = encode(&[0xff, 0xfe], ContentType::Psbt, TransferEncoding::Plain, 10).unwrap();
        let mut decoder = Decoder::new();
        decoder.receive_part(&transfer.all_parts()[0]);
        let result = decoder.result().unwrap();
        assert!(result.is_success());
        assert_eq!(result.text(), None);
    }
}
