//! Text encoding detection and lossy decoding
//!
//! Detection is consumed through the [`EncodingOracle`] trait so the filename
//! recovery and content transcoding code can be exercised with a fixed answer.
//! The shipped oracle wraps `chardetng`, Firefox's legacy-encoding detector.
//!
//! Decoding here always uses "ignore" semantics: malformed byte sequences are
//! dropped instead of being replaced with U+FFFD or reported as errors.

use chardetng::EncodingDetector;
use encoding_rs::{DecoderResult, Encoding, SHIFT_JIS, UTF_8};

/// Encoding assumed when the oracle has no confident guess.
///
/// The archivers that omit the ZIP UTF-8 flag were overwhelmingly Japanese
/// Windows tools writing Shift_JIS.
pub const FALLBACK_ENCODING: &Encoding = SHIFT_JIS;

/// Encoding that transcoded text is written in.
pub const TARGET_ENCODING: &Encoding = UTF_8;

/// Source of encoding guesses for raw bytes.
pub trait EncodingOracle {
    /// Guess the encoding of `bytes`, or `None` without a confident guess.
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding>;
}

/// Oracle backed by `chardetng`.
///
/// Empty input yields no guess. Pure ASCII is reported as UTF-8 since every
/// ASCII-compatible encoding decodes it identically. A guess that cannot decode
/// the very bytes it was made from is discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChardetOracle;

impl EncodingOracle for ChardetOracle {
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        if bytes.is_empty() {
            return None;
        }
        if bytes.is_ascii() {
            return Some(UTF_8);
        }

        let mut detector = EncodingDetector::new();
        // Not the end of the stream: the input may be a prefix
        detector.feed(bytes, false);
        let guess = detector.guess(None, true);

        decodes_cleanly(guess, bytes).then_some(guess)
    }
}

/// Whether `bytes` decode without malformed sequences. A sequence cut off at
/// the end of `bytes` is allowed, since callers often pass a truncated prefix.
fn decodes_cleanly(encoding: &'static Encoding, bytes: &[u8]) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(bytes.len())
        .unwrap_or(bytes.len() * 3 + 16);
    let mut out = String::with_capacity(capacity);
    let (result, _) = decoder.decode_to_string_without_replacement(bytes, &mut out, false);
    matches!(result, DecoderResult::InputEmpty)
}

impl<T: EncodingOracle + ?Sized> EncodingOracle for &T {
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        (**self).detect(bytes)
    }
}

impl<T: EncodingOracle + ?Sized> EncodingOracle for Box<T> {
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        (**self).detect(bytes)
    }
}

/// Decode `bytes` as `encoding`, silently dropping malformed sequences.
pub fn decode_ignore(encoding: &'static Encoding, bytes: &[u8]) -> String {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let mut out = String::with_capacity(bytes.len());
    let mut src = bytes;

    loop {
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(src.len())
            .unwrap_or(src.len() * 3 + 16);
        out.reserve(needed);

        let (result, read) = decoder.decode_to_string_without_replacement(src, &mut out, true);
        src = &src[read..];

        match result {
            DecoderResult::InputEmpty => break,
            DecoderResult::OutputFull | DecoderResult::Malformed(..) => continue,
        }
    }

    out
}

/// Oracle returning a preset answer regardless of input.
#[cfg(test)]
pub(crate) struct FixedOracle(pub Option<&'static Encoding>);

#[cfg(test)]
impl EncodingOracle for FixedOracle {
    fn detect(&self, _bytes: &[u8]) -> Option<&'static Encoding> {
        self.0
    }
}
