//! Streaming content transcoding ("dejizz")
//!
//! A [`DejizzFilter`] converts one file's content from whatever legacy encoding
//! it was written in to UTF-8, one chunk at a time. The encoding is guessed from
//! the start of the first chunk only and then locked for the rest of the file,
//! so every chunk of a member decodes the same way even if a later chunk, seen
//! in isolation, would look like something else.
//!
//! Chunks are decoded independently. A multi-byte sequence split across a
//! chunk boundary is malformed on both sides and gets dropped; with chunks in
//! the tens of megabytes this costs at most a character per boundary.

use encoding_rs::Encoding;

use crate::encoding::{EncodingOracle, FALLBACK_ENCODING, TARGET_ENCODING, decode_ignore};

/// Number of leading bytes of the first chunk shown to the oracle
pub const DETECTION_PREFIX: usize = 2048;

/// Detection state of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DejizzState {
    /// No chunk seen yet
    Undetected,
    /// Encoding fixed by the first chunk
    Locked(&'static Encoding),
}

pub struct DejizzFilter<O> {
    oracle: O,
    state: DejizzState,
    target: &'static Encoding,
    fallback: &'static Encoding,
}

impl<O: EncodingOracle> DejizzFilter<O> {
    /// Create a filter converting to UTF-8 with Shift_JIS as the fallback guess
    pub fn new(oracle: O) -> Self {
        Self::with_encodings(oracle, TARGET_ENCODING, FALLBACK_ENCODING)
    }

    pub fn with_encodings(
        oracle: O,
        target: &'static Encoding,
        fallback: &'static Encoding,
    ) -> Self {
        Self {
            oracle,
            state: DejizzState::Undetected,
            target,
            fallback,
        }
    }

    pub fn state(&self) -> DejizzState {
        self.state
    }

    /// The locked-in source encoding, once the first chunk has been seen
    pub fn detected_encoding(&self) -> Option<&'static Encoding> {
        match self.state {
            DejizzState::Undetected => None,
            DejizzState::Locked(encoding) => Some(encoding),
        }
    }

    /// Whether content passed through this filter was actually re-encoded
    pub fn converted(&self) -> bool {
        matches!(self.state, DejizzState::Locked(encoding) if encoding != self.target)
    }

    /// Transcode one chunk. Never fails; undecodable bytes are dropped.
    pub fn filter(&mut self, chunk: &[u8]) -> Vec<u8> {
        let source = self.lock(chunk);
        if source == self.target {
            return chunk.to_vec();
        }

        let text = decode_ignore(source, chunk);
        let (encoded, _, _) = self.target.encode(&text);
        encoded.into_owned()
    }

    fn lock(&mut self, chunk: &[u8]) -> &'static Encoding {
        match self.state {
            DejizzState::Locked(encoding) => encoding,
            DejizzState::Undetected => {
                let prefix = &chunk[..chunk.len().min(DETECTION_PREFIX)];
                let encoding = self.oracle.detect(prefix).unwrap_or(self.fallback);
                self.state = DejizzState::Locked(encoding);
                encoding
            },
        }
    }
}
