//! Recursive ZIP/RAR extraction with legacy encoding repair
//!
//! Archives made on Japanese (and other non-UTF-8) systems often carry
//! filenames in a legacy code page without saying so, and text files inside
//! them in the same code page. This crate walks a directory tree, extracts
//! every ZIP and RAR archive it finds, recovers the real filenames, and
//! optionally re-encodes text content to UTF-8 on the fly.

pub mod archive;
pub mod args;
pub mod dejizz;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod linux;
pub mod planner;
pub mod prompt;
pub mod utils;
pub mod walk;

#[cfg(test)]
mod test_support;

pub use archive::{ArchiveKind, ArchiveReader, MemberEntry, MemberSet, open_archive};
pub use args::Args;
pub use dejizz::{DejizzFilter, DejizzState};
pub use encoding::{ChardetOracle, EncodingOracle};
pub use error::{ExtractError, Result};
pub use extract::{ArchiveOutcome, ArchiveStats, ExtractOptions, Extractor, RunSummary};
pub use planner::{ConflictDecision, DecisionProvider};
pub use prompt::InteractivePrompt;
pub use utils::format_size;
