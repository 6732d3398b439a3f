//! Extraction destination planning
//!
//! Decides where an archive's members land:
//!
//! - **Single-root collapse**: an archive holding one file, or whose members all
//!   live under one top-level directory, is extracted straight into the
//!   directory containing the archive. Anything else gets a new directory named
//!   after the archive.
//! - **Collision-safe naming**: a new extraction root that already exists gets a
//!   `_2`, `_3`, ... suffix. Renamed files get the suffix on their stem, so the
//!   extension survives (`notes_2.txt`).
//! - **Conflict resolution**: existing destination files are skipped,
//!   overwritten or renamed according to a preset [`ConflictDecision`], or a
//!   [`DecisionProvider`] is asked per file.
//! - **Length truncation**: an optional byte limit cuts the destination path at
//!   a UTF-8 character boundary.
//!
//! # Examples
//!
//! ```
//! use ejzip::planner::{truncate_utf8, unique_file_path};
//! use std::path::Path;
//!
//! assert_eq!(truncate_utf8("日本語", 7), "日本");
//! // Nothing exists at this path, so it is returned unchanged
//! let path = unique_file_path(Path::new("/nonexistent/dir/notes.txt"));
//! assert_eq!(path, Path::new("/nonexistent/dir/notes.txt"));
//! ```

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::archive::MemberSet;

/// What to do when a destination file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictDecision {
    /// Keep the existing file and move on
    Skip,
    /// Truncate and rewrite the existing file
    Overwrite,
    /// Write next to it under a numbered name
    Rename,
    /// Ask the decision provider for each conflict
    #[default]
    AskUser,
}

impl ConflictDecision {
    /// Parse a user answer: `s`, `o`, `r` or the full word, case-insensitive
    pub fn parse_choice(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "s" | "skip" => Some(Self::Skip),
            "o" | "overwrite" => Some(Self::Overwrite),
            "r" | "rename" => Some(Self::Rename),
            _ => None,
        }
    }
}

/// Source of per-file conflict decisions when no policy is preset
pub trait DecisionProvider {
    /// Decide what to do about `dest`, which already exists.
    ///
    /// Returning [`ConflictDecision::AskUser`] is treated as a skip.
    fn decide(&mut self, dest: &Path) -> ConflictDecision;
}

impl<F: FnMut(&Path) -> ConflictDecision> DecisionProvider for F {
    fn decide(&mut self, dest: &Path) -> ConflictDecision {
        self(dest)
    }
}

/// Whether every member shares one top-level entry
pub fn is_single_root(members: &MemberSet) -> bool {
    if members.len() == 1 {
        return true;
    }

    let roots: HashSet<&str> = members
        .names()
        .map(|name| name.split_once('/').map_or(name, |(top, _)| top))
        .collect();
    roots.len() <= 1
}

/// Directory to extract an archive's members into.
///
/// Single-root archives extract into `parent`; others into a fresh directory
/// named after the archive's file stem.
pub fn extraction_root(parent: &Path, archive_path: &Path, members: &MemberSet) -> PathBuf {
    if is_single_root(members) {
        return parent.to_path_buf();
    }

    let stem = archive_path
        .file_stem()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("extracted"));
    unique_dir_path(&parent.join(stem))
}

/// First of `path`, `path_2`, `path_3`, ... that does not exist
pub fn unique_dir_path(path: &Path) -> PathBuf {
    first_free(path, |n| {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!("_{n}"));
        PathBuf::from(name)
    })
}

/// First of `name.ext`, `name_2.ext`, `name_3.ext`, ... that does not exist
pub fn unique_file_path(path: &Path) -> PathBuf {
    let (Some(stem), Some(parent)) = (path.file_stem(), path.parent()) else {
        return unique_dir_path(path);
    };

    first_free(path, |n| {
        let mut name = stem.to_os_string();
        name.push(format!("_{n}"));
        if let Some(ext) = path.extension() {
            name.push(".");
            name.push(ext);
        }
        parent.join(name)
    })
}

fn first_free(path: &Path, numbered: impl Fn(u32) -> PathBuf) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    (2..)
        .map(numbered)
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Destination of `member` under `root`.
///
/// With a length limit the *whole path* is truncated, parent directories
/// included. Long extraction roots can therefore eat into member names.
/// A path that is not valid UTF-8 is returned untruncated.
pub fn destination_path(root: &Path, member: &str, max_bytes: Option<usize>) -> PathBuf {
    let dest = root.join(member);
    match (max_bytes, dest.to_str()) {
        (Some(limit), Some(full)) => PathBuf::from(truncate_utf8(full, limit)),
        _ => dest,
    }
}

/// Whether a member name stays inside the extraction root
pub fn is_enclosed(member: &str) -> bool {
    !member.is_empty()
        && Path::new(member)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Resolve a possible collision at `dest`.
///
/// Returns the path to write, or `None` when the member should be skipped.
pub fn resolve_conflict(
    dest: PathBuf,
    policy: ConflictDecision,
    provider: &mut dyn DecisionProvider,
) -> Option<PathBuf> {
    if !dest.exists() {
        return Some(dest);
    }

    let decision = match policy {
        ConflictDecision::AskUser => provider.decide(&dest),
        preset => preset,
    };

    match decision {
        ConflictDecision::Overwrite => Some(dest),
        ConflictDecision::Rename => Some(unique_file_path(&dest)),
        ConflictDecision::Skip | ConflictDecision::AskUser => None,
    }
}
