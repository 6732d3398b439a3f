//! Uniform read access to ZIP and RAR archives
//!
//! Every format is exposed through [`ArchiveReader`]: the member list is built
//! once when the archive is opened, and members are opened by their resolved
//! (Unicode) name. Format-specific details such as ZIP filename recovery stay
//! inside the format's implementation; callers never branch on the format.
//!
//! Readers release their underlying file when dropped, so an early return in
//! the middle of an extraction still closes the archive.

pub mod rar;
pub mod zip;

use filetime::FileTime;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::encoding::EncodingOracle;
use crate::error::Result;

pub use self::rar::RarReader;
pub use self::zip::ZipReader;

/// One file inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    /// Name bytes as stored in the archive
    pub raw_name: Vec<u8>,
    /// Unicode name after any encoding recovery
    pub resolved_name: String,
    /// Whether the format marked the stored name as UTF-8
    pub is_utf8_flagged: bool,
    /// Uncompressed size, when the format records it
    pub size_hint: Option<u64>,
    /// Modification time recorded in the archive
    pub modified: Option<FileTime>,
}

/// The extractable members of one archive, keyed by resolved name
///
/// Directory entries are never part of the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberSet {
    entries: BTreeMap<String, MemberEntry>,
}

impl MemberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Returns `false` and keeps the existing entry when another
    /// member already resolved to the same name.
    pub fn insert(&mut self, entry: MemberEntry) -> bool {
        if self.entries.contains_key(&entry.resolved_name) {
            return false;
        }
        self.entries.insert(entry.resolved_name.clone(), entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MemberEntry> {
        self.entries.get(name)
    }

    /// Resolved names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemberEntry> {
        self.entries.values()
    }
}

impl FromIterator<MemberEntry> for MemberSet {
    fn from_iter<I: IntoIterator<Item = MemberEntry>>(iter: I) -> Self {
        let mut set = MemberSet::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Rar,
}

impl ArchiveKind {
    /// Determine the format from a file extension, case-insensitively
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Zip => "ZIP",
            Self::Rar => "RAR",
        }
    }
}

/// Read access to an opened archive
pub trait ArchiveReader {
    fn kind(&self) -> ArchiveKind;

    /// Path of the archive file
    fn path(&self) -> &Path;

    /// Members computed when the archive was opened
    fn list_members(&self) -> &MemberSet;

    /// Open a member for streaming by its resolved name
    fn open_member(&mut self, resolved_name: &str) -> Result<Box<dyn Read + '_>>;

    /// Release the archive. Dropping the reader has the same effect.
    fn close(self: Box<Self>) {}
}

/// Open `path` with the reader matching its extension.
///
/// `oracle` is used by formats that need to guess a legacy filename encoding.
/// Returns `Ok(None)` when the extension is not a supported archive format.
pub fn open_archive(
    path: &Path,
    oracle: &dyn EncodingOracle,
) -> Result<Option<Box<dyn ArchiveReader>>> {
    let reader: Box<dyn ArchiveReader> = match ArchiveKind::from_path(path) {
        Some(ArchiveKind::Zip) => Box::new(ZipReader::open_with_oracle(path, oracle)?),
        Some(ArchiveKind::Rar) => Box::new(RarReader::open(path)?),
        None => return Ok(None),
    };
    Ok(Some(reader))
}
