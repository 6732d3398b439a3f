//! ZIP reader with legacy filename recovery
//!
//! ZIP entries carry a general purpose flag bit saying "this name is UTF-8".
//! Writers that predate it (or ignore it) stored names in whatever code page
//! the host system used, most often Shift_JIS, and readers that follow the
//! ZIP format decode those bytes as code page 437, producing mojibake.
//!
//! Recovery works archive-wide: the raw name bytes of every unflagged entry are
//! concatenated and handed to the encoding oracle in one go, because a single
//! short filename carries too little signal. Every unflagged name is then
//! decoded with that one guess (or Shift_JIS without a guess), dropping bytes
//! that do not decode. Flagged names are used as-is.
//!
//! Detection stays weak for archives with very few or very short names. That is
//! a known limitation and not compensated for.

use ::zip::ZipArchive;
use encoding_rs::Encoding;
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{ArchiveKind, ArchiveReader, MemberEntry, MemberSet};
use crate::encoding::{ChardetOracle, EncodingOracle, FALLBACK_ENCODING, decode_ignore};
use crate::error::{ExtractError, Result};
use crate::linux::{advise_sequential_read, map_archive};
use crate::utils::datetime_to_filetime;

/// Archives above this size are memory-mapped instead of read through the file
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// General purpose flag bit marking an entry name as UTF-8
const UTF8_NAME_FLAG: u16 = 1 << 11;

/// Offset of the general purpose flags within a central directory record
const CENTRAL_FLAGS_OFFSET: u64 = 8;

/// Backing storage of an opened ZIP file
pub enum ZipSource {
    Mapped(Cursor<Mmap>),
    File(File),
}

impl Read for ZipSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Mapped(cursor) => cursor.read(buf),
            Self::File(file) => file.read(buf),
        }
    }
}

impl Seek for ZipSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Mapped(cursor) => cursor.seek(pos),
            Self::File(file) => file.seek(pos),
        }
    }
}

pub struct ZipReader<R = ZipSource> {
    path: PathBuf,
    archive: ZipArchive<R>,
    members: MemberSet,
    indices: HashMap<String, usize>,
    filename_encoding: &'static Encoding,
}

impl ZipReader<ZipSource> {
    /// Open a ZIP file, guessing legacy filename encodings with `chardetng`
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_oracle(path, &ChardetOracle)
    }

    pub fn open_with_oracle(path: &Path, oracle: &dyn EncodingOracle) -> Result<Self> {
        let open_err = |source| ExtractError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_err)?;
        let file_size = file.metadata().map_err(open_err)?.len();

        advise_sequential_read(&file, file_size);

        let source = if file_size > MMAP_THRESHOLD {
            ZipSource::Mapped(Cursor::new(map_archive(&file).map_err(open_err)?))
        } else {
            ZipSource::File(file)
        };

        Self::from_reader(path, source, oracle)
    }
}

/// Metadata of one central directory entry before name recovery
struct StoredEntry {
    index: usize,
    raw_name: Vec<u8>,
    is_utf8_flagged: bool,
    size: u64,
    modified: Option<filetime::FileTime>,
}

impl<R: Read + Seek> ZipReader<R> {
    /// Read the central directory of `reader` and recover member names.
    ///
    /// `path` is only used to label errors and diagnostics.
    pub fn from_reader(path: &Path, reader: R, oracle: &dyn EncodingOracle) -> Result<Self> {
        let format_err = |e: &dyn std::fmt::Display| ExtractError::format("ZIP", path, e);

        let mut archive = ZipArchive::new(reader).map_err(|e| format_err(&e))?;
        let mut stored = Vec::with_capacity(archive.len());
        let mut central_starts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(|e| format_err(&e))?;
            let raw_name = file.name_raw().to_vec();
            // An Info-ZIP Unicode Path field replaces the raw name with UTF-8;
            // the crate then reports it verbatim while unflagged non-ASCII
            // names come back CP437-decoded
            let has_unicode_path = !raw_name.is_ascii() && file.name().as_bytes() == raw_name;
            central_starts.push(file.central_header_start());
            stored.push(StoredEntry {
                index,
                raw_name,
                is_utf8_flagged: has_unicode_path,
                size: file.size(),
                modified: file.last_modified().map(datetime_to_filetime),
            });
        }

        // The crate does not expose general purpose flags, so bit 11 is read
        // from the central directory records directly
        let mut reader = archive.into_inner();
        let flags =
            read_central_flags(&mut reader, &central_starts).map_err(|e| format_err(&e))?;
        for (entry, flags) in stored.iter_mut().zip(flags) {
            entry.is_utf8_flagged |= flags & UTF8_NAME_FLAG != 0;
        }
        let archive = ZipArchive::new(reader).map_err(|e| format_err(&e))?;

        let filename_encoding = detect_filename_encoding(
            oracle,
            stored
                .iter()
                .filter(|e| !e.is_utf8_flagged)
                .map(|e| e.raw_name.as_slice()),
        );
        debug!(
            archive = %path.display(),
            encoding = filename_encoding.name(),
            "resolved legacy filename encoding"
        );

        let mut members = MemberSet::new();
        let mut indices = HashMap::new();
        for entry in stored {
            let resolved_name =
                resolve_name(&entry.raw_name, entry.is_utf8_flagged, filename_encoding);
            if resolved_name.is_empty() || resolved_name.ends_with('/') {
                continue;
            }

            let member = MemberEntry {
                raw_name: entry.raw_name,
                resolved_name: resolved_name.clone(),
                is_utf8_flagged: entry.is_utf8_flagged,
                size_hint: Some(entry.size),
                modified: entry.modified,
            };
            if members.insert(member) {
                indices.insert(resolved_name, entry.index);
            } else {
                warn!(
                    archive = %path.display(),
                    member = %resolved_name,
                    "duplicate member name after recovery, keeping the first"
                );
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            members,
            indices,
            filename_encoding,
        })
    }

    /// Encoding used for names stored without the UTF-8 flag
    pub fn filename_encoding(&self) -> &'static Encoding {
        self.filename_encoding
    }
}

impl<R: Read + Seek> ArchiveReader for ZipReader<R> {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Zip
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn list_members(&self) -> &MemberSet {
        &self.members
    }

    fn open_member(&mut self, resolved_name: &str) -> Result<Box<dyn Read + '_>> {
        let index = *self
            .indices
            .get(resolved_name)
            .ok_or_else(|| ExtractError::MemberNotFound {
                name: resolved_name.to_string(),
            })?;

        let file = self
            .archive
            .by_index(index)
            .map_err(|e| ExtractError::member(resolved_name, io::Error::other(e)))?;
        Ok(Box::new(file))
    }
}

/// Read the general purpose flag word of each central directory record
fn read_central_flags<R: Read + Seek>(
    reader: &mut R,
    central_starts: &[u64],
) -> io::Result<Vec<u16>> {
    central_starts
        .iter()
        .map(|&start| {
            reader.seek(SeekFrom::Start(start + CENTRAL_FLAGS_OFFSET))?;
            let mut word = [0u8; 2];
            reader.read_exact(&mut word)?;
            Ok(u16::from_le_bytes(word))
        })
        .collect()
}

/// Guess one encoding for all legacy-named entries of an archive.
///
/// The names are concatenated so short names still give the oracle enough
/// bytes to work with. Falls back to Shift_JIS without a guess.
pub fn detect_filename_encoding<'a>(
    oracle: &dyn EncodingOracle,
    raw_names: impl IntoIterator<Item = &'a [u8]>,
) -> &'static Encoding {
    let concatenated: Vec<u8> = raw_names.into_iter().flatten().copied().collect();
    oracle.detect(&concatenated).unwrap_or(FALLBACK_ENCODING)
}

/// Resolve a stored ZIP name to Unicode.
///
/// Flagged names are plain UTF-8. Unflagged names are the legacy bytes as
/// written; decoding them from CP437 and re-encoding gives the same bytes back,
/// so they are decoded directly with the archive's legacy encoding.
pub fn resolve_name(raw_name: &[u8], is_utf8_flagged: bool, legacy: &'static Encoding) -> String {
    if is_utf8_flagged {
        String::from_utf8_lossy(raw_name).into_owned()
    } else {
        decode_ignore(legacy, raw_name)
    }
}
