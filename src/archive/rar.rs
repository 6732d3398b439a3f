//! RAR reader backed by the `unrar` library
//!
//! RAR stores names as UTF-16 (RAR 2.9+) so no recovery is applied. The unrar
//! API only walks an archive front to back, so opening a member runs a
//! processing pass up to it and stages its content in a temporary file next to
//! the archive. The returned reader streams from that file and removes it when
//! dropped.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;

use super::{ArchiveKind, ArchiveReader, MemberEntry, MemberSet};
use crate::error::{ExtractError, Result};
use crate::utils::dos_timestamp_to_filetime;

pub struct RarReader {
    path: PathBuf,
    members: MemberSet,
    /// Resolved name -> filename as reported by unrar
    originals: std::collections::HashMap<String, PathBuf>,
}

impl RarReader {
    pub fn open(path: &Path) -> Result<Self> {
        let listing = unrar::Archive::new(path)
            .open_for_listing()
            .map_err(|e| ExtractError::format("RAR", path, e))?;

        let mut members = MemberSet::new();
        let mut originals = std::collections::HashMap::new();

        for header in listing {
            let header = header.map_err(|e| ExtractError::format("RAR", path, e))?;
            if header.is_directory() {
                continue;
            }

            let resolved_name = normalize_name(&header.filename);
            if resolved_name.is_empty() {
                continue;
            }

            let member = MemberEntry {
                raw_name: resolved_name.as_bytes().to_vec(),
                resolved_name: resolved_name.clone(),
                is_utf8_flagged: true,
                size_hint: Some(header.unpacked_size as u64),
                modified: dos_timestamp_to_filetime(header.file_time),
            };
            if members.insert(member) {
                originals.insert(resolved_name, header.filename.clone());
            } else {
                warn!(
                    archive = %path.display(),
                    member = %resolved_name,
                    "duplicate member name, keeping the first"
                );
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            members,
            originals,
        })
    }

    fn staging_dir(&self) -> io::Result<TempDir> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        tempfile::Builder::new().prefix(".ejzip-").tempdir_in(parent)
    }
}

impl ArchiveReader for RarReader {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Rar
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn list_members(&self) -> &MemberSet {
        &self.members
    }

    fn open_member(&mut self, resolved_name: &str) -> Result<Box<dyn Read + '_>> {
        let not_found = || ExtractError::MemberNotFound {
            name: resolved_name.to_string(),
        };
        let unrar_err = |e: unrar::error::UnrarError| {
            ExtractError::member(resolved_name, io::Error::other(e.to_string()))
        };

        let target = self.originals.get(resolved_name).ok_or_else(not_found)?;

        let mut cursor = unrar::Archive::new(&self.path)
            .open_for_processing()
            .map_err(unrar_err)?;

        loop {
            let Some(entry) = cursor.read_header().map_err(unrar_err)? else {
                return Err(not_found());
            };

            let header = entry.entry();
            if header.is_file() && header.filename == *target {
                let dir = self
                    .staging_dir()
                    .map_err(|e| ExtractError::member(resolved_name, e))?;
                let staged = dir.path().join("member");
                entry.extract_to(&staged).map_err(unrar_err)?;

                let file =
                    File::open(&staged).map_err(|e| ExtractError::member(resolved_name, e))?;
                return Ok(Box::new(StagedMember { file, _dir: dir }));
            }

            cursor = entry.skip().map_err(unrar_err)?;
        }
    }
}

/// A member extracted to a temporary directory that is removed on drop
struct StagedMember {
    file: File,
    _dir: TempDir,
}

impl Read for StagedMember {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Join the normal components of a RAR filename with `/`
fn normalize_name(filename: &Path) -> String {
    filename
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
