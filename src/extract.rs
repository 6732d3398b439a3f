//! Archive extraction engine
//!
//! [`Extractor`] drives one archive at a time through the same steps:
//!
//! 1. open the archive with the reader for its format,
//! 2. take the member list (an empty list skips the archive),
//! 3. pick the extraction root (single-root collapse or a new directory),
//! 4. for every member: resolve and truncate the destination, settle any
//!    collision, create parent directories, then stream the content in fixed
//!    size chunks, through a [`DejizzFilter`] for allow-listed text extensions.
//!
//! A member that fails is logged and counted; the remaining members of the
//! archive are still extracted. An archive that cannot be opened is logged and
//! counted by [`Extractor::run`], which then moves on to the next candidate.
//! Nothing is retried and nothing is atomic: an interrupted run leaves
//! partially written files behind.
//!
//! # Examples
//!
//! ```no_run
//! use ejzip::{ChardetOracle, ConflictDecision, ExtractOptions, Extractor};
//! use std::path::Path;
//!
//! let options = ExtractOptions {
//!     conflict: ConflictDecision::Rename,
//!     ..Default::default()
//! };
//! let never_asked = |_: &Path| ConflictDecision::Skip;
//! let mut extractor = Extractor::new(options, ChardetOracle, never_asked);
//! let summary = extractor.run(Path::new("downloads"))?;
//! println!("{} files extracted", summary.files_extracted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::archive::{ArchiveReader, MemberEntry, open_archive};
use crate::dejizz::DejizzFilter;
use crate::encoding::EncodingOracle;
use crate::error::{ExtractError, Result};
use crate::linux::{release_cache, reserve_space};
use crate::planner::{
    ConflictDecision, DecisionProvider, destination_path, extraction_root, is_enclosed,
    resolve_conflict,
};
use crate::utils::format_size;
use crate::walk::find_archives;

/// Default streaming chunk size (30 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 30 * 1024 * 1024;

/// Buffer size for file output (256KB for better throughput)
const BUFFER_SIZE: usize = 256 * 1024;

/// Extensions whose content is transcoded by default
pub const DEFAULT_DEJIZZ_EXTENSIONS: &[&str] = &["txt", "csv", "tsv"];

/// Settings for an extraction run
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Lowercase extensions, without the dot, whose content is transcoded
    pub dejizz_extensions: HashSet<String>,
    /// Transcode content at all
    pub dejizz: bool,
    /// Preset answer for destination collisions
    pub conflict: ConflictDecision,
    /// Maximum destination path length in UTF-8 bytes
    pub filename_length: Option<usize>,
    /// Bytes read from a member per chunk
    pub chunk_size: usize,
    /// Restore member modification times recorded in the archive
    pub restore_timestamps: bool,
    /// Delete each archive after it was extracted without member failures
    pub delete_archives: bool,
    /// Print every member mapping and conversion
    pub verbose: bool,
    /// Quiet level (0 = progress and summaries, 1+ = silent)
    pub quiet: u8,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            dejizz_extensions: DEFAULT_DEJIZZ_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            dejizz: true,
            conflict: ConflictDecision::AskUser,
            filename_length: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            restore_timestamps: true,
            delete_archives: false,
            verbose: false,
            quiet: 0,
        }
    }
}

impl ExtractOptions {
    /// Whether the content of `member` should go through the dejizz filter
    pub fn should_dejizz(&self, member: &str) -> bool {
        self.dejizz
            && Path::new(member)
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.dejizz_extensions.contains(&ext.to_ascii_lowercase()))
    }
}

/// Counters for one extracted archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Directory the members were extracted under
    pub root: PathBuf,
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Members whose content was re-encoded
    pub converted: usize,
    pub bytes: u64,
}

/// Result of processing one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The archive had no extractable members
    Empty,
    /// The file extension is not a supported archive format
    Unsupported,
    Extracted(ArchiveStats),
}

/// Totals over a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub archives_found: usize,
    pub archives_extracted: usize,
    pub archives_empty: usize,
    pub archives_failed: usize,
    pub archives_deleted: usize,
    pub files_extracted: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub files_converted: usize,
    pub bytes: u64,
}

impl RunSummary {
    fn record(&mut self, stats: &ArchiveStats) {
        self.archives_extracted += 1;
        self.files_extracted += stats.extracted;
        self.files_skipped += stats.skipped;
        self.files_failed += stats.failed;
        self.files_converted += stats.converted;
        self.bytes += stats.bytes;
    }
}

/// What happened to a single member
enum MemberOutcome {
    Written { bytes: u64, converted: bool },
    Skipped,
}

/// Extracts archives with an encoding oracle and a conflict decision provider
pub struct Extractor<O, P> {
    options: ExtractOptions,
    oracle: O,
    provider: P,
}

impl<O: EncodingOracle, P: DecisionProvider> Extractor<O, P> {
    pub fn new(options: ExtractOptions, oracle: O, provider: P) -> Self {
        Self {
            options,
            oracle,
            provider,
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract every archive found under `source` (or `source` itself when it
    /// is a file).
    ///
    /// Only a missing or unreadable `source` is an error. Archives that fail
    /// to open are logged and counted in the summary.
    pub fn run(&mut self, source: &Path) -> Result<RunSummary> {
        let archives = find_archives(source)?;
        let mut summary = RunSummary {
            archives_found: archives.len(),
            ..Default::default()
        };
        info!(source = %source.display(), count = archives.len(), "found archives");

        for archive in &archives {
            match self.extract_archive(archive) {
                Ok(ArchiveOutcome::Extracted(stats)) => {
                    summary.record(&stats);
                    if self.options.delete_archives && stats.failed == 0 {
                        self.delete_archive(archive, &mut summary);
                    }
                },
                Ok(ArchiveOutcome::Empty) => summary.archives_empty += 1,
                Ok(ArchiveOutcome::Unsupported) => {},
                Err(e) => {
                    warn!(archive = %archive.display(), error = %e, "skipping archive");
                    if self.options.quiet == 0 {
                        eprintln!("error: {}", e);
                    }
                    summary.archives_failed += 1;
                },
            }
        }

        Ok(summary)
    }

    fn delete_archive(&self, archive: &Path, summary: &mut RunSummary) {
        if self.options.verbose {
            println!("deleting {}", archive.display());
        }
        match fs::remove_file(archive) {
            Ok(()) => summary.archives_deleted += 1,
            Err(e) => warn!(archive = %archive.display(), error = %e, "failed to delete archive"),
        }
    }

    /// Open and extract one archive file
    pub fn extract_archive(&mut self, path: &Path) -> Result<ArchiveOutcome> {
        let Some(mut reader) = open_archive(path, &self.oracle)? else {
            return Ok(ArchiveOutcome::Unsupported);
        };
        let outcome = self.extract_from(reader.as_mut());
        reader.close();
        outcome
    }

    /// Extract every member of an already opened archive.
    ///
    /// The extraction root is resolved relative to the directory containing
    /// `reader.path()`.
    pub fn extract_from(&mut self, reader: &mut dyn ArchiveReader) -> Result<ArchiveOutcome> {
        let archive_path = reader.path().to_path_buf();
        let members: Vec<MemberEntry> = reader.list_members().iter().cloned().collect();

        if members.is_empty() {
            debug!(archive = %archive_path.display(), "no extractable members, skipping");
            return Ok(ArchiveOutcome::Empty);
        }

        let parent = archive_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let root = extraction_root(parent, &archive_path, reader.list_members());
        debug!(
            archive = %archive_path.display(),
            kind = reader.kind().label(),
            root = %root.display(),
            members = members.len(),
            "extracting archive"
        );

        let progress_bar = if self.options.quiet == 0 {
            let pb = ProgressBar::new(members.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut stats = ArchiveStats {
            root: root.clone(),
            ..Default::default()
        };
        let mut buffer = vec![0u8; self.options.chunk_size.max(1)];

        for member in &members {
            let result = self.extract_member(
                reader,
                member,
                &archive_path,
                &root,
                &mut buffer,
                progress_bar.as_ref(),
            );

            match result {
                Ok(MemberOutcome::Written { bytes, converted }) => {
                    stats.extracted += 1;
                    stats.bytes += bytes;
                    if converted {
                        stats.converted += 1;
                    }
                },
                Ok(MemberOutcome::Skipped) => stats.skipped += 1,
                // The archive itself is unreadable; the remaining members would fail too
                Err(e) if !e.is_member_scoped() => {
                    if let Some(ref pb) = progress_bar {
                        pb.finish_and_clear();
                    }
                    return Err(e);
                },
                Err(e) => {
                    warn!(
                        archive = %archive_path.display(),
                        member = %member.resolved_name,
                        error = %e,
                        "member extraction failed"
                    );
                    if self.options.quiet < 2 {
                        report(progress_bar.as_ref(), format!("    error: {}", e));
                    }
                    stats.failed += 1;
                },
            }

            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }

        info!(
            archive = %archive_path.display(),
            extracted = stats.extracted,
            skipped = stats.skipped,
            failed = stats.failed,
            "archive done"
        );
        if self.options.quiet == 0 {
            println!(
                "Extracted {} files ({}) from {} to {}",
                stats.extracted,
                format_size(stats.bytes),
                archive_path.display(),
                root.display()
            );
            if stats.skipped > 0 {
                println!("Skipped {} files", stats.skipped);
            }
        }

        Ok(ArchiveOutcome::Extracted(stats))
    }

    fn extract_member(
        &mut self,
        reader: &mut dyn ArchiveReader,
        member: &MemberEntry,
        archive_path: &Path,
        root: &Path,
        buffer: &mut [u8],
        progress_bar: Option<&ProgressBar>,
    ) -> Result<MemberOutcome> {
        let name = member.resolved_name.as_str();

        if !is_enclosed(name) {
            warn!(member = name, "member path escapes the extraction root, skipping");
            return Ok(MemberOutcome::Skipped);
        }

        let dest = destination_path(root, name, self.options.filename_length);
        if self.options.verbose {
            report(
                progress_bar,
                format!(
                    "extracting {}:{} -> {}",
                    archive_path.display(),
                    name,
                    dest.display()
                ),
            );
        }

        let policy = self.options.conflict;
        let resolved = {
            let provider = &mut self.provider;
            let mut ask = |existing: &Path| match progress_bar {
                Some(pb) => pb.suspend(|| provider.decide(existing)),
                None => provider.decide(existing),
            };
            resolve_conflict(dest, policy, &mut ask)
        };
        let Some(dest) = resolved else {
            debug!(member = name, "destination exists, skipping");
            return Ok(MemberOutcome::Skipped);
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractError::member(name, e))?;
        }

        let transcode = self.options.should_dejizz(name);
        let mut filter = transcode.then(|| DejizzFilter::new(&self.oracle));

        let mut input = reader.open_member(name)?;
        let outfile = File::create(&dest).map_err(|e| ExtractError::member(name, e))?;

        // Transcoded output length is unknown up front
        if !transcode && let Some(size) = member.size_hint {
            reserve_space(&outfile, size);
        }

        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, outfile);
        let bytes = stream_chunks(&mut input, &mut writer, buffer, filter.as_mut())
            .map_err(|e| ExtractError::member(name, e))?;
        let outfile = writer
            .into_inner()
            .map_err(|e| ExtractError::member(name, e.into_error()))?;

        release_cache(&outfile, bytes);
        drop(outfile);

        if self.options.restore_timestamps
            && let Some(mtime) = member.modified
        {
            filetime::set_file_mtime(&dest, mtime).ok();
        }

        let converted = filter.as_ref().is_some_and(|f| f.converted());
        if converted && self.options.verbose {
            let from = filter
                .as_ref()
                .and_then(|f| f.detected_encoding())
                .map_or("unknown", |enc| enc.name());
            report(progress_bar, format!("converted from {} to UTF-8: {}", from, name));
        }

        debug!(member = name, dest = %dest.display(), bytes, converted, "member extracted");
        Ok(MemberOutcome::Written { bytes, converted })
    }
}

/// Print a line without tearing the progress bar
fn report(progress_bar: Option<&ProgressBar>, line: String) {
    match progress_bar {
        Some(pb) => pb.println(line),
        None => println!("{}", line),
    }
}

/// Copy `input` to `output` in chunks of `buffer.len()` bytes, passing each
/// chunk through `filter` when given. Returns the number of bytes written.
pub fn stream_chunks<R, W, O>(
    input: &mut R,
    output: &mut W,
    buffer: &mut [u8],
    mut filter: Option<&mut DejizzFilter<O>>,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write,
    O: EncodingOracle,
{
    let mut written = 0u64;
    loop {
        let filled = fill_chunk(input, buffer)?;
        if filled == 0 {
            break;
        }
        let chunk = &buffer[..filled];

        match filter.as_deref_mut() {
            Some(filter) => {
                let converted = filter.filter(chunk);
                output.write_all(&converted)?;
                written += converted.len() as u64;
            },
            None => {
                output.write_all(chunk)?;
                written += filled as u64;
            },
        }

        if filled < buffer.len() {
            break;
        }
    }
    output.flush()?;
    Ok(written)
}

/// Read until `buffer` is full or the input is exhausted
fn fill_chunk<R: Read + ?Sized>(input: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match input.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveKind, MemberSet, ZipReader};
    use crate::encoding::FixedOracle;
    use crate::test_support::{RawEntry, create_raw_zip, create_test_zip};
    use encoding_rs::{SHIFT_JIS, UTF_8};
    use std::cell::Cell;
    use std::io::Cursor;

    fn quiet_options(conflict: ConflictDecision) -> ExtractOptions {
        ExtractOptions {
            conflict,
            quiet: 2,
            ..Default::default()
        }
    }

    fn never_asked(_: &Path) -> ConflictDecision {
        panic!("provider should not be consulted")
    }

    /// Write `zip` to `dir/name` and return its path
    fn write_archive(dir: &Path, name: &str, zip: Vec<u8>) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, zip).unwrap();
        path
    }

    fn extract_with(
        options: ExtractOptions,
        oracle: FixedOracle,
        archive: &Path,
    ) -> ArchiveOutcome {
        let mut extractor = Extractor::new(options, oracle, never_asked);
        extractor.extract_archive(archive).unwrap()
    }

    fn stats(outcome: ArchiveOutcome) -> ArchiveStats {
        match outcome {
            ArchiveOutcome::Extracted(stats) => stats,
            other => panic!("expected extraction, got {:?}", other),
        }
    }

    #[test]
    fn test_single_member_extracts_flat() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            "single.zip",
            create_test_zip(&[("readme.md", b"hello")]),
        );

        let stats = stats(extract_with(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(None),
            &archive,
        ));

        assert_eq!(stats.root, dir.path());
        assert_eq!(fs::read(dir.path().join("readme.md")).unwrap(), b"hello");
        assert!(!dir.path().join("single").exists());
    }

    #[test]
    fn test_shared_top_directory_extracts_into_parent() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            "bundle.zip",
            create_test_zip(&[("foo/", b""), ("foo/a.bin", b"a"), ("foo/sub/b.bin", b"b")]),
        );

        extract_with(quiet_options(ConflictDecision::Skip), FixedOracle(None), &archive);

        assert_eq!(fs::read(dir.path().join("foo/a.bin")).unwrap(), b"a");
        assert_eq!(fs::read(dir.path().join("foo/sub/b.bin")).unwrap(), b"b");
        assert!(!dir.path().join("bundle").exists());
    }

    #[test]
    fn test_mixed_top_segments_get_archive_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            "archive.zip",
            create_test_zip(&[("a/x", b"x"), ("b/y", b"y")]),
        );
        fs::create_dir(dir.path().join("archive")).unwrap();

        let stats = stats(extract_with(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(None),
            &archive,
        ));

        assert_eq!(stats.root, dir.path().join("archive_2"));
        assert_eq!(fs::read(dir.path().join("archive_2/a/x")).unwrap(), b"x");
        assert_eq!(fs::read(dir.path().join("archive_2/b/y")).unwrap(), b"y");
        assert_eq!(fs::read_dir(dir.path().join("archive")).unwrap().count(), 0);
    }

    #[test]
    fn test_rename_on_second_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            "notes.zip",
            create_test_zip(&[("name.ext", b"from archive")]),
        );
        fs::write(dir.path().join("name.ext"), b"original").unwrap();

        let stats = stats(extract_with(
            quiet_options(ConflictDecision::Rename),
            FixedOracle(None),
            &archive,
        ));

        assert_eq!(stats.extracted, 1);
        assert_eq!(fs::read(dir.path().join("name.ext")).unwrap(), b"original");
        assert_eq!(fs::read(dir.path().join("name_2.ext")).unwrap(), b"from archive");
    }

    #[test]
    fn test_skip_leaves_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            "notes.zip",
            create_test_zip(&[("name.ext", b"from archive")]),
        );
        fs::write(dir.path().join("name.ext"), b"original").unwrap();

        let stats = stats(extract_with(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(None),
            &archive,
        ));

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.extracted, 0);
        assert_eq!(fs::read(dir.path().join("name.ext")).unwrap(), b"original");
        assert!(!dir.path().join("name_2.ext").exists());
    }

    #[test]
    fn test_overwrite_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), "n.zip", create_test_zip(&[("f.bin", b"new")]));
        fs::write(dir.path().join("f.bin"), b"much longer original content").unwrap();

        extract_with(quiet_options(ConflictDecision::Overwrite), FixedOracle(None), &archive);

        assert_eq!(fs::read(dir.path().join("f.bin")).unwrap(), b"new");
    }

    #[test]
    fn test_provider_consulted_when_no_preset() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), "n.zip", create_test_zip(&[("f.bin", b"new")]));
        fs::write(dir.path().join("f.bin"), b"old").unwrap();

        let calls = Cell::new(0);
        let provider = |_: &Path| {
            calls.set(calls.get() + 1);
            ConflictDecision::Overwrite
        };
        let mut extractor = Extractor::new(
            quiet_options(ConflictDecision::AskUser),
            FixedOracle(None),
            provider,
        );
        extractor.extract_archive(&archive).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(fs::read(dir.path().join("f.bin")).unwrap(), b"new");
    }

    #[test]
    fn test_empty_archive_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            "empty.zip",
            create_test_zip(&[("only_dir/", b"")]),
        );

        let outcome = extract_with(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(None),
            &archive,
        );

        assert_eq!(outcome, ArchiveOutcome::Empty);
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_corrupt_archive_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), "corrupt.zip", b"PK\x03\x04garbage".to_vec());

        let mut extractor = Extractor::new(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(None),
            never_asked,
        );
        let result = extractor.extract_archive(&archive);
        assert!(matches!(result, Err(ExtractError::Format { .. })));
    }

    #[test]
    fn test_legacy_names_and_content_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let name_a = SHIFT_JIS.encode("資料/説明.txt").0.into_owned();
        let name_b = SHIFT_JIS.encode("資料/画像.bin").0.into_owned();
        let content = SHIFT_JIS.encode("文字化けしないテキスト").0.into_owned();
        let archive = write_archive(
            dir.path(),
            "legacy.zip",
            create_raw_zip(&[
                RawEntry::legacy(&name_a, &content),
                RawEntry::legacy(&name_b, &content),
            ]),
        );

        let stats = stats(extract_with(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(Some(SHIFT_JIS)),
            &archive,
        ));

        assert_eq!(stats.converted, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("資料/説明.txt")).unwrap(),
            "文字化けしないテキスト"
        );
        // Not on the allow-list, copied byte for byte
        assert_eq!(fs::read(dir.path().join("資料/画像.bin")).unwrap(), content);
    }

    #[test]
    fn test_dejizz_disabled_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let content = SHIFT_JIS.encode("テキスト").0.into_owned();
        let archive = write_archive(
            dir.path(),
            "raw.zip",
            create_test_zip(&[("notes.TXT", &content)]),
        );

        let mut options = quiet_options(ConflictDecision::Skip);
        options.dejizz = false;
        extract_with(options, FixedOracle(Some(SHIFT_JIS)), &archive);

        assert_eq!(fs::read(dir.path().join("notes.TXT")).unwrap(), content);
    }

    #[test]
    fn test_filename_length_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            "long.zip",
            create_test_zip(&[("日本語のとても長いファイル名.bin", b"data")]),
        );

        let prefix_len = dir.path().to_string_lossy().len() + 1;
        let mut options = quiet_options(ConflictDecision::Skip);
        // Room for two characters and one byte of a third
        options.filename_length = Some(prefix_len + 7);
        extract_with(options, FixedOracle(None), &archive);

        assert_eq!(fs::read(dir.path().join("日本")).unwrap(), b"data");
    }

    #[test]
    fn test_member_failure_does_not_abort_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("partial.zip");
        let bytes = create_test_zip(&[("top/blocked/a.bin", b"a"), ("top/ok.bin", b"ok")]);
        // A regular file where a directory needs to be created
        fs::create_dir(dir.path().join("top")).unwrap();
        fs::write(dir.path().join("top/blocked"), b"not a directory").unwrap();

        let mut reader =
            ZipReader::from_reader(&archive, Cursor::new(bytes), &FixedOracle(None)).unwrap();
        let mut extractor = Extractor::new(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(None),
            never_asked,
        );
        let stats = stats(extractor.extract_from(&mut reader).unwrap());

        assert_eq!(stats.root, dir.path());
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.extracted, 1);
        assert_eq!(fs::read(dir.path().join("top/ok.bin")).unwrap(), b"ok");
    }

    /// Reader whose archive becomes unreadable after listing
    struct TruncatedReader {
        path: PathBuf,
        members: MemberSet,
        opened: usize,
    }

    impl ArchiveReader for TruncatedReader {
        fn kind(&self) -> ArchiveKind {
            ArchiveKind::Zip
        }

        fn path(&self) -> &Path {
            &self.path
        }

        fn list_members(&self) -> &MemberSet {
            &self.members
        }

        fn open_member(&mut self, _resolved_name: &str) -> Result<Box<dyn Read + '_>> {
            self.opened += 1;
            Err(ExtractError::format("ZIP", &self.path, "unexpected end of archive"))
        }
    }

    #[test]
    fn test_archive_error_aborts_archive() {
        let dir = tempfile::tempdir().unwrap();
        let members = ["a.bin", "b.bin"]
            .into_iter()
            .map(|name| MemberEntry {
                raw_name: name.as_bytes().to_vec(),
                resolved_name: name.to_string(),
                is_utf8_flagged: true,
                size_hint: None,
                modified: None,
            })
            .collect();
        let mut reader = TruncatedReader {
            path: dir.path().join("truncated.zip"),
            members,
            opened: 0,
        };

        let mut extractor = Extractor::new(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(None),
            never_asked,
        );
        let result = extractor.extract_from(&mut reader);

        assert!(matches!(result, Err(ExtractError::Format { .. })));
        assert_eq!(reader.opened, 1);
    }

    #[test]
    fn test_timestamps_restored() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            "t.zip",
            create_raw_zip(&[RawEntry::utf8("t.bin", b"t")]),
        );

        extract_with(quiet_options(ConflictDecision::Skip), FixedOracle(None), &archive);

        let meta = fs::metadata(dir.path().join("t.bin")).unwrap();
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        // 1980-01-01 00:00:00 UTC
        assert_eq!(mtime.unix_seconds(), 315_532_800);
    }

    #[test]
    fn test_run_extracts_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        let first = write_archive(dir.path(), "one.zip", create_test_zip(&[("one.bin", b"1")]));
        let second = write_archive(
            &dir.path().join("nested"),
            "TWO.ZIP",
            create_test_zip(&[("two.bin", b"2")]),
        );
        let empty = write_archive(dir.path(), "empty.zip", create_test_zip(&[]));
        let broken = write_archive(dir.path(), "broken.zip", b"not a zip".to_vec());
        fs::write(dir.path().join("ignored.txt"), b"text").unwrap();

        // One member of this archive cannot be written
        let partial_dir = dir.path().join("partial");
        fs::create_dir_all(partial_dir.join("top")).unwrap();
        fs::write(partial_dir.join("top/blocked"), b"not a directory").unwrap();
        let partial = write_archive(
            &partial_dir,
            "partial.zip",
            create_test_zip(&[("top/blocked/a.bin", b"a"), ("top/ok.bin", b"ok")]),
        );

        let mut options = quiet_options(ConflictDecision::Skip);
        options.delete_archives = true;
        let mut extractor = Extractor::new(options, FixedOracle(None), never_asked);
        let summary = extractor.run(dir.path()).unwrap();

        assert_eq!(summary.archives_found, 5);
        assert_eq!(summary.archives_extracted, 3);
        assert_eq!(summary.archives_empty, 1);
        assert_eq!(summary.archives_failed, 1);
        assert_eq!(summary.archives_deleted, 2);
        assert_eq!(summary.files_extracted, 3);
        assert_eq!(summary.files_failed, 1);

        assert!(!first.exists());
        assert!(!second.exists());
        assert!(empty.exists());
        assert!(broken.exists());
        assert!(partial.exists());
        assert_eq!(fs::read(partial_dir.join("top/ok.bin")).unwrap(), b"ok");
        assert_eq!(fs::read(dir.path().join("one.bin")).unwrap(), b"1");
        assert_eq!(fs::read(dir.path().join("nested/two.bin")).unwrap(), b"2");
    }

    #[test]
    fn test_run_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(
            quiet_options(ConflictDecision::Skip),
            FixedOracle(None),
            never_asked,
        );
        assert!(extractor.run(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_should_dejizz_case_insensitive() {
        let options = ExtractOptions::default();
        assert!(options.should_dejizz("a/b.txt"));
        assert!(options.should_dejizz("DATA.CSV"));
        assert!(options.should_dejizz("x.Tsv"));
        assert!(!options.should_dejizz("image.png"));
        assert!(!options.should_dejizz("txt"));
        assert!(!options.should_dejizz(".txt"));

        let disabled = ExtractOptions {
            dejizz: false,
            ..Default::default()
        };
        assert!(!disabled.should_dejizz("a.txt"));
    }

    #[test]
    fn test_stream_chunks_locks_encoding_on_first_chunk() {
        // First chunk is pure ASCII; later chunks contain Shift_JIS
        let mut content = b"header line\n".to_vec();
        content.extend_from_slice(&SHIFT_JIS.encode("本文").0);
        let mut input = Cursor::new(content.clone());
        let mut output = Vec::new();
        let mut buffer = vec![0u8; 12];
        let mut filter = DejizzFilter::new(FixedOracle(Some(UTF_8)));

        stream_chunks(&mut input, &mut output, &mut buffer, Some(&mut filter)).unwrap();

        assert_eq!(filter.detected_encoding(), Some(UTF_8));
        assert_eq!(output, content);
    }

    #[test]
    fn test_stream_chunks_without_filter() {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).collect();
        let mut output = Vec::new();
        let mut buffer = vec![0u8; 1000];

        let written = stream_chunks(
            &mut Cursor::new(data.clone()),
            &mut output,
            &mut buffer,
            None::<&mut DejizzFilter<FixedOracle>>,
        )
        .unwrap();

        assert_eq!(written, 10_000);
        assert_eq!(output, data);
    }
}
