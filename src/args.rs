//! Command-line argument parsing
//!
//! The clap definition is converted into an [`ExtractOptions`] value with
//! [`Args::extract_options`]; nothing downstream reads `Args` directly.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use ejzip::Args;
//!
//! let args = Args::parse();
//! let options = args.extract_options()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, bail};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::extract::{DEFAULT_CHUNK_SIZE, ExtractOptions};
use crate::planner::ConflictDecision;
use crate::utils::parse_extension_list;

/// Recursively extract ZIP and RAR archives, repairing legacy-encoded
/// filenames and text content
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("conflict").args(["skip", "overwrite", "rename"])))]
#[command(after_help = "Examples:
  ejzip downloads/                     Extract every archive under downloads/
  ejzip archive.zip                    Extract a single archive next to itself
  ejzip -r downloads/                  Rename instead of asking on collisions
  ejzip --dejizz-ext txt,md,ini dir/   Re-encode more text formats to UTF-8
  ejzip --no-dejizz dir/               Copy member contents byte for byte
  ejzip --delete-archives -o dir/      Overwrite, then remove extracted archives
  ejzip --filename-length 255 dir/     Cap destination paths at 255 bytes")]
pub struct Args {
    /// Directory to search recursively, or a single archive
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Comma-separated extensions whose content is re-encoded to UTF-8
    #[arg(long = "dejizz-ext", value_name = "LIST", default_value = "txt,csv,tsv")]
    pub dejizz_ext: String,

    /// Never re-encode member content
    #[arg(long = "no-dejizz")]
    pub no_dejizz: bool,

    /// Delete each archive after all of its members were extracted
    #[arg(long = "delete-archives")]
    pub delete_archives: bool,

    /// Print every member mapping and content conversion
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (-q hides progress and summaries, -qq also member errors)
    #[arg(short = 'q', long = "quiet", action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Skip files that already exist
    #[arg(short = 's', long = "skip")]
    pub skip: bool,

    /// Overwrite files that already exist
    #[arg(short = 'o', long = "overwrite")]
    pub overwrite: bool,

    /// Extract next to existing files under a numbered name
    #[arg(short = 'r', long = "rename")]
    pub rename: bool,

    /// Truncate destination paths to at most this many UTF-8 bytes
    #[arg(long = "filename-length", value_name = "BYTES")]
    pub filename_length: Option<usize>,

    /// Bytes read from a member at a time
    #[arg(long = "chunk-size", value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Do not restore member modification times
    #[arg(short = 'D', long = "no-timestamps")]
    pub no_timestamps: bool,
}

impl Args {
    /// Preset conflict answer, or `AskUser` when no flag was given
    pub fn conflict_policy(&self) -> ConflictDecision {
        if self.skip {
            ConflictDecision::Skip
        } else if self.overwrite {
            ConflictDecision::Overwrite
        } else if self.rename {
            ConflictDecision::Rename
        } else {
            ConflictDecision::AskUser
        }
    }

    /// Validate the arguments and build the engine settings
    pub fn extract_options(&self) -> Result<ExtractOptions> {
        if self.chunk_size == 0 {
            bail!("--chunk-size must be greater than zero");
        }
        if self.filename_length == Some(0) {
            bail!("--filename-length must be greater than zero");
        }
        if self.verbose && self.quiet > 0 {
            bail!("Cannot specify both -v (verbose) and -q (quiet)");
        }

        Ok(ExtractOptions {
            dejizz_extensions: parse_extension_list(&self.dejizz_ext),
            dejizz: !self.no_dejizz,
            conflict: self.conflict_policy(),
            filename_length: self.filename_length,
            chunk_size: self.chunk_size,
            restore_timestamps: !self.no_timestamps,
            delete_archives: self.delete_archives,
            verbose: self.verbose,
            quiet: self.quiet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("ejzip").chain(argv.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["downloads"]).unwrap();
        assert_eq!(args.source, PathBuf::from("downloads"));
        assert_eq!(args.conflict_policy(), ConflictDecision::AskUser);

        let options = args.extract_options().unwrap();
        assert!(options.dejizz);
        assert!(options.restore_timestamps);
        assert!(!options.delete_archives);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(options.filename_length, None);
        assert_eq!(options.dejizz_extensions.len(), 3);
        assert!(options.dejizz_extensions.contains("tsv"));
    }

    #[test]
    fn test_conflict_flags() {
        assert_eq!(parse(&["-s", "d"]).unwrap().conflict_policy(), ConflictDecision::Skip);
        assert_eq!(
            parse(&["--overwrite", "d"]).unwrap().conflict_policy(),
            ConflictDecision::Overwrite
        );
        assert_eq!(parse(&["-r", "d"]).unwrap().conflict_policy(), ConflictDecision::Rename);
    }

    #[test]
    fn test_conflict_flags_are_exclusive() {
        let err = parse(&["-s", "-o", "d"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert!(parse(&["-o", "--rename", "d"]).is_err());
    }

    #[test]
    fn test_quiet_counts() {
        assert_eq!(parse(&["-q", "d"]).unwrap().quiet, 1);
        assert_eq!(parse(&["-qq", "d"]).unwrap().quiet, 2);
        assert!(parse(&["-v", "-q", "d"]).unwrap().extract_options().is_err());
    }

    #[test]
    fn test_dejizz_options() {
        let args = parse(&["--dejizz-ext", "MD, .ini", "--no-dejizz", "d"]).unwrap();
        let options = args.extract_options().unwrap();
        assert!(!options.dejizz);
        assert!(options.dejizz_extensions.contains("md"));
        assert!(options.dejizz_extensions.contains("ini"));
        assert!(!options.dejizz_extensions.contains("txt"));
    }

    #[test]
    fn test_numeric_options() {
        let args = parse(&["--chunk-size", "4096", "--filename-length", "200", "-D", "d"]).unwrap();
        let options = args.extract_options().unwrap();
        assert_eq!(options.chunk_size, 4096);
        assert_eq!(options.filename_length, Some(200));
        assert!(!options.restore_timestamps);

        assert!(parse(&["--chunk-size", "0", "d"]).unwrap().extract_options().is_err());
        assert!(parse(&["--chunk-size", "lots", "d"]).is_err());
    }

    #[test]
    fn test_source_required() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
