//! Small helpers shared by the engine and the CLI
//!
//! ```
//! use ejzip::utils::{format_size, parse_extension_list};
//!
//! assert_eq!(format_size(1536 * 1024), "1.5M");
//! assert!(parse_extension_list(".TXT, csv").contains("txt"));
//! ```

use filetime::FileTime;
use std::collections::HashSet;

/// Human-readable byte count: `42B`, `1.5K`, `12.0M`, `2.0G`
pub fn format_size(size: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1 << 30, "G"), (1 << 20, "M"), (1 << 10, "K")];

    UNITS
        .iter()
        .find(|(scale, _)| size >= *scale)
        .map(|(scale, unit)| format!("{:.1}{}", size as f64 / *scale as f64, unit))
        .unwrap_or_else(|| format!("{}B", size))
}

/// Parse a comma-separated extension list such as `txt,.CSV, tsv`.
///
/// Entries are trimmed, lowercased and stripped of a leading dot. Empty
/// entries are dropped.
pub fn parse_extension_list(list: &str) -> HashSet<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Convert a ZIP member timestamp to a [`FileTime`].
///
/// ZIP stores local wall-clock time without a zone; it is taken as UTC.
pub fn datetime_to_filetime(dt: zip::DateTime) -> FileTime {
    let days = days_from_civil(dt.year() as i32, dt.month() as i32, dt.day() as i32);
    let secs = days * 86_400
        + dt.hour() as i64 * 3_600
        + dt.minute() as i64 * 60
        + dt.second() as i64;

    FileTime::from_unix_time(secs, 0)
}

/// Convert a packed MS-DOS timestamp (date in the high 16 bits) to a [`FileTime`].
///
/// Returns `None` when the fields do not form a valid date.
pub fn dos_timestamp_to_filetime(timestamp: u32) -> Option<FileTime> {
    zip::DateTime::try_from_msdos((timestamp >> 16) as u16, timestamp as u16)
        .ok()
        .map(datetime_to_filetime)
}

/// Days since 1970-01-01 for a proleptic Gregorian date (Hinnant's algorithm)
fn days_from_civil(year: i32, month: i32, day: i32) -> i64 {
    let y = i64::from(if month <= 2 { year - 1 } else { year });
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
