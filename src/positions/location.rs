//! Parser for compound location strings
//!
//! The interpreter's symbol resolution reports targets as `<path>` or
//! `<path>:<1-based line>`. Only a trailing all-digit suffix after the last `:`
//! is a line marker, so paths containing colons (drive letters, URIs) survive.

use serde::{Deserialize, Serialize};

/// A resolved definition or reference target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationRef {
    pub file_path: String,
    /// 0-based line
    pub line: u32,
}

/// Parses a compound location string.
pub fn parse_location(raw: &str) -> LocationRef {
    if let Some((path, suffix)) = raw.rsplit_once(':') {
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            // Saturate instead of failing on absurdly long digit runs
            let line = suffix.parse::<u64>().unwrap_or(u64::MAX);
            let line = u32::try_from(line.saturating_sub(1)).unwrap_or(u32::MAX);
            return LocationRef {
                file_path: path.to_string(),
                line,
            };
        }
    }

    LocationRef {
        file_path: raw.to_string(),
        line: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn test_line_suffix_is_converted_to_zero_based() {
        let loc = parse_location("a/b/c.ext:43");
        assert_eq!(loc.file_path, "a/b/c.ext");
        assert_eq!(loc.line, 42);
    }

    #[test]
    fn test_missing_suffix_defaults_to_line_zero() {
        let loc = parse_location("a/b/c.ext");
        assert_eq!(loc.file_path, "a/b/c.ext");
        assert_eq!(loc.line, 0);
    }

    #[test]
    fn test_colon_in_path() {
        let loc = parse_location("c:/windows/file.ext:7");
        assert_eq!(loc.file_path, "c:/windows/file.ext");
        assert_eq!(loc.line, 6);

        let loc = parse_location("c:/windows/file.ext");
        assert_eq!(loc.file_path, "c:/windows/file.ext");
        assert_eq!(loc.line, 0);

        let loc = parse_location("file:///tmp/x.pike:12");
        assert_eq!(loc.file_path, "file:///tmp/x.pike");
        assert_eq!(loc.line, 11);
    }

    #[test]
    fn test_line_zero_and_one_both_map_to_zero() {
        assert_eq!(parse_location("x.pike:0").line, 0);
        assert_eq!(parse_location("x.pike:1").line, 0);
    }

    #[test]
    fn test_non_digit_suffix_is_part_of_path() {
        let loc = parse_location("x.pike:12a");
        assert_eq!(loc.file_path, "x.pike:12a");
        assert_eq!(loc.line, 0);

        let loc = parse_location("x.pike:");
        assert_eq!(loc.file_path, "x.pike:");
        assert_eq!(loc.line, 0);

        let loc = parse_location("x.pike:-3");
        assert_eq!(loc.file_path, "x.pike:-3");
        assert_eq!(loc.line, 0);
    }

    quickcheck! {
        fn prop_suffix_round_trips(line: u32) -> bool {
            let raw = format!("some/dir:with:colons/file.pike:{}", line);
            let loc = parse_location(&raw);
            loc.file_path == "some/dir:with:colons/file.pike"
                && loc.line == line.saturating_sub(1)
        }

        fn prop_path_without_suffix_is_unmodified(path: String) -> bool {
            let raw = format!("{}.pike", path);
            let loc = parse_location(&raw);
            loc.file_path == raw && loc.line == 0
        }
    }
}
