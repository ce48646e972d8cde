//! Human-readable byte-size parsing for `PreloadConfig.target_size_bytes`
//! and the simulation timeline's storage cap.
//!
//! Accepts `B`, `KB`, `MB`, `GB`, `TB` suffixes (binary, 1 KB = 1024 B),
//! case-insensitive. Per Design Note 9(a): any suffix outside this table is
//! rejected rather than silently accepted.

use thiserror::Error;

/// Error returned by [`parse_size`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeParseError {
    /// The numeric prefix could not be parsed as an integer.
    #[error("invalid size prefix in {input:?}")]
    InvalidPrefix {
        /// The original input string.
        input: String,
    },
    /// The suffix is not one of `B`, `KB`, `MB`, `GB`, `TB`.
    #[error("unrecognized size suffix in {input:?}")]
    UnknownSuffix {
        /// The original input string.
        input: String,
    },
}

const UNITS: &[(&str, u64)] = &[
    ("TB", 1024 * 1024 * 1024 * 1024),
    ("GB", 1024 * 1024 * 1024),
    ("MB", 1024 * 1024),
    ("KB", 1024),
    ("B", 1),
];

/// Parse a size string like `"1 GB"`, `"512mb"`, or `"100"` (bytes) into a
/// byte count.
///
/// # Errors
///
/// Returns [`SizeParseError::UnknownSuffix`] for any suffix not in `{B, KB,
/// MB, GB, TB}`, and [`SizeParseError::InvalidPrefix`] when the numeric
/// prefix does not parse as a non-negative integer.
pub fn parse_size(input: &str) -> Result<u64, SizeParseError> {
    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();

    for (suffix, multiplier) in UNITS {
        if let Some(prefix) = upper.strip_suffix(suffix) {
            let prefix = prefix.trim();
            // The bare "B" suffix also matches the tail of any unrecognized
            // two-letter unit ("1PB".strip_suffix("B") -> "1P"): if what's
            // left isn't purely digits, this isn't actually a byte count,
            // it's an unknown unit that happens to end in B.
            if *suffix == "B" && prefix.chars().any(|c| !c.is_ascii_digit()) {
                return Err(SizeParseError::UnknownSuffix {
                    input: input.to_owned(),
                });
            }
            return prefix
                .parse::<u64>()
                .map(|n| n * multiplier)
                .map_err(|_| SizeParseError::InvalidPrefix {
                    input: input.to_owned(),
                });
        }
    }

    // No recognized suffix at all: bare digits mean bytes; anything else
    // (including an unrecognized unit) is rejected.
    if upper.chars().all(|c| c.is_ascii_digit()) {
        upper
            .parse::<u64>()
            .map_err(|_| SizeParseError::InvalidPrefix {
                input: input.to_owned(),
            })
    } else {
        Err(SizeParseError::UnknownSuffix {
            input: input.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_size, SizeParseError};

    #[test]
    fn bare_digits_are_bytes() {
        assert_eq!(parse_size("100").unwrap(), 100);
    }

    #[test]
    fn kb_is_1024_bytes() {
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("1 KB").unwrap(), 1024);
    }

    #[test]
    fn gb_and_tb_scale_correctly() {
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("2TB").unwrap(), 2 * 1024 * 1024 * 1024 * 1024);
    }

    #[test]
    fn unknown_suffix_is_rejected() {
        // The source's isValidStorageSize historically accepted suffixes
        // outside its own multiplier table; we reject them (Design Note 9a).
        let err = parse_size("1PB").unwrap_err();
        assert!(matches!(err, SizeParseError::UnknownSuffix { .. }));
    }

    #[test]
    fn non_integer_prefix_is_rejected() {
        let err = parse_size("abcGB").unwrap_err();
        assert!(matches!(err, SizeParseError::InvalidPrefix { .. }));
    }

    #[test]
    fn empty_string_is_rejected() {
        let err = parse_size("").unwrap_err();
        assert!(matches!(err, SizeParseError::InvalidPrefix { .. }));
    }
}
