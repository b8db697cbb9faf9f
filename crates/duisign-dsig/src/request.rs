#![forbid(unsafe_code)]

//! RequestID handling.
//!
//! A DUIS RequestID is `originator:target:counter` where originator and
//! target are hyphenated EUI-64 identifiers and the counter is a run of
//! decimal digits.

/// The originator business id of a RequestID: the text before the first
/// `:`, hyphens stripped.
pub fn originator_id(request_id: &str) -> String {
    let head = request_id.split(':').next().unwrap_or(request_id);
    head.chars().filter(|c| *c != '-').collect()
}

/// Replace the trailing run of decimal digits with a fresh counter
/// value. A RequestID without trailing digits gets the counter
/// appended.
pub fn rewrite_counter(request_id: &str, counter: u128) -> String {
    let head = request_id.trim_end_matches(|c: char| c.is_ascii_digit());
    format!("{head}{counter}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_originator_strips_hyphens() {
        assert_eq!(
            originator_id("90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:1000"),
            "90B3D51F30010000"
        );
    }

    #[test]
    fn test_originator_without_separator_is_whole_text() {
        assert_eq!(originator_id("90-B3-D5-1F-30-01-00-00"), "90B3D51F30010000");
    }

    #[test]
    fn test_rewrite_replaces_trailing_digits_only() {
        assert_eq!(
            rewrite_counter("90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:1000", 42),
            "90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:42"
        );
    }

    #[test]
    fn test_rewrite_appends_when_no_trailing_digits() {
        assert_eq!(rewrite_counter("a:b:", 7), "a:b:7");
    }
}
