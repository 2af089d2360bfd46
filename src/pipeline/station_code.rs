//! Station identifier cleanup
//!
//! Count sheet headers look like `"02-MI-JAN-N 01.04.2015"`: the canonical
//! station code followed by an 11 character installation-date token. The
//! canonical code is the join key into the station metadata sheet.

/// Length of the trailing token (`" dd.mm.yyyy"`) embedded in every station header
pub const HEADER_TOKEN_LEN: usize = 11;

/// Known misspellings in the count sheets, mapped to the codes used by the metadata sheet
const TYPO_FIXUPS: [(&str, &str); 2] = [
    ("17-SZ-BRE-O", "17-SK-BRE-O"),
    ("17-SZ-BRE-W", "17-SK-BRE-W"),
];

/// Trim whitespace and correct known typos.
///
/// Idempotent: applying it to an already-canonical code returns the code unchanged.
///
/// # Examples
///
/// ```
/// use bike_count_pipeline::pipeline::station_code::canonicalize;
///
/// assert_eq!(canonicalize(" 02-MI-JAN-N "), "02-MI-JAN-N");
/// assert_eq!(canonicalize("17-SZ-BRE-O"), "17-SK-BRE-O");
/// assert_eq!(canonicalize("17-SK-BRE-O"), "17-SK-BRE-O");
/// ```
pub fn canonicalize(code: &str) -> String {
    let trimmed = code.trim();
    TYPO_FIXUPS
        .iter()
        .find(|(typo, _)| *typo == trimmed)
        .map(|(_, fixed)| fixed.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Drop the trailing installation-date token from a raw header.
///
/// Returns `None` when the header is not longer than the token itself.
pub fn strip_header_token(header: &str) -> Option<&str> {
    let char_count = header.chars().count();
    if char_count <= HEADER_TOKEN_LEN {
        return None;
    }

    // Cut on a char boundary, headers contain umlauts
    let keep = char_count - HEADER_TOKEN_LEN;
    let cut = header
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(header.len());
    Some(&header[..cut])
}

/// Canonical station code for a raw column header
///
/// # Examples
///
/// ```
/// use bike_count_pipeline::pipeline::station_code::station_code_from_header;
///
/// assert_eq!(
///     station_code_from_header("02-MI-JAN-N 01.04.2015").as_deref(),
///     Some("02-MI-JAN-N")
/// );
/// assert_eq!(
///     station_code_from_header("17-SZ-BRE-W 01.06.2016").as_deref(),
///     Some("17-SK-BRE-W")
/// );
/// assert_eq!(station_code_from_header("01.04.2015"), None);
/// ```
pub fn station_code_from_header(header: &str) -> Option<String> {
    let code = strip_header_token(header)?;
    let canonical = canonicalize(code);
    if canonical.is_empty() {
        None
    } else {
        Some(canonical)
    }
}

/// Location id: the part of the code before the first `-`.
///
/// Both counting directions of one site share it ("17-SK-BRE-O", "17-SK-BRE-W" -> "17").
pub fn location_id(code: &str) -> &str {
    code.split_once('-').map_or(code, |(prefix, _)| prefix)
}
