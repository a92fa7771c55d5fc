//! Dated cell text codec
//!
//! Grid cells may carry a calendar date in front of their free text:
//! `"<YYYY-MM-DD>|<free text>"`. Text without a pipe, or whose prefix is not
//! a valid date, is legacy free text with no date. Readers accept both forms;
//! writers always emit the prefixed form.

use chrono::NaiveDate;

const SEPARATOR: char = '|';
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Cell text split into its optional date and the free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedText<'a> {
    pub date: Option<NaiveDate>,
    pub text: &'a str,
}

/// Split raw cell text into date and free text
pub fn decode(raw: &str) -> DatedText<'_> {
    if let Some((prefix, rest)) = raw.split_once(SEPARATOR) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix.trim(), DATE_FORMAT) {
            return DatedText {
                date: Some(date),
                text: rest,
            };
        }
    }
    DatedText {
        date: None,
        text: raw,
    }
}

/// Encode free text with a date prefix
///
/// Text that already carries a date prefix is re-dated rather than double-prefixed.
pub fn encode(date: NaiveDate, text: &str) -> String {
    let body = decode(text).text;
    format!("{}{}{}", date.format(DATE_FORMAT), SEPARATOR, body)
}

/// Free text of a cell with any date prefix removed, trimmed
pub fn display_text(raw: &str) -> &str {
    decode(raw).text.trim()
}
