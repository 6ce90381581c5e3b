//! Conversion between virtual-world display names and account handles.
//!
//! A display name looks like `John Smith` or `John Resident`; the matching
//! handle is `john.smith` or `john`. Legacy accounts carry the reserved
//! surname `Resident`, which never appears in the handle.

use crate::shared::AppError;

/// Separator between first and last name inside a handle
pub const HANDLE_DELIMITER: char = '.';

/// Surname given to every account that did not pick one
pub const DEFAULT_SURNAME: &str = "Resident";

pub const MAX_HANDLE_LEN: usize = 63;

/// Cleans a display name: rejects handles, drops a trailing `Resident`, trims.
///
/// `None` stays `None` and an empty string is returned unchanged.
pub fn normalize_display_name(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(Some(String::new()));
    }

    if raw.contains(HANDLE_DELIMITER) {
        return Err(AppError::InvalidNameFormat(format!(
            "'{}' looks like a handle, expected a display name",
            raw
        )));
    }

    Ok(Some(strip_default_surname(raw)))
}

/// Lower-cases and joins whitespace separated words with the handle delimiter
pub fn to_handle(cleaned_name: &str) -> String {
    cleaned_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(&HANDLE_DELIMITER.to_string())
}

/// Resolves user input that may be either a display name or a handle.
///
/// Used for login and search, so a dotted input is taken as a handle instead
/// of being rejected.
pub fn input_to_username(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains(HANDLE_DELIMITER) {
        return trimmed.to_lowercase();
    }
    to_handle(&strip_default_surname(trimmed))
}

/// True for `name` or `first.last` made of lowercase ASCII letters and digits
pub fn is_valid_handle(handle: &str) -> bool {
    if handle.is_empty() || handle.len() > MAX_HANDLE_LEN {
        return false;
    }

    let is_part = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    };

    match handle.split_once(HANDLE_DELIMITER) {
        Some((first, last)) => is_part(first) && is_part(last),
        None => handle.len() >= 2 && is_part(handle),
    }
}

fn strip_default_surname(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.rsplit_once(char::is_whitespace) {
        Some((rest, last)) if last.eq_ignore_ascii_case(DEFAULT_SURNAME) => {
            rest.trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}
