//! Name and enum helpers shared by visitors and property helpers

use crate::error::{ObjectError, ObjectResult};

/// Find `text` in an enum lookup table.
///
/// Fails with `ValidationFailed` when the name is not in the table.
pub fn enum_parse(lookup: &[&str], text: &str) -> ObjectResult<usize> {
    lookup
        .iter()
        .position(|candidate| *candidate == text)
        .ok_or_else(|| ObjectError::ValidationFailed(format!("invalid parameter value: {}", text)))
}

/// Recognise a name at the start of `text`.
///
/// A name is an optional downstream `__RFQDN_` prefix followed by a letter
/// and then any run of alphanumerics, `-` and `_`. Returns the length of the
/// name, or `None` if `text` does not start with one. With `complete`, the
/// whole of `text` must be the name.
pub fn parse_name(text: &str, complete: bool) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut p = 0;

    if bytes.first() == Some(&b'_') {
        if bytes.get(1) != Some(&b'_') {
            return None;
        }
        p = 2;
        while p < bytes.len() && (bytes[p].is_ascii_alphanumeric() || matches!(bytes[p], b'-' | b'.')) {
            p += 1;
        }
        if bytes.get(p) != Some(&b'_') {
            return None;
        }
        p += 1;
    }

    if !bytes.get(p).is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    p += 1;
    while p < bytes.len() && (bytes[p].is_ascii_alphanumeric() || matches!(bytes[p], b'-' | b'_')) {
        p += 1;
    }

    if complete && p != bytes.len() {
        return None;
    }
    Some(p)
}

/// Check a type or property name for use in object paths
pub fn is_valid_path_component(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}
