//! Filename-safe spellings of distribution names and versions.

use std::str::FromStr;

use pep440_rs::Version;

/// Filename component for a distribution name.
///
/// Runs of anything other than ASCII alphanumerics and `.` collapse into a
/// single `_`, and the result never starts or ends with `_`. Case is kept.
pub fn safer_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '.' {
            if pending_sep && !result.is_empty() {
                result.push('_');
            }
            pending_sep = false;
            result.push(ch);
        } else {
            pending_sep = true;
        }
    }
    result
}

/// Filename component for a version: the PEP 440 normal form when the
/// version parses, otherwise the same sanitizing applied to names.
pub fn safer_version(version: &str) -> String {
    match Version::from_str(version.trim()) {
        Ok(parsed) => parsed.to_string().replace('-', "_"),
        Err(_) => safer_name(version),
    }
}

pub fn dist_info_dirname(name: &str, version: &str) -> String {
    format!("{}-{}.dist-info", safer_name(name), safer_version(version))
}
