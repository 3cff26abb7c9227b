//! Path allocation: `{root}/{year}/{month}/{day}/{uuid}{ext}`
//!
//! Date partitions bound directory fan-out. The random leaf keeps concurrent
//! uploads from colliding and keeps the uploader's file name out of the path.

use chrono::NaiveDate;
use uuid::Uuid;

/// Longest extension carried over from the uploader's file name
const MAX_EXTENSION_LEN: usize = 16;

/// Allocate a fresh relative path for an upload named `original_name` on `date`.
///
/// Every call returns a different path, even for identical inputs.
pub fn allocate_path(root: &str, original_name: &str, date: NaiveDate) -> String {
    let leaf = format!("{}{}", Uuid::new_v4().simple(), extension_of(original_name));
    let partition = date.format("%Y/%m/%d");
    let root = root.trim_matches('/');

    if root.is_empty() {
        format!("{partition}/{leaf}")
    } else {
        format!("{root}/{partition}/{leaf}")
    }
}

/// Final path component of a client supplied name (either separator).
fn file_name_of(original_name: &str) -> &str {
    original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name)
}

/// Extension as the uploader wrote it, from the last dot of the file name.
///
/// Catalog metadata only; never used to build paths. Empty when the file
/// name has no dot or ends with one.
pub fn declared_extension(original_name: &str) -> String {
    match file_name_of(original_name).rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!(".{ext}"),
        _ => String::new(),
    }
}

/// Extension carried onto an allocated leaf, with its leading dot.
///
/// Returns an empty string when the name has no usable extension. Client
/// supplied directory parts (either separator) are ignored, and extensions
/// that are not short and plain alphanumeric are dropped.
pub fn extension_of(original_name: &str) -> String {
    match file_name_of(original_name).rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{ext}")
        }
        _ => String::new(),
    }
}

/// Directory part of a relative path, with a trailing slash (OpenDAL dir form).
pub fn partition_dir(path: &str) -> Option<String> {
    path.rsplit_once('/').map(|(dir, _)| format!("{dir}/"))
}
