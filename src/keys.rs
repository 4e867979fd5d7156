//! Key path helpers
//!
//! Object stores have no directories. A key ending in `/` is treated as a
//! folder marker, every other key is a file. All functions here are pure and
//! total: empty input gives empty output instead of an error.

/// Hierarchy separator used in object keys
pub const DELIMITER: &str = "/";

/// True when the key denotes a folder (ends with `/`)
pub fn is_folder(key: &str) -> bool {
    key.ends_with('/')
}

/// True when the key denotes a file. Always the complement of [`is_folder`].
pub fn is_file(key: &str) -> bool {
    !is_folder(key)
}

/// File name with extension: everything after the last `/`.
///
/// Folder keys yield an empty string, since nothing follows their trailing
/// slash.
pub fn file_name(key: &str) -> &str {
    match key.rfind('/') {
        Some(pos) => &key[pos + 1..],
        None => key,
    }
}

/// Lower-cased extension of a file name, without the dot.
///
/// Returns an empty string when the name has no `.`.
pub fn file_extension(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(pos) => file_name[pos + 1..].to_lowercase(),
        None => String::new(),
    }
}

/// Extension of a file name exactly as written, without the dot
pub fn raw_extension(file_name: &str) -> Option<&str> {
    file_name
        .rfind('.')
        .map(|pos| &file_name[pos + 1..])
        .filter(|ext| !ext.is_empty())
}

/// Last segment of a folder key without the trailing slash
pub fn folder_name(key: &str) -> &str {
    file_name(key.strip_suffix('/').unwrap_or(key))
}

/// Parent folder key (with trailing slash) of a file or folder key.
///
/// Top-level keys have the root as parent, which is the empty string.
pub fn parent_folder_key(key: &str) -> String {
    let trimmed = key.strip_suffix('/').unwrap_or(key);
    if trimmed.is_empty() {
        return String::new();
    }

    match trimmed.rfind('/') {
        Some(pos) => format!("{}/", &trimmed[..pos]),
        None => String::new(),
    }
}

/// Append a segment to a folder key. The root folder is the empty string.
pub fn join_key(folder: &str, name: &str) -> String {
    if folder.is_empty() || is_folder(folder) {
        format!("{}{}", folder, name)
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Replace the leading `from_prefix` of `key` with `to_prefix`.
///
/// Returns `None` when the key does not live under `from_prefix`.
pub fn rebase_key(key: &str, from_prefix: &str, to_prefix: &str) -> Option<String> {
    key.strip_prefix(from_prefix)
        .map(|rest| format!("{}{}", to_prefix, rest))
}

/// `s3://bucket/key` form of an object address
pub fn to_s3_uri(bucket: &str, key: &str) -> String {
    if key.is_empty() {
        format!("s3://{}", bucket)
    } else {
        format!("s3://{}/{}", bucket, key)
    }
}

/// ARN of an object (or of the bucket when `key` is empty)
pub fn to_arn(bucket: &str, key: &str) -> String {
    if key.is_empty() {
        format!("arn:aws:s3:::{}", bucket)
    } else {
        format!("arn:aws:s3:::{}/{}", bucket, key)
    }
}

/// Virtual-hosted HTTPS URL of an object. Key segments are percent-encoded.
pub fn to_object_url(bucket: &str, region: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!(
        "https://{}.s3.{}.amazonaws.com/{}",
        bucket,
        region,
        encoded.join("/")
    )
}
