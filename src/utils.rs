//! Utility functions for download naming and target paths

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Name used when neither the headers nor the URL suggest one
pub const FALLBACK_FILENAME: &str = "download.zip";

/// Get the path a download should be written to, honoring the collision action
///
/// Returns `None` when the file exists and the action is
/// [`FileCollisionAction::Skip`]. For `Rename`, a ` (n)` suffix is inserted
/// before the extension until a free name is found.
///
/// # Examples
///
/// ```
/// use inbox_dl::utils::get_unique_path;
/// use inbox_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/inbox-dl-doc/missing.zip");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// assert_eq!(unique.as_deref(), Some(path));
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(Some(path.to_path_buf()));
    }

    match action {
        FileCollisionAction::Overwrite => Ok(Some(path.to_path_buf())),
        FileCollisionAction::Skip => Ok(None),
        FileCollisionAction::Rename => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| Error::Other(format!("cannot extract file stem from {:?}", path)))?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().unwrap_or_else(|| Path::new(""));

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(Some(new_path));
                }
            }

            Err(Error::Other(format!(
                "could not find a free name for {:?} after {} attempts",
                path, MAX_RENAME_ATTEMPTS
            )))
        }
    }
}

/// Reduce a suggested name to a bare file name
///
/// Directory components are dropped so a name taken from a web page or header
/// cannot point outside the download directory.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let name = name.trim().replace('\\', "/");
    let base = Path::new(&name).file_name()?.to_str()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

/// Pick a filename for a download from its response headers and URL
///
/// Tries the `Content-Disposition` header (`filename*=` and `filename=`),
/// then the last segment of the URL path, then [`FALLBACK_FILENAME`]. The
/// extension is kept.
pub fn filename_from_response(headers: &HeaderMap, url: &str) -> String {
    if let Some(value) = headers.get(CONTENT_DISPOSITION)
        && let Ok(value) = value.to_str()
        && let Some(name) = filename_from_disposition(value)
    {
        return name;
    }

    if let Ok(parsed_url) = url::Url::parse(url)
        && let Some(segments) = parsed_url.path_segments()
        && let Some(last_segment) = segments.rev().find(|s| !s.is_empty())
    {
        let decoded = urlencoding::decode(last_segment)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| last_segment.to_string());
        if let Some(name) = sanitize_filename(&decoded) {
            return name;
        }
    }

    FALLBACK_FILENAME.to_string()
}

fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // RFC 5987: charset'lang'percent-encoded
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"'))
                && let Some(name) = sanitize_filename(&decoded)
            {
                return Some(name);
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            plain = plain.or_else(|| sanitize_filename(name.trim_matches('"')));
        }
    }
    plain
}
