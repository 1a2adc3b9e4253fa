//! Content-type inference from a key's extension.

/// Guess a MIME type from the extension of `key`.
///
/// Only the last path segment is considered, and the match is
/// case-insensitive. Returns `None` for unknown or missing extensions, in
/// which case the store applies its own default.
pub fn from_key(key: &str) -> Option<&'static str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    mime_guess::from_path(name).first_raw()
}
