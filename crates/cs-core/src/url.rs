//! Request URL helpers
//!
//! Request URLs reach the interceptor either absolute (`https://host/path?q`)
//! or page-relative (`/path?q`, `path`). These functions work on string slices
//! and never allocate.

// =============================================================================
// Scheme
// =============================================================================

/// Position after `scheme://`, if the URL has one.
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;
    // A ':' after the first '/' or '?' belongs to the path or query.
    if bytes[..colon_pos].iter().any(|&b| matches!(b, b'/' | b'?' | b'#')) {
        return None;
    }

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

// =============================================================================
// Path
// =============================================================================

/// Path of a URL with query and fragment removed.
///
/// Absolute URLs without a path give `/`. Relative URLs are returned up to
/// their query or fragment.
#[inline]
pub fn extract_path(url: &str) -> &str {
    let bytes = url.as_bytes();

    let path_start = match get_scheme_end(url) {
        Some(scheme_end) => match bytes[scheme_end..]
            .iter()
            .position(|&b| matches!(b, b'/' | b'?' | b'#'))
        {
            Some(i) if bytes[scheme_end + i] == b'/' => scheme_end + i,
            _ => return "/",
        },
        None if url.starts_with("//") => {
            return match url[2..].find('/') {
                Some(i) => strip_suffix_parts(&url[2 + i..]),
                None => "/",
            };
        }
        None => 0,
    };

    strip_suffix_parts(&url[path_start..])
}

#[inline]
fn strip_suffix_parts(rest: &str) -> &str {
    match rest.find(['?', '#']) {
        Some(end) => &rest[..end],
        None => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_scheme_end() {
        assert_eq!(get_scheme_end("https://example.com"), Some(8));
        assert_eq!(get_scheme_end("/youtubei/v1/browse"), None);
        assert_eq!(get_scheme_end("/a?next=https://x"), None);
    }

    #[test]
    fn test_extract_path_absolute() {
        assert_eq!(
            extract_path("https://www.youtube.com/youtubei/v1/browse?key=abc&prettyPrint=false"),
            "/youtubei/v1/browse"
        );
        assert_eq!(extract_path("https://example.com/"), "/");
        assert_eq!(extract_path("https://example.com"), "/");
        assert_eq!(extract_path("https://example.com?query"), "/");
        assert_eq!(extract_path("https://example.com/a#frag"), "/a");
    }

    #[test]
    fn test_extract_path_relative() {
        assert_eq!(extract_path("/youtubei/v1/next?key=1"), "/youtubei/v1/next");
        assert_eq!(extract_path("//www.youtube.com/youtubei/v1/guide"), "/youtubei/v1/guide");
        assert_eq!(extract_path("/watch#t=10"), "/watch");
        assert_eq!(extract_path("/a?next=https://x/y"), "/a");
    }
}
