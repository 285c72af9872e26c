//! Authorization header parsing for request-authorizing middleware.

/// Extract a Bearer token from an Authorization header value.
///
/// The scheme is matched case-insensitively and exactly one token must follow.
pub fn bearer_token_from_header(header_value: &str) -> Option<&str> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next()?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    Some(token)
}
