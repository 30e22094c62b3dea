use url::Url;

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: and data: links
/// - fragment-only links (same page anchors)
/// - invalid URLs
/// - non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url),
        _ => None,
    }
}

/// Returns true if both URLs point at the same host (and port)
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str().map(str::to_lowercase) == b.host_str().map(str::to_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/directory/md/state/texas").unwrap()
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let base = base_url();
        assert_eq!(
            resolve_link("/pub/jane-doe-md", &base).unwrap().as_str(),
            "https://example.com/pub/jane-doe-md"
        );
        assert_eq!(
            resolve_link("https://other.com/x", &base).unwrap().as_str(),
            "https://other.com/x"
        );
        assert_eq!(
            resolve_link("?page=2", &base).unwrap().as_str(),
            "https://example.com/directory/md/state/texas?page=2"
        );
    }

    #[test]
    fn test_excluded_links() {
        let base = base_url();
        assert!(resolve_link("", &base).is_none());
        assert!(resolve_link("#top", &base).is_none());
        assert!(resolve_link("javascript:void(0)", &base).is_none());
        assert!(resolve_link("mailto:a@example.com", &base).is_none());
        assert!(resolve_link("tel:+15555555555", &base).is_none());
        assert!(resolve_link("ftp://example.com/file", &base).is_none());
    }

    #[test]
    fn test_same_host() {
        let base = base_url();
        assert!(same_host(&base, &Url::parse("https://EXAMPLE.com/pub/x").unwrap()));
        assert!(!same_host(&base, &Url::parse("https://cdn.example.com/x").unwrap()));
        assert!(!same_host(&base, &Url::parse("https://example.com:8443/x").unwrap()));
    }
}
