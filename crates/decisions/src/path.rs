use url::Url;

/// Reduces a fragment target to an absolute pathname.
///
/// - empty input stays empty;
/// - input without any `/` is returned unchanged;
/// - `http...` input keeps only its URL path (unparsable URLs pass through);
/// - anything else gets a leading `/` when it lacks one.
pub fn normalize_path(p: &str) -> String {
    if p.is_empty() || !p.contains('/') {
        return p.to_string();
    }
    if p.starts_with("http") {
        return match Url::parse(p) {
            Ok(url) => url.path().to_string(),
            Err(_) => p.to_string(),
        };
    }
    if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{p}")
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_path;

    #[test]
    fn strips_origin_from_absolute_urls() {
        assert_eq!(normalize_path("https://x.com/a/b"), "/a/b");
        assert_eq!(normalize_path("https://x.com/a/b?q=1#top"), "/a/b");
        assert_eq!(normalize_path("http://x.com/"), "/");
    }

    #[test]
    fn relative_paths_gain_a_leading_slash() {
        assert_eq!(normalize_path("a/b"), "/a/b");
        assert_eq!(normalize_path("/a/b"), "/a/b");
    }

    #[test]
    fn slashless_and_empty_values_pass_through() {
        assert_eq!(normalize_path("noslash"), "noslash");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn unparsable_http_prefix_is_kept() {
        assert_eq!(normalize_path("http//broken/x"), "http//broken/x");
    }
}
