//! Fragment fetching: one request per distinct URL, fanned out on scoped
//! threads and collected over a channel.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use core_types::{Fragment, FragmentContent};
use net::ContentFetcher;

const LOG_TARGET: &str = "runtime_pers.resolve";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFragment {
    /// Anchor path the markup replaces.
    pub selector: String,
    pub html: String,
}

/// Absolute URLs pass through; paths are joined onto `base_origin`.
pub fn fragment_url(source_path: &str, base_origin: &str) -> String {
    if source_path.starts_with("http") {
        return source_path.to_string();
    }
    format!("{}{}", base_origin.trim_end_matches('/'), source_path)
}

/// Comment left in place of markup that could not be fetched.
pub fn placeholder(source_path: &str) -> String {
    format!("<!-- Error loading fragment {source_path} -->")
}

pub fn resolve_fragment(
    fragment: &Fragment,
    base_origin: &str,
    fetcher: &dyn ContentFetcher,
) -> ResolvedFragment {
    let url = fragment_url(&fragment.source_path, base_origin);
    let html = fetch_guarded(fetcher, &url).unwrap_or_else(|| placeholder(&fragment.source_path));
    ResolvedFragment {
        selector: fragment.selector.clone(),
        html,
    }
}

/// Fetches every fragment concurrently and returns markup keyed by anchor
/// path. When two fragments share an anchor the later one in `fragments` wins.
pub fn resolve_fragments(
    fragments: &[Fragment],
    base_origin: &str,
    fetcher: &dyn ContentFetcher,
) -> FragmentContent {
    let start = Instant::now();

    let mut urls: Vec<String> = Vec::new();
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    let slots: Vec<usize> = fragments
        .iter()
        .map(|fragment| {
            let url = fragment_url(&fragment.source_path, base_origin);
            *slot_of.entry(url).or_insert_with_key(|url| {
                urls.push(url.clone());
                urls.len() - 1
            })
        })
        .collect();

    let mut bodies: Vec<Option<String>> = vec![None; urls.len()];
    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        for (slot, url) in urls.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send((slot, fetch_guarded(fetcher, url)));
            });
        }
        drop(tx);
        for (slot, body) in rx {
            bodies[slot] = body;
        }
    });

    let mut content = FragmentContent::with_capacity(fragments.len());
    for (fragment, slot) in fragments.iter().zip(slots) {
        let html = bodies[slot]
            .clone()
            .unwrap_or_else(|| placeholder(&fragment.source_path));
        content.insert(fragment.selector.clone(), html);
    }

    log::info!(
        target: LOG_TARGET,
        "resolved {} fragments ({} urls) in {}ms",
        fragments.len(),
        urls.len(),
        start.elapsed().as_millis()
    );
    content
}

/// `None` when the fetch failed or the fetcher panicked.
fn fetch_guarded(fetcher: &dyn ContentFetcher, url: &str) -> Option<String> {
    match panic::catch_unwind(AssertUnwindSafe(|| fetcher.fetch_text(url))) {
        Ok(Ok(body)) => Some(body),
        Ok(Err(err)) => {
            log::warn!(target: LOG_TARGET, "fragment fetch failed: {err}");
            None
        }
        Err(_) => {
            log::warn!(target: LOG_TARGET, "fragment fetcher panicked for {url}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Action;
    use net::FetchError;
    use std::sync::Mutex;

    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    impl ContentFetcher for Recording {
        fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if url.ends_with("/missing") {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            if url.ends_with("/boom") {
                panic!("fetcher exploded");
            }
            Ok(format!("<p>{url}</p>"))
        }
    }

    fn recording() -> Recording {
        Recording {
            calls: Mutex::new(Vec::new()),
        }
    }

    fn fragment(selector: &str, source_path: &str) -> Fragment {
        Fragment {
            selector: selector.to_string(),
            source_path: source_path.to_string(),
            action: Action::Replace,
            manifest_id: None,
            activity_id: None,
        }
    }

    #[test]
    fn urls_join_the_origin() {
        assert_eq!(fragment_url("/f/a", "https://x.test/"), "https://x.test/f/a");
        assert_eq!(fragment_url("/f/a", "https://x.test"), "https://x.test/f/a");
        assert_eq!(
            fragment_url("https://cdn.test/f/a", "https://x.test"),
            "https://cdn.test/f/a"
        );
    }

    #[test]
    fn failures_become_placeholders() {
        let fetcher = recording();
        let missing = resolve_fragment(&fragment("/a", "/missing"), "https://x.test", &fetcher);
        assert_eq!(missing.selector, "/a");
        assert_eq!(missing.html, "<!-- Error loading fragment /missing -->");

        let boom = resolve_fragment(&fragment("/b", "/boom"), "https://x.test", &fetcher);
        assert_eq!(boom.html, "<!-- Error loading fragment /boom -->");
    }

    #[test]
    fn shared_urls_are_fetched_once() {
        let fetcher = recording();
        let fragments = [
            fragment("/a", "/promo"),
            fragment("/b", "/promo"),
            fragment("/c", "/missing"),
        ];
        let content = resolve_fragments(&fragments, "https://x.test", &fetcher);
        assert_eq!(content.len(), 3);
        assert_eq!(content["/a"], "<p>https://x.test/promo</p>");
        assert_eq!(content["/b"], content["/a"]);
        assert_eq!(content["/c"], "<!-- Error loading fragment /missing -->");

        let mut calls = fetcher.calls.into_inner().unwrap();
        calls.sort();
        assert_eq!(calls, ["https://x.test/missing", "https://x.test/promo"]);
    }

    #[test]
    fn later_fragment_wins_a_shared_anchor() {
        let fetcher = recording();
        let fragments = [fragment("/a", "/first"), fragment("/a", "/second")];
        let content = resolve_fragments(&fragments, "https://x.test", &fetcher);
        assert_eq!(content.len(), 1);
        assert_eq!(content["/a"], "<p>https://x.test/second</p>");
    }

    #[test]
    fn nothing_to_resolve() {
        let content = resolve_fragments(&[], "https://x.test", &recording());
        assert!(content.is_empty());
    }
}
