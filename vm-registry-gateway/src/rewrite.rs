//! Rebasing request URLs onto upstream registry base URLs.

use url::Url;

/// Rewrite the base part of `source` onto `destination`.
///
/// The result takes scheme, credentials, host, port and base path from
/// `destination`; the path of `source` is appended below that base path and
/// the query string of `source` is kept.
///
/// ```rust
/// use url::Url;
/// use vm_registry_gateway::rewrite::rewrite_base;
///
/// let source = Url::parse("http://gateway/lodash").unwrap();
/// let target = Url::parse("https://registry-a.example/prefix/").unwrap();
/// assert_eq!(
///     rewrite_base(&source, &target).as_str(),
///     "https://registry-a.example/prefix/lodash"
/// );
/// ```
pub fn rewrite_base(source: &Url, destination: &Url) -> Url {
    let mut rewritten = destination.clone();
    rewritten.set_path(&join_paths(destination.path(), source.path()));
    rewritten.set_query(source.query());
    rewritten.set_fragment(None);
    rewritten
}

/// Build the URL of `segments` below a registry base.
///
/// Each segment is percent-encoded except for `A-Z a-z 0-9 - _ . ~`. This is
/// stricter than `encodeURIComponent`: `! ' ( ) *` are escaped as well, which
/// registries decode back to the same package name.
pub fn registry_url(base: &Url, segments: &[&str]) -> Url {
    let path: String = segments
        .iter()
        .map(|segment| format!("/{}", urlencoding::encode(segment)))
        .collect();

    let mut url = base.clone();
    url.set_path(&join_paths(base.path(), &path));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Join two URL paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
