//! Request path classification.
//!
//! npm clients only ever ask the gateway for two kinds of documents: the
//! packument of a package (`/<package>`) and a single version of it
//! (`/<package>/<version>`). Scoped packages arrive with the slash encoded
//! (`/@scope%2Fname`). Everything else is handed to the default registry.

use crate::validation::validate_package_name;
use tracing::debug;

/// Semantic meaning of an incoming request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Full packument for a package.
    PackageRoot { package: String },
    /// One specific version of a package.
    PackageVersion { package: String, version: String },
    /// Not a package request; goes to the default registry untouched.
    Unrecognized,
}

/// Classify a URL path (without query string).
pub fn classify_path(path: &str) -> Classified {
    let segments: Vec<&str> = path.split('/').collect();

    if segments.first() != Some(&"") {
        return Classified::Unrecognized;
    }

    match segments.as_slice() {
        [_, package] => {
            let Some(package) = decode_segment(package) else {
                return Classified::Unrecognized;
            };
            match validate_package_name(&package) {
                Ok(()) => Classified::PackageRoot { package },
                Err(e) => {
                    debug!(package = %package, error = %e, "Rejecting package root request");
                    Classified::Unrecognized
                }
            }
        }
        [_, package, version] => match (decode_segment(package), decode_segment(version)) {
            (Some(package), Some(version)) => Classified::PackageVersion { package, version },
            _ => Classified::Unrecognized,
        },
        _ => Classified::Unrecognized,
    }
}

/// Percent-decode one path segment, rejecting malformed escapes and
/// sequences that do not decode to UTF-8.
fn decode_segment(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(segment).ok().map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(package: &str) -> Classified {
        Classified::PackageRoot {
            package: package.to_string(),
        }
    }

    fn version(package: &str, version: &str) -> Classified {
        Classified::PackageVersion {
            package: package.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn test_package_root() {
        assert_eq!(classify_path("/lodash"), root("lodash"));
        assert_eq!(classify_path("/@types%2fnode"), root("@types/node"));
        assert_eq!(classify_path("/@types%2Fnode"), root("@types/node"));
    }

    #[test]
    fn test_package_version() {
        assert_eq!(classify_path("/left-pad/1.0.0"), version("left-pad", "1.0.0"));
        assert_eq!(
            classify_path("/@babel%2fcore/7.0.0-beta.1"),
            version("@babel/core", "7.0.0-beta.1")
        );
        assert_eq!(classify_path("/lodash/latest"), version("lodash", "latest"));
    }

    #[test]
    fn test_version_requests_skip_name_validation() {
        assert_eq!(classify_path("/.hidden/1.0.0"), version(".hidden", "1.0.0"));
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert_eq!(classify_path("/"), Classified::Unrecognized);
        assert_eq!(classify_path(""), Classified::Unrecognized);
        assert_eq!(classify_path("lodash"), Classified::Unrecognized);
        assert_eq!(
            classify_path("/lodash/-/lodash-4.17.21.tgz"),
            Classified::Unrecognized
        );
        assert_eq!(
            classify_path("/-/v1/search"),
            Classified::Unrecognized
        );
    }

    #[test]
    fn test_invalid_root_names_fall_through() {
        assert_eq!(classify_path("/not-a-real%2fpackage"), Classified::Unrecognized);
        assert_eq!(classify_path("/_private"), Classified::Unrecognized);
        assert_eq!(classify_path("/favicon.ico"), Classified::Unrecognized);
    }

    #[test]
    fn test_malformed_encoding_is_unrecognized() {
        assert_eq!(classify_path("/bad%zzname"), Classified::Unrecognized);
        assert_eq!(classify_path("/truncated%2"), Classified::Unrecognized);
        assert_eq!(classify_path("/pkg/%ff"), Classified::Unrecognized);
    }
}
