//! # Cache Keys
//!
//! Maps a URL onto a relative file path: `{host}/{path segments...}`.

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use url::Url;

use crate::FetchError;

/// File name used when the URL path is empty or ends with `/`
const INDEX_FILE: &str = "index";

/// Hex digits of the query digest appended to the file name
const QUERY_DIGEST_LEN: usize = 16;

/// Relative location of a cached response under the cache root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    relative: PathBuf,
}

impl CacheKey {
    /// Derive the key for `url`.
    ///
    /// With `include_query` set, a non-empty query string adds an
    /// `@<digest>` suffix to the file name so that `a.json?x=1` and
    /// `a.json?x=2` land in different files. URLs without a query map to
    /// the same path either way.
    pub fn from_url(url: &Url, include_query: bool) -> Result<Self, FetchError> {
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::InvalidUrl(format!("{url} has no host")))?;

        let host_dir = match url.port() {
            Some(port) => format!("{host}_{port}"),
            None => host.to_string(),
        };
        // IPv6 literals
        let host_dir = host_dir.replace([':', '[', ']'], "_");

        let mut relative = PathBuf::from(host_dir);
        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty() && *s != "." && *s != "..")
                    .collect()
            })
            .unwrap_or_default();

        if segments.is_empty() || url.path().ends_with('/') {
            segments.push(INDEX_FILE);
        }

        let (file_name, dirs) = segments
            .split_last()
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        for dir in dirs {
            relative.push(dir);
        }

        match url.query().filter(|q| include_query && !q.is_empty()) {
            Some(query) => {
                let digest = hex::encode(Sha256::digest(query.as_bytes()));
                relative.push(format!("{file_name}@{}", &digest[..QUERY_DIGEST_LEN]));
            }
            None => relative.push(file_name),
        }

        // `.` and `..` are valid hosts to the URL parser
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(FetchError::InvalidUrl(format!(
                "{url} does not map into the cache root"
            )));
        }

        Ok(Self { relative })
    }

    /// Path relative to the cache root
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(url: &str, include_query: bool) -> PathBuf {
        CacheKey::from_url(&Url::parse(url).unwrap(), include_query)
            .unwrap()
            .relative_path()
            .to_path_buf()
    }

    #[test]
    fn test_host_and_path() {
        assert_eq!(
            key("https://www.jma.go.jp/bosai/common/const/area.json", true),
            Path::new("www.jma.go.jp/bosai/common/const/area.json")
        );
        assert_eq!(
            key("https://example.test/a/b.json", false),
            Path::new("example.test/a/b.json")
        );
    }

    #[test]
    fn test_empty_and_trailing_slash_paths() {
        assert_eq!(key("https://example.test", true), Path::new("example.test/index"));
        assert_eq!(key("https://example.test/", true), Path::new("example.test/index"));
        assert_eq!(
            key("https://example.test/dir/", true),
            Path::new("example.test/dir/index")
        );
    }

    #[test]
    fn test_explicit_port() {
        assert_eq!(
            key("http://localhost:8080/x.json", true),
            Path::new("localhost_8080/x.json")
        );
        // default port is not part of the key
        assert_eq!(
            key("https://example.test:443/x.json", true),
            Path::new("example.test/x.json")
        );
    }

    #[test]
    fn test_query_handling() {
        let plain = key("https://example.test/a.json", true);
        let q1 = key("https://example.test/a.json?x=1", true);
        let q2 = key("https://example.test/a.json?x=2", true);

        assert_ne!(q1, q2);
        assert_ne!(q1, plain);
        assert!(q1.to_string_lossy().starts_with("example.test/a.json@"));

        // without the flag, queries collide onto the bare path
        assert_eq!(key("https://example.test/a.json?x=1", false), plain);
        assert_eq!(key("https://example.test/a.json?x=2", false), plain);
        // an empty query is no query
        assert_eq!(key("https://example.test/a.json?", true), plain);
    }

    #[test]
    fn test_dot_segments_cannot_escape_root() {
        let path = key("https://example.test/a/../../../etc/passwd", true);
        assert_eq!(path, Path::new("example.test/etc/passwd"));
    }

    #[test]
    fn test_dot_hosts_are_rejected() {
        for raw in ["http://../x.json", "http://%2e%2e/x.json"] {
            let url = Url::parse(raw).unwrap();
            let err = CacheKey::from_url(&url, true).unwrap_err();
            assert!(matches!(err, FetchError::InvalidUrl(_)), "{raw}");
        }
    }

    #[test]
    fn test_url_without_host_is_rejected() {
        let url = Url::parse("file:///tmp/area.json").unwrap();
        let err = CacheKey::from_url(&url, true).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
