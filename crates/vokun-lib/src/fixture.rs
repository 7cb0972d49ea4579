//! File-backed canned responses.
//!
//! A fixture lives at `<root>/<subpath>.<verb>` with the verb lower-cased.
//! The file is a JSON metadata object, a line holding only `---`, and then the
//! raw response body:
//!
//! ```text
//! {"headers":{"Content-Type":"application/json"},"status_code":200}
//! ---
//! {"id": 1}
//! ```
//!
//! Everything after the first separator line is returned byte for byte,
//! including any further `---` lines and trailing newlines.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Separator between the metadata block and the body, newlines included.
pub const FIXTURE_SENTINEL: &[u8] = b"\n---\n";

const DEFAULT_STATUS_CODE: u16 = 200;

/// A resolved canned response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Response headers, one value per name.
    pub headers: BTreeMap<String, String>,
    /// Response status code.
    pub status_code: u16,
    /// Literal response body.
    pub content: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct FixtureMetadata {
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default = "default_status_code")]
    status_code: u16,
}

fn default_status_code() -> u16 {
    DEFAULT_STATUS_CODE
}

/// Read-only view over a directory of fixture files.
#[derive(Debug, Clone)]
pub struct FixtureStore {
    root: PathBuf,
}

impl FixtureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the fixture file for `subpath` answered with `verb`.
    ///
    /// Leading slashes on the subpath are ignored. Subpaths that would climb
    /// out of the root are rejected.
    pub fn fixture_path(&self, subpath: &str, verb: &str) -> Result<PathBuf> {
        let relative = subpath.trim_start_matches('/');
        let escapes = Path::new(relative)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::FixtureOutsideRoot {
                subpath: subpath.to_string(),
            });
        }

        let file_name = format!("{}.{}", relative, verb.to_lowercase());
        Ok(self.root.join(file_name))
    }

    /// Load and parse the fixture for `subpath` and `verb`.
    pub fn resolve(&self, subpath: &str, verb: &str) -> Result<Fixture> {
        let path = self.fixture_path(subpath, verb)?;
        let bytes = fs::read(&path).map_err(|source| Error::FixtureNotFound {
            path: path.clone(),
            source,
        })?;

        let fixture = parse_fixture(&path, &bytes)?;
        debug!(
            path = %path.display(),
            status = fixture.status_code,
            content_len = fixture.content.len(),
            "resolved fixture"
        );
        Ok(fixture)
    }
}

/// Split raw fixture bytes into metadata and body.
///
/// `path` is only used to label errors.
pub fn parse_fixture(path: &Path, bytes: &[u8]) -> Result<Fixture> {
    let Some(index) = find_sentinel(bytes) else {
        return Err(Error::MissingSentinel {
            path: path.to_path_buf(),
            content: String::from_utf8_lossy(bytes).into_owned(),
        });
    };

    let (metadata, rest) = bytes.split_at(index);
    let metadata: FixtureMetadata =
        serde_json::from_slice(metadata).map_err(|source| Error::InvalidMetadata {
            path: path.to_path_buf(),
            metadata: String::from_utf8_lossy(metadata).into_owned(),
            source,
        })?;

    Ok(Fixture {
        headers: metadata.headers,
        status_code: metadata.status_code,
        content: rest[FIXTURE_SENTINEL.len()..].to_vec(),
    })
}

fn find_sentinel(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(FIXTURE_SENTINEL.len())
        .position(|window| window == FIXTURE_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(text: &str) -> Result<Fixture> {
        parse_fixture(Path::new("test.get"), text.as_bytes())
    }

    #[test]
    fn parses_metadata_and_body() {
        let fixture = parse("{\"headers\":{\"X\":\"Y\"},\"status_code\":201}\n---\nhello").unwrap();
        assert_eq!(fixture.headers.get("X").map(String::as_str), Some("Y"));
        assert_eq!(fixture.status_code, 201);
        assert_eq!(fixture.content, b"hello");
    }

    #[test]
    fn splits_on_first_separator_only() {
        let fixture = parse("{}\n---\nline one\n---\nline two\n").unwrap();
        assert_eq!(fixture.content, b"line one\n---\nline two\n");
    }

    #[test]
    fn empty_body_is_allowed() {
        let fixture = parse("{\"status_code\":204}\n---\n").unwrap();
        assert_eq!(fixture.status_code, 204);
        assert!(fixture.content.is_empty());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let fixture = parse("{}\n---\nok").unwrap();
        assert!(fixture.headers.is_empty());
        assert_eq!(fixture.status_code, DEFAULT_STATUS_CODE);
    }

    #[test]
    fn separator_must_be_on_its_own_line() {
        let err = parse("{} ---\nbody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFixture);
        assert_eq!(err.fixture_content(), Some("{} ---\nbody"));

        let err = parse("{}\n--- \nbody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFixture);
    }

    #[test]
    fn bad_metadata_is_malformed() {
        let err = parse("not json\n---\nbody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFixture);
        assert_eq!(err.fixture_content(), Some("not json"));

        let err = parse("{\"status_code\":70000}\n---\nbody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFixture);
    }

    #[test]
    fn body_bytes_are_preserved() {
        let mut raw = b"{}\n---\n".to_vec();
        raw.extend_from_slice(&[0xff, 0x00, b'\r', b'\n', 0xfe]);
        let fixture = parse_fixture(Path::new("bin.get"), &raw).unwrap();
        assert_eq!(fixture.content, vec![0xff, 0x00, b'\r', b'\n', 0xfe]);
    }

    #[test]
    fn fixture_path_lowercases_verb() {
        let store = FixtureStore::new("/srv/fixtures");
        let path = store.fixture_path("users/1", "GET").unwrap();
        assert_eq!(path, PathBuf::from("/srv/fixtures/users/1.get"));

        let path = store.fixture_path("/users", "Post").unwrap();
        assert_eq!(path, PathBuf::from("/srv/fixtures/users.post"));
    }

    #[test]
    fn fixture_path_rejects_parent_components() {
        let store = FixtureStore::new("/srv/fixtures");
        let err = store.fixture_path("../etc/passwd", "get").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store.fixture_path("a/../../b", "get").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
