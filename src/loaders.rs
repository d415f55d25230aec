//! Schema document loading
//!
//! Reads schema text from disk, from remote locations (with the `remote`
//! feature) or from memory, and parses it under the configured limits.

use crate::documents::{Document, Element};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::fs;

/// Reads and parses schema documents
#[derive(Debug, Clone)]
pub struct Loader {
    limits: Limits,
    allow_remote: bool,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            allow_remote: true,
        }
    }
}

impl Loader {
    /// Loader with default limits that may fetch remote locations
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Refuse (or permit) URL locations
    pub fn with_allow_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }

    /// Limits applied to every document read
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Read the text at `location`
    pub fn load(&self, location: &Location) -> Result<String> {
        let text = match location {
            Location::String(text) => return Ok(text.clone()),
            Location::Path(path) => {
                tracing::debug!(path = %path.display(), "reading schema file");
                fs::read_to_string(path).map_err(|e| {
                    Error::Resource(format!("cannot read '{}': {}", path.display(), e))
                })?
            }
            Location::Url(url) if self.allow_remote => fetch_remote(url)?,
            Location::Url(url) => {
                return Err(Error::Resource(format!(
                    "remote locations are disabled: {}",
                    url
                )))
            }
        };
        self.limits.check_size(text.len())?;
        Ok(text)
    }

    /// Read and parse the document at `location`, returning its root
    pub fn load_element(&self, location: &Location) -> Result<Element> {
        let text = self.load(location)?;
        Document::parse_with_limits(text.as_bytes(), &self.limits)?
            .root
            .ok_or_else(|| Error::Xml(format!("'{}' has no root element", location.as_str())))
    }
}

#[cfg(feature = "remote")]
fn fetch_remote(url: &url::Url) -> Result<String> {
    tracing::debug!(%url, "fetching remote schema");
    let fetch_error = |e: reqwest::Error| Error::Resource(format!("cannot fetch '{}': {}", url, e));
    reqwest::blocking::get(url.clone())
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(reqwest::blocking::Response::text)
        .map_err(fetch_error)
}

#[cfg(not(feature = "remote"))]
fn fetch_remote(url: &url::Url) -> Result<String> {
    Err(Error::Resource(format!(
        "fetching '{}' needs the 'remote' feature",
        url
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_file_and_root() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#).unwrap();
        let location = Location::Path(file.path().to_path_buf());

        let loader = Loader::new();
        assert!(loader.load(&location).unwrap().contains("xs:schema"));
        let root = loader.load_element(&location).unwrap();
        assert_eq!(root.local_name(), "schema");
    }

    #[test]
    fn test_in_memory_text_is_returned_as_is() {
        let location = Location::String("<a/>".to_string());
        assert_eq!(Loader::new().load(&location).unwrap(), "<a/>");
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let location = Location::Path("/definitely/not/here.xsd".into());
        let result = Loader::new().load(&location);
        assert!(matches!(result, Err(Error::Resource(_))));
    }

    #[test]
    fn test_strict_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![b' '; 11 * 1024 * 1024]).unwrap();
        let location = Location::Path(file.path().to_path_buf());

        let loader = Loader::new().with_limits(Limits::strict());
        assert!(matches!(loader.load(&location), Err(Error::LimitExceeded(_))));
        assert!(Loader::new().load(&location).is_ok());
    }

    #[test]
    fn test_remote_disallowed() {
        let location = Location::from_str("http://example.com/a.xsd").unwrap();
        let loader = Loader::new().with_allow_remote(false);
        assert!(matches!(loader.load(&location), Err(Error::Resource(_))));
    }
}
