//! Resource location resolution
//!
//! This module handles resolution of resource locations (URLs, file paths)
//! for loading schemas, including joining an `include`/`import`
//! `schemaLocation` against the location of the referencing document.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Resource location - can be a URL, file path, or string identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ftp, etc.)
    Url(Url),
    /// In-memory document text
    String(String),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    pub fn from_str(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            if url.scheme() == "file" {
                let path = url
                    .to_file_path()
                    .map_err(|_| Error::Resource(format!("Invalid file URL: {}", s)))?;
                return Ok(Location::Path(path));
            }
            // Single-letter schemes are Windows drive letters
            if url.scheme().len() > 1 {
                return Ok(Location::Url(url));
            }
        }

        let trimmed = s.trim_start();
        if trimmed.starts_with('<') {
            return Ok(Location::String(s.to_string()));
        }

        Ok(Location::Path(PathBuf::from(s)))
    }

    /// Resolve `location` relative to the document found at `base`
    ///
    /// An empty base leaves the location as given. Relative locations are
    /// taken from the directory of the base document.
    pub fn join(base: &str, location: &str) -> Result<Self> {
        if base.is_empty() {
            return Self::from_str(location);
        }
        if let Ok(url) = Url::parse(location) {
            if url.scheme().len() > 1 {
                return Self::from_str(location);
            }
        }

        match Self::from_str(base)? {
            Location::Url(base_url) => Ok(Location::Url(base_url.join(location)?)),
            Location::Path(base_path) => {
                let relative = Path::new(location);
                if relative.is_absolute() {
                    return Ok(Location::Path(relative.to_path_buf()));
                }
                let dir = if base.ends_with('/') || base_path.is_dir() {
                    base_path
                } else {
                    base_path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default()
                };
                Ok(Location::Path(normalize(&dir.join(relative))))
            }
            Location::String(_) => Self::from_str(location),
        }
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(s) => s.clone(),
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, Location::Path(_))
    }
}

/// Fold `.` and `..` components so one document has one location
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc = Location::from_str("http://example.com/schema.xsd").unwrap();
        assert!(matches!(loc, Location::Url(_)));
        assert!(loc.is_remote());
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::from_str("/tmp/schema.xsd").unwrap();
        assert!(matches!(loc, Location::Path(_)));
        assert!(loc.is_file());

        let loc = Location::from_str("file:///tmp/schema.xsd").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("/tmp/schema.xsd")));
    }

    #[test]
    fn test_location_from_text() {
        let loc = Location::from_str("<xs:schema/>").unwrap();
        assert_eq!(loc.as_str(), "<xs:schema/>");
    }

    #[test]
    fn test_join_relative_to_document() {
        let loc = Location::join("/data/wsdl/service.wsdl", "types.xsd").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("/data/wsdl/types.xsd")));

        let loc = Location::join("http://example.com/a/service.wsdl", "b/types.xsd").unwrap();
        assert_eq!(loc.as_str(), "http://example.com/a/b/types.xsd");

        let loc = Location::join("", "types.xsd").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("types.xsd")));
    }

    #[test]
    fn test_join_normalizes_parent_components() {
        let loc = Location::join("/data/parts/lines.xsd", "../parts/./lines.xsd").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("/data/parts/lines.xsd")));

        let loc = Location::join("schemas/a.xsd", "../../b.xsd").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("../b.xsd")));
    }

    #[test]
    fn test_join_absolute_location_wins() {
        let loc = Location::join("/data/service.wsdl", "http://other.org/x.xsd").unwrap();
        assert_eq!(loc.as_str(), "http://other.org/x.xsd");
    }
}
