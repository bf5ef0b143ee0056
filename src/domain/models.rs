//! Domain models for documents and sync destinations.
//!
//! These models represent the files offered by the reference manager and the
//! notebook projects they are pushed into.

use serde::{Deserialize, Serialize};

/// Identity used when the target surface does not expose a notebook id.
pub const UNSCOPED_DESTINATION: &str = "unscoped";

/// Content types accepted by the upload surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MimeType {
    /// `application/pdf`
    Pdf,
    /// `text/plain`
    PlainText,
    /// `text/markdown`
    Markdown,
    /// Office word-processing document (docx).
    WordDocument,
}

impl MimeType {
    /// Every accepted type, in display order.
    pub const ALL: [Self; 4] = [Self::Pdf, Self::PlainText, Self::Markdown, Self::WordDocument];

    /// The wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
            Self::Markdown => "text/markdown",
            Self::WordDocument => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl std::str::FromStr for MimeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| format!("Unsupported mime type: {s}"))
    }
}

impl TryFrom<String> for MimeType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MimeType> for String {
    fn from(mime: MimeType) -> Self {
        mime.as_str().to_string()
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One syncable file offered by the source repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Stable attachment id, unique within the source.
    pub id: String,
    /// Owning bibliographic record (informational).
    #[serde(default)]
    pub parent_id: String,
    /// Display title of the parent record.
    #[serde(default)]
    pub title: String,
    /// File name used on delivery.
    pub filename: String,
    /// Content type used on delivery.
    pub mime_type: MimeType,
    /// Content hash; empty when the source could not provide one.
    #[serde(default)]
    pub fingerprint: String,
    /// Opaque comparable modification marker.
    #[serde(default)]
    pub modified_at: String,
}

impl Document {
    /// Name to show in status messages.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            &self.filename
        } else {
            &self.title
        }
    }
}

/// Filters used to select candidates from the source repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuery {
    /// Tag that candidates must carry.
    pub tag: Option<String>,
    /// Collection (matched by name, case-insensitive) to search in.
    pub collection_name: Option<String>,
    /// Library to search; the user library when absent.
    pub library_id: Option<String>,
}

/// A configured sync project, i.e. one destination and its source filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project name, unique case-insensitively.
    pub name: String,

    /// Tag filter.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,

    /// Collection name filter.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection: String,

    /// Library id filter.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub library_id: String,
}

impl Project {
    /// Build the source query, treating blank filters as absent.
    #[must_use]
    pub fn query(&self) -> SourceQuery {
        fn non_blank(s: &str) -> Option<String> {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        SourceQuery {
            tag: non_blank(&self.tag),
            collection_name: non_blank(&self.collection),
            library_id: non_blank(&self.library_id),
        }
    }

    /// Short description of active filters.
    #[must_use]
    pub fn filter_summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.collection.is_empty() {
            parts.push(format!("collection={}", self.collection));
        }
        if !self.tag.is_empty() {
            parts.push(format!("tag={}", self.tag));
        }
        if !self.library_id.is_empty() {
            parts.push(format!("library={}", self.library_id));
        }

        if parts.is_empty() {
            "No filters active".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Raw file content returned by the source.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    /// Decoded file bytes.
    pub bytes: Vec<u8>,
    /// Content type reported by the source, if any.
    pub mime_type: Option<String>,
}

/// One file handed to the delivery adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFile {
    pub filename: String,
    pub mime_type: MimeType,
    pub bytes: Vec<u8>,
}

/// The live upload surface as reported by the locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSurface {
    /// Current location of the surface.
    pub url: String,
}

impl TargetSurface {
    /// Derive the destination id from the notebook path segment.
    ///
    /// Falls back to [`UNSCOPED_DESTINATION`] when the location carries no id.
    #[must_use]
    pub fn destination_id(&self) -> String {
        self.url
            .split_once("notebook/")
            .map(|(_, rest)| {
                rest.split(['/', '?', '#'])
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| UNSCOPED_DESTINATION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_parse() {
        assert_eq!("application/pdf".parse::<MimeType>(), Ok(MimeType::Pdf));
        assert_eq!("Text/Markdown".parse::<MimeType>(), Ok(MimeType::Markdown));
        assert!("image/png".parse::<MimeType>().is_err());
    }

    #[test]
    fn test_mime_type_serde_uses_wire_string() {
        let json = serde_json::to_string(&MimeType::WordDocument).unwrap();
        assert_eq!(
            json,
            "\"application/vnd.openxmlformats-officedocument.wordprocessingml.document\""
        );
        let back: MimeType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MimeType::WordDocument);
    }

    #[test]
    fn test_destination_id_from_url() {
        let surface = TargetSurface {
            url: "https://notebooklm.google.com/notebook/abc-123?authuser=0".into(),
        };
        assert_eq!(surface.destination_id(), "abc-123");

        let surface = TargetSurface {
            url: "https://notebooklm.google.com/notebook/xyz/sources#top".into(),
        };
        assert_eq!(surface.destination_id(), "xyz");
    }

    #[test]
    fn test_destination_id_falls_back_to_unscoped() {
        let surface = TargetSurface {
            url: "https://notebooklm.google.com/".into(),
        };
        assert_eq!(surface.destination_id(), UNSCOPED_DESTINATION);

        let surface = TargetSurface {
            url: "https://notebooklm.google.com/notebook/".into(),
        };
        assert_eq!(surface.destination_id(), UNSCOPED_DESTINATION);
    }

    #[test]
    fn test_project_query_treats_blank_as_absent() {
        let project = Project {
            name: "Thesis".into(),
            tag: "  ".into(),
            collection: " Reading ".into(),
            library_id: String::new(),
        };
        let query = project.query();
        assert_eq!(query.tag, None);
        assert_eq!(query.collection_name.as_deref(), Some("Reading"));
        assert_eq!(query.library_id, None);
    }

    #[test]
    fn test_filter_summary() {
        let project = Project {
            name: "Empty".into(),
            ..Default::default()
        };
        assert_eq!(project.filter_summary(), "No filters active");

        let project = Project {
            name: "Tagged".into(),
            tag: "NotebookLM".into(),
            ..Default::default()
        };
        assert_eq!(project.filter_summary(), "tag=NotebookLM");
    }
}
