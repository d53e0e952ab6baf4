//! Input documents and their fingerprints.

use std::fmt;

use sha2::{Digest as _, Sha256};

use crate::prelude::*;

/// MIME type of a PDF.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// MIME type of a Word `.docx` file.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type of plain text.
pub const TEXT_MIME_TYPE: &str = "text/plain";

/// A file submitted for extraction.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    /// The file name, used in messages and for type detection.
    pub name: String,
    /// The declared MIME type, if known.
    pub media_type: Option<String>,
    /// The file's contents.
    pub data: Vec<u8>,
}

impl SourceDocument {
    /// Create a document from its parts.
    pub fn new(
        name: impl Into<String>,
        media_type: Option<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type,
            data: data.into(),
        }
    }

    /// Read a document from disk.
    ///
    /// The declared type is guessed from the extension, the way a browser
    /// would. If the extension tells us nothing, we sniff the content.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {:?}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_owned())
            .or_else(|| infer::get(&data).map(|t| t.mime_type().to_owned()));
        debug!(?media_type, size = data.len(), "Read source document");
        Ok(Self {
            name,
            media_type,
            data,
        })
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The declared MIME type, or an empty string.
    pub fn media_type(&self) -> &str {
        self.media_type.as_deref().unwrap_or("")
    }

    /// Does the file name end with `extension` (ignoring case)?
    pub fn has_extension(&self, extension: &str) -> bool {
        Path::new(&self.name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Compute this document's content fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.data)
    }
}

/// Identifies a document by its content, never its name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    /// Hex-encoded SHA-256 of the content.
    pub sha256: String,
    /// Content size in bytes.
    pub size: u64,
}

impl Fingerprint {
    /// Fingerprint some bytes.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self {
            sha256: hex::encode(digest),
            size: data.len() as u64,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.sha256, self.size)
    }
}
