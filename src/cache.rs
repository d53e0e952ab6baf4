//! Content-addressed cache of extracted text.
//!
//! OCR is slow, and the same file is often submitted more than once. We key
//! extracted text by the document's [`Fingerprint`] and a purpose tag, so two
//! byte-identical uploads only get extracted once.

use std::{collections::HashMap, io::Write as _, sync::Mutex};

use crate::{
    async_utils::blocking_iter_streams::spawn_blocking_propagating_panics,
    ocr::DocumentKind,
    prelude::*,
    source::Fingerprint,
};

/// Default purpose tag for extracted text.
pub const DEFAULT_PURPOSE: &str = "text-extraction";

/// Purpose tag for text extracted to parse a CV.
pub const CV_PURPOSE: &str = "text-extraction-cv";

/// The purpose tag to use when extracting text for a `kind` of document.
pub fn purpose_for(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Cv => CV_PURPOSE,
        DocumentKind::Jd => DEFAULT_PURPOSE,
    }
}

/// Key for a cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// The document's content fingerprint.
    pub fingerprint: Fingerprint,
    /// What the text was extracted for. Different purposes may extract
    /// differently, so they never share entries.
    pub purpose: String,
}

impl CacheKey {
    /// Create a new key.
    pub fn new(fingerprint: Fingerprint, purpose: impl Into<String>) -> Self {
        Self {
            fingerprint,
            purpose: purpose.into(),
        }
    }

    /// A file name for this key. Purpose characters that aren't safe in file
    /// names are replaced with `_`.
    fn file_name(&self) -> String {
        let purpose = self
            .purpose
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();
        format!("{}-{}.txt", self.fingerprint, purpose)
    }
}

/// A key-value store for extracted text.
///
/// The last write for a key wins. Eviction is somebody else's problem.
#[async_trait]
pub trait ExtractionCache: Send + Sync + 'static {
    /// Look up a key.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>>;

    /// Store a value.
    async fn set(&self, key: &CacheKey, text: &str) -> Result<()>;
}

/// An in-memory cache, for a single process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, String>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExtractionCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &CacheKey, text: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?;
        entries.insert(key.clone(), text.to_owned());
        Ok(())
    }
}

/// A cache stored as one text file per entry in a directory.
///
/// Entries are written to a temporary file and renamed into place, so readers
/// never see a partial entry.
#[derive(Clone, Debug)]
pub struct DirCache {
    dir: PathBuf,
}

impl DirCache {
    /// Open (and if necessary create) a cache directory.
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await.with_context(|| {
            format!("failed to create cache directory {:?}", dir.display())
        })?;
        Ok(Self {
            dir: dir.to_owned(),
        })
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

#[async_trait]
impl ExtractionCache for DirCache {
    #[instrument(level = "trace", skip_all)]
    async fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let path = self.entry_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read cache entry {:?}", path.display())),
        }
    }

    #[instrument(level = "trace", skip_all)]
    async fn set(&self, key: &CacheKey, text: &str) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.entry_path(key);
        let text = text.to_owned();
        spawn_blocking_propagating_panics(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir).with_context(|| {
                format!("failed to create temporary file in {:?}", dir.display())
            })?;
            tmp.write_all(text.as_bytes())
                .context("failed to write cache entry")?;
            tmp.flush().context("failed to flush cache entry")?;
            tmp.persist(&path).with_context(|| {
                format!("failed to move cache entry to {:?}", path.display())
            })?;
            Ok(())
        })
        .await
    }
}
