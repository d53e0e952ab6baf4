//! Command-line entry points.

use std::sync::Arc;

use clap::Args;

use crate::{
    cache::{DirCache, ExtractionCache, MemoryCache},
    extractor::{DocumentExtractor, ExtractOptions},
    ocr::tesseract::TesseractOcrEngine,
    page_iter::PopplerPdfBackend,
    prelude::*,
    source::SourceDocument,
    text::corrections::OcrCorrector,
    ui::Ui,
};

pub mod extract;
pub mod parse;
pub mod schema;

/// Options shared by subcommands that extract text from files.
#[derive(Debug, Clone, Default, Args)]
pub struct ExtractOpts {
    #[clap(flatten)]
    pub extract: ExtractOptions,

    /// A TOML or JSON correction table to use instead of the built-in one.
    #[clap(long, value_name = "PATH")]
    pub corrections: Option<PathBuf>,

    /// Keep extracted text in this directory, so that identical files are
    /// only extracted once across runs.
    #[clap(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// What portion of inputs should we allow to fail? Specified as a
    /// number between 0.0 and 1.0.
    #[clap(long, default_value = "0.0")]
    pub allowed_failure_rate: f32,
}

impl ExtractOpts {
    /// Build an extractor using Poppler and Tesseract.
    pub async fn build_extractor(&self) -> Result<DocumentExtractor> {
        let cache: Arc<dyn ExtractionCache> = match &self.cache_dir {
            Some(dir) => Arc::new(DirCache::open(dir).await?),
            None => Arc::new(MemoryCache::new()),
        };
        let extractor = DocumentExtractor::new(
            Arc::new(PopplerPdfBackend::new()),
            Arc::new(TesseractOcrEngine::new()),
            cache,
            self.extract.clone(),
        );
        Ok(match &self.corrections {
            Some(path) => extractor.with_corrector(OcrCorrector::from_path(path).await?),
            None => extractor,
        })
    }
}

/// Read and extract a single file, showing each step on a spinner.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn extract_file(
    ui: &Ui,
    extractor: &DocumentExtractor,
    path: &Path,
    purpose: &str,
) -> Result<String> {
    let doc = SourceDocument::from_path(path).await?;
    let spinner = ui.new_step_spinner(&doc.name);
    let progress = |msg: &str| spinner.set_message(msg.to_owned());
    let result = extractor.extract(&doc, purpose, &progress).await;
    spinner.finish_and_clear();
    result
}
