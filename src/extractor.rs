//! Turning a [`SourceDocument`] into clean text.
//!
//! Each file goes through the same steps: size check, cache lookup, a
//! type-specific read (PDF text layer, PDF OCR, DOCX, image OCR or plain text),
//! OCR error correction, normalization and a cache store. A progress callback
//! hears about each step.

use std::{fmt, sync::Arc};

use clap::Args;
use futures::StreamExt as _;

use crate::{
    async_utils::blocking_iter_streams::{
        BlockingIterStream, spawn_blocking_propagating_panics,
    },
    cache::{CacheKey, ExtractionCache},
    ocr::{DocumentKind, OcrAdapter, OcrEngine, OcrOptions},
    page_iter::{PdfBackend, scale_to_dpi},
    prelude::*,
    raster::PageImage,
    source::{DOCX_MIME_TYPE, PDF_MIME_TYPE, SourceDocument, TEXT_MIME_TYPE},
    text::{corrections::OcrCorrector, is_text_sufficient, normalize_text},
};

/// Largest file we accept, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 15 * 1024 * 1024;

/// How many leading pages we read to decide whether a PDF needs OCR.
pub const DEFAULT_TEXT_CHECK_PAGES: usize = 3;

/// How many pages of a scanned PDF we OCR.
pub const DEFAULT_MAX_OCR_PAGES: usize = 2;

/// PDF render scale for OCR, relative to 72 DPI.
pub const DEFAULT_RENDER_SCALE: f32 = 1.5;

/// Input images are scaled to fit inside this box before OCR.
pub const DEFAULT_MAX_IMAGE_WIDTH: u32 = 1600;
/// See [`DEFAULT_MAX_IMAGE_WIDTH`].
pub const DEFAULT_MAX_IMAGE_HEIGHT: u32 = 2200;

/// Never scale small images up by more than this.
pub const DEFAULT_MAX_IMAGE_UPSCALE: f32 = 2.0;

/// A progress callback. Receives one human-readable message per step.
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Options controlling extraction.
#[derive(Args, Clone, Debug)]
pub struct ExtractOptions {
    /// Largest file to accept, in bytes.
    #[clap(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Meaningful characters a PDF text layer needs before we skip OCR.
    #[clap(long, default_value_t = crate::text::DEFAULT_MIN_MEANINGFUL_LENGTH)]
    pub min_meaningful_length: usize,

    /// Number of leading PDF pages to check for a usable text layer.
    #[clap(long, default_value_t = DEFAULT_TEXT_CHECK_PAGES)]
    pub text_check_pages: usize,

    /// Maximum number of scanned PDF pages to OCR.
    #[clap(long, default_value_t = DEFAULT_MAX_OCR_PAGES)]
    pub max_ocr_pages: usize,

    /// Render scale for scanned PDF pages (1.0 = 72 DPI).
    #[clap(long, default_value_t = DEFAULT_RENDER_SCALE)]
    pub render_scale: f32,

    /// Maximum width of an input image after scaling.
    #[clap(long, default_value_t = DEFAULT_MAX_IMAGE_WIDTH)]
    pub max_image_width: u32,

    /// Maximum height of an input image after scaling.
    #[clap(long, default_value_t = DEFAULT_MAX_IMAGE_HEIGHT)]
    pub max_image_height: u32,

    /// Maximum factor by which to enlarge small input images.
    #[clap(long, default_value_t = DEFAULT_MAX_IMAGE_UPSCALE)]
    pub max_image_upscale: f32,

    /// OCR profile set to use for input images.
    #[clap(long, value_enum, default_value_t = DocumentKind::Jd)]
    pub image_kind: DocumentKind,

    #[clap(flatten)]
    pub ocr: OcrOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            min_meaningful_length: crate::text::DEFAULT_MIN_MEANINGFUL_LENGTH,
            text_check_pages: DEFAULT_TEXT_CHECK_PAGES,
            max_ocr_pages: DEFAULT_MAX_OCR_PAGES,
            render_scale: DEFAULT_RENDER_SCALE,
            max_image_width: DEFAULT_MAX_IMAGE_WIDTH,
            max_image_height: DEFAULT_MAX_IMAGE_HEIGHT,
            max_image_upscale: DEFAULT_MAX_IMAGE_UPSCALE,
            image_kind: DocumentKind::Jd,
            ocr: OcrOptions::default(),
        }
    }
}

/// Extraction steps, as reported to the progress callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    CheckingSize,
    CheckingCache,
    CacheHit,
    ReadingTextLayer { pages: usize },
    ReadingRemainingPages { pages: usize },
    TextLayerInsufficient,
    RenderingPage { page: usize, total: usize },
    RecognizingPage { page: usize, total: usize },
    ReadingDocx,
    RecognizingImage,
    ReadingPlainText,
    Correcting,
    Normalizing,
    Storing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::CheckingSize => write!(f, "Checking file size"),
            Stage::CheckingCache => write!(f, "Checking cache"),
            Stage::CacheHit => write!(f, "Using cached text"),
            Stage::ReadingTextLayer { pages } => {
                write!(f, "Reading text layer of first {} page(s)", pages)
            }
            Stage::ReadingRemainingPages { pages } => {
                write!(f, "Reading text layer of remaining {} page(s)", pages)
            }
            Stage::TextLayerInsufficient => {
                write!(f, "Text layer is insufficient, switching to OCR")
            }
            Stage::RenderingPage { page, total } => {
                write!(f, "Rendering page {}/{}", page, total)
            }
            Stage::RecognizingPage { page, total } => {
                write!(f, "Recognizing page {}/{}", page, total)
            }
            Stage::ReadingDocx => write!(f, "Reading DOCX"),
            Stage::RecognizingImage => write!(f, "Recognizing image"),
            Stage::ReadingPlainText => write!(f, "Reading plain text"),
            Stage::Correcting => write!(f, "Correcting OCR errors"),
            Stage::Normalizing => write!(f, "Normalizing text"),
            Stage::Storing => write!(f, "Saving to cache"),
            Stage::Done => write!(f, "Done"),
        }
    }
}

/// How we read a particular document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DocumentType {
    Pdf,
    Docx,
    Image,
    PlainText,
}

impl DocumentType {
    /// Decide how to read `doc`, from its declared type and name.
    fn of(doc: &SourceDocument) -> Result<Self> {
        let media_type = doc.media_type();
        if media_type == PDF_MIME_TYPE || doc.has_extension("pdf") {
            Ok(Self::Pdf)
        } else if media_type == DOCX_MIME_TYPE || doc.has_extension("docx") {
            Ok(Self::Docx)
        } else if media_type.starts_with("image/") {
            Ok(Self::Image)
        } else if media_type == TEXT_MIME_TYPE || doc.has_extension("txt") {
            Ok(Self::PlainText)
        } else {
            Err(anyhow!(
                "unsupported file type {:?} for {} (supported: PDF, DOCX, images, plain text)",
                media_type,
                doc.name
            ))
        }
    }
}

/// Extracts clean text from documents.
pub struct DocumentExtractor {
    pdf: Arc<dyn PdfBackend>,
    ocr: OcrAdapter,
    corrector: OcrCorrector,
    cache: Arc<dyn ExtractionCache>,
    options: ExtractOptions,
}

impl DocumentExtractor {
    /// Create a new extractor using the built-in correction table.
    pub fn new(
        pdf: Arc<dyn PdfBackend>,
        ocr_engine: Arc<dyn OcrEngine>,
        cache: Arc<dyn ExtractionCache>,
        options: ExtractOptions,
    ) -> Self {
        Self {
            pdf,
            ocr: OcrAdapter::new(ocr_engine, options.ocr.clone()),
            corrector: OcrCorrector::builtin().clone(),
            cache,
            options,
        }
    }

    /// Use a different correction table.
    pub fn with_corrector(mut self, corrector: OcrCorrector) -> Self {
        self.corrector = corrector;
        self
    }

    /// The correction table applied to extracted text.
    pub fn corrector(&self) -> &OcrCorrector {
        &self.corrector
    }

    /// Extract the text of `doc`.
    ///
    /// `purpose` is part of the cache key. Errors name the file.
    #[instrument(level = "debug", skip_all, fields(name = %doc.name, purpose = %purpose))]
    pub async fn extract(
        &self,
        doc: &SourceDocument,
        purpose: &str,
        progress: Progress<'_>,
    ) -> Result<String> {
        self.extract_inner(doc, purpose, progress)
            .await
            .with_context(|| format!("failed to process file {}", doc.name))
    }

    async fn extract_inner(
        &self,
        doc: &SourceDocument,
        purpose: &str,
        progress: Progress<'_>,
    ) -> Result<String> {
        let report = |stage: Stage| {
            debug!(%stage, "Extraction progress");
            progress(&stage.to_string());
        };

        report(Stage::CheckingSize);
        if doc.size() > self.options.max_file_size {
            return Err(anyhow!(
                "file is too large ({} bytes, limit is {} bytes)",
                doc.size(),
                self.options.max_file_size
            ));
        }

        report(Stage::CheckingCache);
        let key = CacheKey::new(doc.fingerprint(), purpose);
        match self.cache.get(&key).await {
            Ok(Some(text)) => {
                report(Stage::CacheHit);
                report(Stage::Done);
                return Ok(text);
            }
            Ok(None) => {}
            Err(err) => warn!("Cache lookup failed, extracting anyway: {:?}", err),
        }

        let raw = match DocumentType::of(doc)? {
            DocumentType::Pdf => self.read_pdf(doc, &report).await?,
            DocumentType::Docx => {
                report(Stage::ReadingDocx);
                read_docx(doc).await?
            }
            DocumentType::Image => self.read_image(doc, &report).await?,
            DocumentType::PlainText => {
                report(Stage::ReadingPlainText);
                String::from_utf8_lossy(&doc.data).into_owned()
            }
        };

        report(Stage::Correcting);
        let corrected = self.corrector.correct(&raw);
        report(Stage::Normalizing);
        let text = normalize_text(&corrected);

        report(Stage::Storing);
        if let Err(err) = self.cache.set(&key, &text).await {
            warn!("Could not save extracted text to cache: {:?}", err);
        }
        report(Stage::Done);
        Ok(text)
    }

    /// Read a PDF, using its text layer if it has a usable one.
    async fn read_pdf(
        &self,
        doc: &SourceDocument,
        report: &(dyn Fn(Stage) + Send + Sync),
    ) -> Result<String> {
        // Our backends work on files.
        let tmpdir = tempfile::TempDir::with_prefix("extract")?;
        let pdf_path = tmpdir.path().join("input.pdf");
        tokio::fs::write(&pdf_path, &doc.data)
            .await
            .context("cannot write PDF to temporary file")?;

        let page_count = self
            .pdf
            .page_count(&pdf_path)
            .await
            .context("failed to read PDF")?;
        if page_count == 0 {
            return Err(anyhow!("PDF has no pages"));
        }

        let check_pages = page_count.min(self.options.text_check_pages.max(1));
        report(Stage::ReadingTextLayer { pages: check_pages });
        match self.pdf.page_texts(&pdf_path, 1, check_pages).await {
            Ok(mut texts) => {
                if is_text_sufficient(&texts.join("\n"), self.options.min_meaningful_length)
                {
                    if page_count > check_pages {
                        report(Stage::ReadingRemainingPages {
                            pages: page_count - check_pages,
                        });
                        let rest = self
                            .pdf
                            .page_texts(&pdf_path, check_pages + 1, page_count)
                            .await
                            .context("failed to read PDF text layer")?;
                        texts.extend(rest);
                    }
                    return Ok(texts.join("\n"));
                }
            }
            Err(err) => warn!("Could not read PDF text layer, using OCR: {:?}", err),
        }

        report(Stage::TextLayerInsufficient);
        self.ocr_pdf(&pdf_path, page_count, report).await
    }

    /// OCR the first few pages of a PDF, one page at a time.
    async fn ocr_pdf(
        &self,
        pdf_path: &Path,
        page_count: usize,
        report: &(dyn Fn(Stage) + Send + Sync),
    ) -> Result<String> {
        let total = page_count.min(self.options.max_ocr_pages);
        let pages = self
            .pdf
            .render_pages(pdf_path, total, scale_to_dpi(self.options.render_scale))
            .await
            .context("failed to render PDF pages")?;

        // Each page is only rendered when we poll for it, after the previous
        // page has been recognized.
        let mut pages = BlockingIterStream::new(pages);
        let mut texts = Vec::with_capacity(total);
        for page_num in 1..=total {
            report(Stage::RenderingPage {
                page: page_num,
                total,
            });
            let Some(page) = pages.next().await else {
                break;
            };
            match page {
                Ok(page) => {
                    report(Stage::RecognizingPage {
                        page: page_num,
                        total,
                    });
                    texts.push(self.ocr.recognize(page, DocumentKind::Jd).await);
                }
                Err(err) => {
                    warn!("Skipping page {}/{}: {:?}", page_num, total, err);
                    texts.push(String::new());
                }
            }
        }
        Ok(texts.join("\n\n"))
    }

    /// Decode, scale, enhance and OCR an input image.
    async fn read_image(
        &self,
        doc: &SourceDocument,
        report: &(dyn Fn(Stage) + Send + Sync),
    ) -> Result<String> {
        let data = doc.data.clone();
        let (max_width, max_height, max_upscale) = (
            self.options.max_image_width,
            self.options.max_image_height,
            self.options.max_image_upscale,
        );
        let page = spawn_blocking_propagating_panics(move || -> Result<PageImage> {
            let mut page =
                PageImage::decode_to_fit(&data, max_width, max_height, max_upscale)?;
            page.enhance_for_ocr();
            Ok(page)
        })
        .await?;

        report(Stage::RecognizingImage);
        Ok(self.ocr.recognize(page, self.options.image_kind).await)
    }
}

/// Read the text of a DOCX file.
async fn read_docx(doc: &SourceDocument) -> Result<String> {
    let data = doc.data.clone();
    spawn_blocking_propagating_panics(move || {
        docx_lite::extract_text_from_bytes(&data)
            .map_err(|err| anyhow!("failed to read DOCX: {}", err))
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::{
        cache::MemoryCache,
        ocr::{OcrAttempt, OcrProfile, testing::ScriptedOcrEngine},
        page_iter::testing::{EventLog, FakePdfBackend},
    };

    fn no_progress(_: &str) {}

    fn extractor(
        pdf: Arc<FakePdfBackend>,
        ocr: Arc<ScriptedOcrEngine>,
        options: ExtractOptions,
    ) -> DocumentExtractor {
        DocumentExtractor::new(pdf, ocr, Arc::new(MemoryCache::new()), options)
    }

    fn png_document(name: &str) -> Result<SourceDocument> {
        let page = PageImage::new(RgbaImage::from_pixel(20, 10, Rgba([255; 4])));
        Ok(SourceDocument::new(
            name,
            Some("image/png".to_owned()),
            page.to_png()?,
        ))
    }

    #[tokio::test]
    async fn identical_content_is_recognized_once() -> Result<()> {
        let pdf = Arc::new(FakePdfBackend::new(&[]));
        let ocr = Arc::new(ScriptedOcrEngine::always("Senior Devel0per", 10));
        let extractor = extractor(pdf, ocr.clone(), ExtractOptions::default());

        let first = extractor
            .extract(&png_document("a.png")?, "text-extraction", &no_progress)
            .await?;
        let second = extractor
            .extract(&png_document("copy.png")?, "text-extraction", &no_progress)
            .await?;
        assert_eq!(first, "Senior Developer");
        assert_eq!(first, second);
        assert_eq!(ocr.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn different_purposes_extract_separately() -> Result<()> {
        let pdf = Arc::new(FakePdfBackend::new(&[]));
        let ocr = Arc::new(ScriptedOcrEngine::always("text", 10));
        let extractor = extractor(pdf, ocr.clone(), ExtractOptions::default());
        let doc = png_document("a.png")?;
        extractor.extract(&doc, "text-extraction", &no_progress).await?;
        extractor.extract(&doc, "text-extraction-cv", &no_progress).await?;
        assert_eq!(ocr.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn stamp_only_pdf_is_routed_to_ocr() -> Result<()> {
        let pdf = Arc::new(FakePdfBackend::new(&["〈stamp〉〈signature〉"]));
        let ocr = Arc::new(ScriptedOcrEngine::always("Scanned text", 5));
        let extractor = extractor(pdf.clone(), ocr.clone(), ExtractOptions::default());
        let doc = SourceDocument::new(
            "scan.pdf",
            Some(PDF_MIME_TYPE.to_owned()),
            b"%PDF".to_vec(),
        );
        let text = extractor.extract(&doc, "text-extraction", &no_progress).await?;
        assert_eq!(text, "Scanned text");
        assert_eq!(pdf.rendered(), 1);
        assert_eq!(ocr.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn sufficient_text_layer_reads_every_page_without_ocr() -> Result<()> {
        let pages = (1..=5)
            .map(|n| format!("Page {} {}", n, "content ".repeat(30)))
            .collect::<Vec<_>>();
        let page_refs = pages.iter().map(String::as_str).collect::<Vec<_>>();
        let pdf = Arc::new(FakePdfBackend::new(&page_refs));
        let ocr = Arc::new(ScriptedOcrEngine::new(vec![]));
        let extractor = extractor(pdf.clone(), ocr.clone(), ExtractOptions::default());
        let doc = SourceDocument::new("jd.pdf", None, b"%PDF".to_vec());
        let text = extractor.extract(&doc, "text-extraction", &no_progress).await?;
        assert!(text.starts_with("Page 1 content"));
        assert!(text.contains("Page 5 content"));
        assert_eq!(text.lines().count(), 5);
        assert_eq!(pdf.rendered(), 0);
        assert_eq!(ocr.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn scanned_pdf_ocrs_at_most_two_pages() -> Result<()> {
        let pdf = Arc::new(FakePdfBackend::new(&["", "", "", "", ""]));
        let ocr = Arc::new(ScriptedOcrEngine::always("Page text", 5));
        let extractor = extractor(pdf.clone(), ocr.clone(), ExtractOptions::default());
        let doc = SourceDocument::new("scan.pdf", None, b"%PDF".to_vec());
        let text = extractor.extract(&doc, "text-extraction", &no_progress).await?;
        assert_eq!(text, "Page text\n\nPage text");
        assert_eq!(pdf.rendered(), 2);
        assert_eq!(ocr.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_page_is_skipped() -> Result<()> {
        let pdf = Arc::new(FakePdfBackend::new(&["", ""]).with_corrupt_page(1));
        let ocr = Arc::new(ScriptedOcrEngine::always("Page two text", 5));
        let extractor = extractor(pdf.clone(), ocr.clone(), ExtractOptions::default());
        let doc = SourceDocument::new("scan.pdf", None, b"%PDF".to_vec());
        let text = extractor.extract(&doc, "text-extraction", &no_progress).await?;
        assert_eq!(text, "Page two text");
        assert_eq!(pdf.rendered(), 2);
        assert_eq!(ocr.calls(), 1);
        Ok(())
    }

    /// Records each recognition in a shared event log.
    struct LoggingOcrEngine {
        events: EventLog,
    }

    #[async_trait]
    impl OcrEngine for LoggingOcrEngine {
        async fn recognize_once(
            &self,
            _png: &[u8],
            _profile: &OcrProfile,
        ) -> Result<OcrAttempt> {
            self.events
                .lock()
                .expect("lock")
                .push("recognize".to_owned());
            Ok(OcrAttempt {
                text: "text".to_owned(),
                confidence: 95.0,
            })
        }
    }

    #[tokio::test]
    async fn next_page_renders_after_previous_page_is_recognized() -> Result<()> {
        let pdf = Arc::new(FakePdfBackend::new(&["", "", ""]));
        let events = pdf.events();
        let extractor = DocumentExtractor::new(
            pdf,
            Arc::new(LoggingOcrEngine {
                events: events.clone(),
            }),
            Arc::new(MemoryCache::new()),
            ExtractOptions::default(),
        );
        let doc = SourceDocument::new("scan.pdf", None, b"%PDF".to_vec());
        extractor.extract(&doc, "text-extraction", &no_progress).await?;
        assert_eq!(
            *events.lock().expect("lock"),
            vec!["render 1", "recognize", "render 2", "recognize"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn plain_text_is_corrected_and_normalized() -> Result<()> {
        let pdf = Arc::new(FakePdfBackend::new(&[]));
        let ocr = Arc::new(ScriptedOcrEngine::new(vec![]));
        let extractor = extractor(pdf, ocr, ExtractOptions::default());
        let doc = SourceDocument::new(
            "jd.txt",
            Some(TEXT_MIME_TYPE.to_owned()),
            "Kỹ   sư\r\n\r\n\r\n\r\nDevel0per  ".as_bytes().to_vec(),
        );
        let text = extractor.extract(&doc, "text-extraction", &no_progress).await?;
        assert_eq!(text, "Kỹ sư\n\nDeveloper");
        Ok(())
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_with_its_name() {
        let pdf = Arc::new(FakePdfBackend::new(&[]));
        let ocr = Arc::new(ScriptedOcrEngine::new(vec![]));
        let options = ExtractOptions {
            max_file_size: 10,
            ..ExtractOptions::default()
        };
        let extractor = extractor(pdf, ocr, options);
        let doc = SourceDocument::new("big.txt", None, vec![b'a'; 11]);
        let err = extractor
            .extract(&doc, "text-extraction", &no_progress)
            .await
            .expect_err("file should be too large");
        let message = format!("{:#}", err);
        assert!(message.starts_with("failed to process file big.txt"), "{}", message);
        assert!(message.contains("too large"), "{}", message);
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_with_its_name() {
        let pdf = Arc::new(FakePdfBackend::new(&[]));
        let ocr = Arc::new(ScriptedOcrEngine::new(vec![]));
        let extractor = extractor(pdf, ocr, ExtractOptions::default());
        let doc = SourceDocument::new(
            "data.bin",
            Some("application/octet-stream".to_owned()),
            vec![0, 1, 2],
        );
        let err = extractor
            .extract(&doc, "text-extraction", &no_progress)
            .await
            .expect_err("type should be unsupported");
        assert!(format!("{:#}", err).contains("data.bin"));
    }

    #[tokio::test]
    async fn corrupt_docx_is_an_error() {
        let pdf = Arc::new(FakePdfBackend::new(&[]));
        let ocr = Arc::new(ScriptedOcrEngine::new(vec![]));
        let extractor = extractor(pdf, ocr, ExtractOptions::default());
        let doc = SourceDocument::new("cv.docx", None, b"not a zip file".to_vec());
        let err = extractor
            .extract(&doc, "text-extraction", &no_progress)
            .await
            .expect_err("corrupt DOCX should fail");
        assert!(format!("{:#}", err).contains("failed to process file cv.docx"));
    }

    #[tokio::test]
    async fn progress_reports_every_step() -> Result<()> {
        let pdf = Arc::new(FakePdfBackend::new(&[""]));
        let ocr = Arc::new(ScriptedOcrEngine::always("text", 5));
        let extractor = extractor(pdf, ocr, ExtractOptions::default());
        let doc = SourceDocument::new("scan.pdf", None, b"%PDF".to_vec());
        let messages = Mutex::new(Vec::<String>::new());
        let record = |msg: &str| messages.lock().expect("lock").push(msg.to_owned());
        extractor.extract(&doc, "text-extraction", &record).await?;

        let messages = messages.into_inner().expect("lock");
        assert_eq!(messages.first().map(String::as_str), Some("Checking file size"));
        assert!(messages.contains(&"Recognizing page 1/1".to_owned()));
        assert_eq!(messages.last().map(String::as_str), Some("Done"));
        Ok(())
    }

    /// A cache that always fails.
    struct BrokenCache;

    #[async_trait]
    impl ExtractionCache for BrokenCache {
        async fn get(&self, _key: &CacheKey) -> Result<Option<String>> {
            Err(anyhow!("disk on fire"))
        }

        async fn set(&self, _key: &CacheKey, _text: &str) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[tokio::test]
    async fn cache_failures_do_not_fail_extraction() -> Result<()> {
        let extractor = DocumentExtractor::new(
            Arc::new(FakePdfBackend::new(&[])),
            Arc::new(ScriptedOcrEngine::new(vec![])),
            Arc::new(BrokenCache),
            ExtractOptions::default(),
        );
        let doc = SourceDocument::new("a.txt", None, b"hello".to_vec());
        let text = extractor.extract(&doc, "text-extraction", &no_progress).await?;
        assert_eq!(text, "hello");
        Ok(())
    }

    #[test]
    fn document_type_uses_extension_when_type_is_missing() -> Result<()> {
        let doc = SourceDocument::new("CV.PDF", None, vec![]);
        assert_eq!(DocumentType::of(&doc)?, DocumentType::Pdf);
        let doc = SourceDocument::new("cv.docx", None, vec![]);
        assert_eq!(DocumentType::of(&doc)?, DocumentType::Docx);
        let doc = SourceDocument::new("scan", Some("image/jpeg".to_owned()), vec![]);
        assert_eq!(DocumentType::of(&doc)?, DocumentType::Image);
        Ok(())
    }
}
