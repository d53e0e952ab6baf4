//! PDF access, and iteration over rendered pages.
//!
//! Everything we need from a PDF goes through [`PdfBackend`]: the page count,
//! the text layer of a range of pages, and rasterized pages. The production
//! backend shells out to Poppler's command-line tools.

use std::{fs, sync::LazyLock};

use regex::Regex;
use tokio::process::Command;

use crate::{
    async_utils::{check_for_command_failure, is_command_not_found},
    prelude::*,
    raster::PageImage,
};

/// A default error regex for checking command output.
static ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error").expect("failed to compile regex"));

static DOWNGRADE_TO_WARNING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error: xref num").expect("failed to compile regex")
});

/// Does this line contain an error?
fn is_error_line(line: &str) -> bool {
    ERROR_REGEX.is_match(line) && !DOWNGRADE_TO_WARNING_REGEX.is_match(line)
}

/// Points per inch in PDF user space.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Convert a render scale (1.0 = 72 DPI) to a DPI.
pub fn scale_to_dpi(scale: f32) -> u32 {
    (scale * PDF_POINTS_PER_INCH).round().max(1.0) as u32
}

/// Interface to a PDF library.
///
/// Page numbers are 1-based and ranges are inclusive, the way Poppler's tools
/// count.
#[async_trait]
pub trait PdfBackend: Send + Sync + 'static {
    /// Count the pages in a PDF.
    async fn page_count(&self, pdf: &Path) -> Result<usize>;

    /// Read the text layer of pages `first..=last`, one string per page.
    async fn page_texts(&self, pdf: &Path, first: usize, last: usize)
    -> Result<Vec<String>>;

    /// Rasterize pages `1..=last` at `dpi`.
    async fn render_pages(&self, pdf: &Path, last: usize, dpi: u32) -> Result<PageIter>;
}

/// [`PdfBackend`] using `pdfinfo`, `pdftotext` and `pdftocairo`.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct PopplerPdfBackend {}

impl PopplerPdfBackend {
    /// Create a new Poppler backend.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl PdfBackend for PopplerPdfBackend {
    async fn page_count(&self, pdf: &Path) -> Result<usize> {
        get_pdf_page_count(pdf).await
    }

    #[instrument(level = "debug", skip_all, fields(path = %pdf.display(), first, last))]
    async fn page_texts(
        &self,
        pdf: &Path,
        first: usize,
        last: usize,
    ) -> Result<Vec<String>> {
        let output = Command::new("pdftotext")
            .arg("-f")
            .arg(first.to_string())
            .arg("-l")
            .arg(last.to_string())
            .arg("-enc")
            .arg("UTF-8")
            .arg(pdf)
            .arg("-")
            .output()
            .await
            .map_err(|err| command_error("pdftotext", pdf, err))?;
        check_for_command_failure("pdftotext", &output, Some(&is_error_line))?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(split_pages(&text))
    }

    #[instrument(level = "debug", skip_all, fields(path = %pdf.display(), last, dpi))]
    async fn render_pages(&self, pdf: &Path, last: usize, dpi: u32) -> Result<PageIter> {
        // Create a temporary directory to hold each rendered PNG until it has
        // been decoded.
        let tmpdir = tempfile::TempDir::with_prefix("pages")?;
        let renderer = PopplerPageRenderer {
            pdf: pdf.to_owned(),
            dpi,
            tmpdir: Some(tmpdir),
        };
        Ok(PageIter::new(Box::new(renderer), last))
    }
}

/// Build an error for a command that couldn't be started.
fn command_error(command_name: &str, pdf: &Path, err: std::io::Error) -> anyhow::Error {
    if is_command_not_found(&err) {
        anyhow!(
            "{} is not installed (it is part of poppler-utils)",
            command_name
        )
    } else {
        anyhow::Error::new(err)
            .context(format!("failed to run {} on {:?}", command_name, pdf.display()))
    }
}

/// Split `pdftotext` output into pages. Each page ends with a form feed.
fn split_pages(text: &str) -> Vec<String> {
    let mut pages = text.split('\x0C').map(str::to_owned).collect::<Vec<_>>();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Renders single pages of a document to encoded images.
///
/// Rendering is blocking, and is only called from [`PageIter::next`].
pub trait PageRenderer: Send + 'static {
    /// Render the 1-based page `page`, returning an encoded image.
    fn render(&mut self, page: usize) -> Result<Vec<u8>>;
}

/// Renders one page per `pdftocairo` call.
struct PopplerPageRenderer {
    pdf: PathBuf,
    dpi: u32,
    /// Holds each rendered page until we've read it.
    ///
    /// This is released by [`Drop`].
    tmpdir: Option<tempfile::TempDir>,
}

impl PageRenderer for PopplerPageRenderer {
    #[instrument(level = "trace", skip(self))]
    fn render(&mut self, page: usize) -> Result<Vec<u8>> {
        let tmpdir = self
            .tmpdir
            .as_ref()
            .ok_or_else(|| anyhow!("page renderer was already closed"))?;
        // With -singlefile, pdftocairo writes exactly `{prefix}.png`.
        let out_prefix = tmpdir.path().join(format!("page-{}", page));
        let output = std::process::Command::new("pdftocairo")
            .arg("-png")
            .arg("-singlefile")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg(&self.pdf)
            .arg(&out_prefix)
            .output()
            .map_err(|err| command_error("pdftocairo", &self.pdf, err))?;
        check_for_command_failure("pdftocairo", &output, Some(&is_error_line))?;

        let path = out_prefix.with_extension("png");
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read file {:?}", path.display()))?;

        // Delete the file to recover space a bit early.
        if let Err(err) = fs::remove_file(&path) {
            warn!("failed to delete file {:?}: {}", path.display(), err);
        }
        Ok(bytes)
    }
}

impl Drop for PopplerPageRenderer {
    fn drop(&mut self) {
        // Delete our temporary directory, if we have one.
        if let Some(tmpdir) = self.tmpdir.take() {
            let tmpdir_path = tmpdir.path().to_owned();
            if let Err(err) = tmpdir.close() {
                error!(
                    directory = ?tmpdir_path.display(),
                    "failed to delete temporary directory: {}",
                    err
                );
            }
        }
    }
}

/// An iterator over rendered pages, prepared for OCR.
///
/// Each call to [`Iterator::next`] renders, decodes and enhances exactly one
/// page, so nothing happens to page `n + 1` until the caller has finished with
/// page `n` and asks for it. This is CPU-bound; wrap it in a
/// [`BlockingIterStream`](crate::async_utils::blocking_iter_streams::BlockingIterStream)
/// when consuming it from async code.
pub struct PageIter {
    renderer: Box<dyn PageRenderer>,
    next_page: usize,
    last_page: usize,
}

impl PageIter {
    /// Iterate over pages `1..=last_page` of `renderer`.
    pub fn new(renderer: Box<dyn PageRenderer>, last_page: usize) -> Self {
        Self {
            renderer,
            next_page: 1,
            last_page,
        }
    }
}

impl Iterator for PageIter {
    type Item = Result<PageImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_page > self.last_page {
            return None;
        }
        let page = self.next_page;
        self.next_page += 1;

        let result = self
            .renderer
            .render(page)
            .and_then(|bytes| PageImage::decode(&bytes))
            .map(|mut image| {
                image.enhance_for_ocr();
                image
            })
            .with_context(|| format!("failed to prepare page {} for OCR", page));
        Some(result)
    }
}

/// Get the number of pages in a PDF file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn get_pdf_page_count(path: &Path) -> Result<usize> {
    // Run pdfinfo to get the number of pages.
    let output = Command::new("pdfinfo")
        .arg(path)
        .output()
        .await
        .map_err(|err| command_error("pdfinfo", path, err))?;
    check_for_command_failure("pdfinfo", &output, None)?;

    let output =
        String::from_utf8(output.stdout).context("pdfinfo output was not valid UTF-8")?;
    parse_page_count(&output).with_context(|| {
        format!(
            "failed to parse page count for {:?} from pdfinfo output",
            path.display()
        )
    })
}

/// Find the `Pages:` line in `pdfinfo` output.
fn parse_page_count(pdfinfo_output: &str) -> Result<usize> {
    let value = pdfinfo_output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == "Pages")
        .map(|(_, value)| value.trim())
        .ok_or_else(|| anyhow!("failed to find page count in pdfinfo output"))?;
    Ok(value.parse::<usize>()?)
}
