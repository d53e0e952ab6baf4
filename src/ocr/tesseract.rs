//! Tesseract OCR engine.

use tokio::{fs, process::Command};

use crate::{
    async_utils::{check_for_command_failure, is_command_not_found},
    prelude::*,
};

use super::{OcrAttempt, OcrEngine, OcrProfile};

/// TSV rows at this level describe individual words.
const TSV_WORD_LEVEL: &str = "5";

/// OCR engine wrapping the `tesseract` CLI tool.
#[non_exhaustive]
pub struct TesseractOcrEngine {}

impl TesseractOcrEngine {
    /// Create a new `tesseract` engine.
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for TesseractOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractOcrEngine {
    #[instrument(level = "debug", skip_all, fields(profile = profile.name))]
    async fn recognize_once(&self, png: &[u8], profile: &OcrProfile) -> Result<OcrAttempt> {
        // Write our input to a temporary file.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join("input.png");
        let output_base = tmpdir.path().join("output");
        fs::write(&input_path, png)
            .await
            .context("cannot write tesseract input file")?;

        // Run tesseract, asking for both plain text and per-word TSV.
        let mut cmd = Command::new("tesseract");
        cmd.arg(&input_path)
            .arg(&output_base)
            .arg("-l")
            .arg(&profile.languages)
            .arg("--psm")
            .arg(profile.page_seg_mode.to_string())
            .arg("--oem")
            .arg(profile.engine_mode.to_string());
        for (name, value) in &profile.variables {
            cmd.arg("-c").arg(format!("{}={}", name, value));
        }
        cmd.arg("txt").arg("tsv");
        let output = match cmd.output().await {
            Ok(output) => output,
            Err(err) if is_command_not_found(&err) => {
                return Err(anyhow!("tesseract is not installed or not on PATH"));
            }
            Err(err) => return Err(err).context("cannot run tesseract"),
        };
        check_for_command_failure("tesseract", &output, None)?;

        // Read the output files.
        let text = fs::read_to_string(output_base.with_extension("txt"))
            .await
            .context("cannot read tesseract text output")?;
        let tsv = fs::read_to_string(output_base.with_extension("tsv"))
            .await
            .context("cannot read tesseract TSV output")?;
        Ok(OcrAttempt {
            text,
            confidence: mean_word_confidence(&tsv),
        })
    }
}

/// Average the confidence of every recognized word in Tesseract's TSV output.
///
/// Rows with a negative confidence are layout blocks, not words. If there are no
/// words at all, the confidence is 0.
fn mean_word_confidence(tsv: &str) -> f32 {
    let mut total = 0.0f64;
    let mut count = 0usize;
    for line in tsv.lines().skip(1) {
        let columns = line.split('\t').collect::<Vec<_>>();
        if columns.len() < 12 || columns[0] != TSV_WORD_LEVEL {
            continue;
        }
        if columns[11].trim().is_empty() {
            continue;
        }
        match columns[10].trim().parse::<f64>() {
            Ok(conf) if conf >= 0.0 => {
                total += conf;
                count += 1;
            }
            Ok(_) => {}
            Err(err) => trace!("Ignoring bad tesseract confidence {:?}: {}", columns[10], err),
        }
    }
    if count == 0 {
        0.0
    } else {
        (total / count as f64) as f32
    }
}
