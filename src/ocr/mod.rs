//! OCR with several engine configurations per image.
//!
//! No single set of engine parameters works well on every scan. We try an
//! ordered list of [`OcrProfile`]s against the same image and keep the best
//! result, stopping early once one of them is confident enough.

use std::sync::Arc;

use clap::{Args, ValueEnum};
use schemars::JsonSchema;

use crate::{
    async_utils::blocking_iter_streams::spawn_blocking_propagating_panics, prelude::*,
    raster::PageImage,
};

pub mod tesseract;

/// Default languages passed to the engine.
pub const DEFAULT_LANGUAGES: &str = "eng+vie";

/// Stop trying profiles once an attempt is more confident than this.
pub const DEFAULT_EARLY_EXIT_CONFIDENCE: f32 = 85.0;

/// A more confident attempt must be at least this long, relative to the
/// current best, to replace it.
pub const DEFAULT_MIN_LENGTH_RATIO: f32 = 0.8;

/// Characters we expect to see in a CV. Anything else is almost certainly
/// noise.
const CV_CHAR_WHITELIST: &str = concat!(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789",
    "àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđĐ",
    " (),./\\-+&:;@%",
);

/// Engine variables that turn off dictionary lookups. Dictionaries slow
/// recognition down and "correct" names and addresses into English words.
const DICTIONARY_OFF: &[(&str, &str)] = &[
    ("tessedit_enable_doc_dict", "0"),
    ("load_system_dawg", "0"),
    ("load_freq_dawg", "0"),
    ("load_unambig_dawg", "0"),
    ("load_punc_dawg", "0"),
    ("load_number_dawg", "0"),
    ("load_bigram_dawg", "0"),
    ("wordrec_enable_assoc", "0"),
];

/// What sort of document are we reading?
#[derive(
    Clone, Copy, Debug, Default, Deserialize, JsonSchema, PartialEq, Eq, Serialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// A candidate's CV or résumé.
    Cv,
    /// A job description.
    #[default]
    Jd,
}

/// One configuration of the OCR engine.
#[derive(Clone, Debug, PartialEq)]
pub struct OcrProfile {
    /// A short name, for logs.
    pub name: &'static str,
    /// Languages, in Tesseract's `eng+vie` form.
    pub languages: String,
    /// Page segmentation mode.
    pub page_seg_mode: u8,
    /// OCR engine mode. 1 is the LSTM engine.
    pub engine_mode: u8,
    /// Extra engine variables.
    pub variables: Vec<(String, String)>,
}

impl OcrProfile {
    /// The profiles to try for a kind of document, in order.
    pub fn profiles_for(kind: DocumentKind, languages: &str) -> Vec<OcrProfile> {
        let mut primary_vars = vec![("preserve_interword_spaces", "1")];
        primary_vars.extend_from_slice(DICTIONARY_OFF);
        let page_seg_mode = match kind {
            // Uniform block of text, which suits most CV layouts.
            DocumentKind::Cv => {
                primary_vars.push(("tessedit_char_whitelist", CV_CHAR_WHITELIST));
                6
            }
            // Automatic segmentation with orientation detection.
            DocumentKind::Jd => 1,
        };

        vec![
            OcrProfile {
                name: "tuned",
                languages: languages.to_owned(),
                page_seg_mode,
                engine_mode: 1,
                variables: owned_pairs(&primary_vars),
            },
            OcrProfile {
                name: "fallback",
                languages: languages.to_owned(),
                page_seg_mode: 3,
                engine_mode: 1,
                variables: owned_pairs(&[("preserve_interword_spaces", "1")]),
            },
        ]
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

/// The result of running one profile against one image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OcrAttempt {
    /// The recognized text.
    pub text: String,
    /// Engine confidence, from 0 to 100.
    pub confidence: f32,
}

/// Interface to an OCR engine.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Recognize a single PNG-encoded image with a single profile.
    async fn recognize_once(&self, png: &[u8], profile: &OcrProfile) -> Result<OcrAttempt>;
}

/// Options controlling how OCR attempts are run and compared.
#[derive(Args, Clone, Debug)]
pub struct OcrOptions {
    /// OCR languages, in Tesseract's `eng+vie` form.
    #[clap(long = "ocr-languages", default_value = DEFAULT_LANGUAGES)]
    pub languages: String,

    /// Stop trying OCR profiles once one returns a confidence above this.
    #[clap(long, default_value_t = DEFAULT_EARLY_EXIT_CONFIDENCE)]
    pub early_exit_confidence: f32,

    /// A more confident OCR result only replaces the current best if its text
    /// is at least this fraction of the current best's length.
    #[clap(long, default_value_t = DEFAULT_MIN_LENGTH_RATIO)]
    pub min_length_ratio: f32,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_owned(),
            early_exit_confidence: DEFAULT_EARLY_EXIT_CONFIDENCE,
            min_length_ratio: DEFAULT_MIN_LENGTH_RATIO,
        }
    }
}

/// Decide whether `candidate` should replace `best`.
///
/// The candidate wins only if it found some text, is strictly more confident
/// _and_ is not much shorter. A confident read of half a page is worse than a
/// shakier read of the whole page.
pub fn choose_attempt(
    best: OcrAttempt,
    candidate: OcrAttempt,
    min_length_ratio: f32,
) -> OcrAttempt {
    let best_len = best.text.chars().count() as f32;
    let candidate_len = candidate.text.chars().count() as f32;
    if !candidate.text.trim().is_empty()
        && candidate.confidence > best.confidence
        && candidate_len >= best_len * min_length_ratio
    {
        candidate
    } else {
        best
    }
}

/// Runs every profile for a document kind against an image, and keeps the best
/// result.
#[derive(Clone)]
pub struct OcrAdapter {
    engine: Arc<dyn OcrEngine>,
    options: OcrOptions,
}

impl OcrAdapter {
    /// Create a new adapter around an engine.
    pub fn new(engine: Arc<dyn OcrEngine>, options: OcrOptions) -> Self {
        Self { engine, options }
    }

    /// Recognize the text in `page`.
    ///
    /// This never fails. If every profile fails, we log the errors and return
    /// an empty string, because a page we couldn't read shouldn't abort the
    /// rest of the document.
    #[instrument(level = "debug", skip_all, fields(kind = ?kind))]
    pub async fn recognize(&self, page: PageImage, kind: DocumentKind) -> String {
        // Every profile reads the same encoded image.
        let png = match spawn_blocking_propagating_panics(move || page.to_png()).await {
            Ok(png) => png,
            Err(err) => {
                warn!("Could not encode page for OCR: {:?}", err);
                return String::new();
            }
        };

        let profiles = OcrProfile::profiles_for(kind, &self.options.languages);
        let profile_count = profiles.len();
        let mut best = OcrAttempt::default();
        for (idx, profile) in profiles.iter().enumerate() {
            match self.engine.recognize_once(&png, profile).await {
                Ok(attempt) => {
                    let confidence = attempt.confidence;
                    debug!(
                        attempt = idx + 1,
                        profile = profile.name,
                        confidence,
                        chars = attempt.text.chars().count(),
                        "OCR attempt finished"
                    );
                    best = choose_attempt(best, attempt, self.options.min_length_ratio);
                    if confidence > self.options.early_exit_confidence {
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        "OCR attempt {}/{} ({}) failed: {:?}",
                        idx + 1,
                        profile_count,
                        profile.name,
                        err
                    );
                }
            }
        }
        best.text
    }
}

#[cfg(test)]
pub mod testing {
    //! A scripted OCR engine for tests.

    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    /// Returns a fixed sequence of results, one per call, and counts calls.
    pub struct ScriptedOcrEngine {
        script: Mutex<Vec<Result<OcrAttempt>>>,
        calls: AtomicUsize,
        inputs: Mutex<Vec<Vec<u8>>>,
    }

    impl ScriptedOcrEngine {
        /// Create an engine that returns `script` in order. Once the script
        /// runs out, every call fails.
        pub fn new(script: Vec<Result<OcrAttempt>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
                inputs: Mutex::new(vec![]),
            }
        }

        /// Create an engine that always returns `text` with confidence 95.
        pub fn always(text: &str, times: usize) -> Self {
            Self::new(
                (0..times)
                    .map(|_| Ok(attempt(text, 95.0)))
                    .collect::<Vec<_>>(),
            )
        }

        /// How many times were we called?
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// The encoded images we were called with, in order.
        pub fn inputs(&self) -> Vec<Vec<u8>> {
            self.inputs.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcrEngine {
        async fn recognize_once(
            &self,
            png: &[u8],
            _profile: &OcrProfile,
        ) -> Result<OcrAttempt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.lock().expect("lock poisoned").push(png.to_vec());
            self.script
                .lock()
                .expect("lock poisoned")
                .pop()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }
    }

    /// Build an [`OcrAttempt`].
    pub fn attempt(text: &str, confidence: f32) -> OcrAttempt {
        OcrAttempt {
            text: text.to_owned(),
            confidence,
        }
    }
}
