//! Output records, one per input file, and batch failure accounting.

use schemars::JsonSchema;

use crate::{fields::ParsedDocument, prelude::*, ui::Ui};

/// Output status of a file.
#[derive(Clone, Copy, Debug, JsonSchema, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// The file was processed.
    Ok,

    /// The file could not be processed. See `errors`.
    Failed,
}

/// Output record for a single file.
#[derive(Clone, Debug, JsonSchema, Serialize)]
pub struct FileOutput<T>
where
    T: 'static,
{
    /// The input path.
    pub path: PathBuf,

    /// What is the status of this file?
    pub status: WorkStatus,

    /// Any errors that occurred during processing.
    pub errors: Vec<String>,

    /// The output data for the file.
    #[serde(flatten)]
    pub data: T,
}

impl<T> FileOutput<T>
where
    T: Default + 'static,
{
    /// Build an output record from the result of processing `path`.
    pub fn from_result(path: &Path, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                path: path.to_owned(),
                status: WorkStatus::Ok,
                errors: vec![],
                data,
            },
            Err(err) => {
                error!("{:?}", err);
                Self {
                    path: path.to_owned(),
                    status: WorkStatus::Failed,
                    errors: vec![format!("{:#}", err)],
                    data: T::default(),
                }
            }
        }
    }
}

/// Data returned by `extract`.
#[derive(Clone, Debug, Default, JsonSchema, Serialize)]
pub struct ExtractData {
    /// The extracted, corrected and normalized text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Data returned by `parse`.
#[derive(Clone, Debug, Default, JsonSchema, Serialize)]
pub struct ParseData {
    /// The fields found in the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ParsedDocument>,
}

/// An output record from `extract`.
pub type ExtractOutput = FileOutput<ExtractData>;

/// An output record from `parse`.
pub type ParseOutput = FileOutput<ParseData>;

/// Counts successes and failures over a batch of files.
#[derive(Clone, Debug, Default)]
pub struct OutputCounters {
    /// How many files did we process?
    pub total_count: usize,

    /// How many files failed?
    pub failure_count: usize,
}

impl OutputCounters {
    /// Count an output record.
    pub fn update<T>(&mut self, output: &FileOutput<T>) {
        self.total_count += 1;
        if output.status != WorkStatus::Ok {
            self.failure_count += 1;
        }
    }

    /// Report our totals, and fail if too many files failed.
    pub fn finish(&self, ui: &Ui, allowed_failure_rate: f32) -> Result<()> {
        if self.total_count == 0 {
            return Ok(());
        }
        let failure_rate = self.failure_count as f32 / self.total_count as f32;
        if failure_rate > allowed_failure_rate {
            Err(anyhow!(
                "{}/{} ({:.2}%) of files failed, but only {:.2}% were allowed",
                self.failure_count,
                self.total_count,
                failure_rate * 100.0,
                allowed_failure_rate * 100.0
            ))
        } else {
            if self.failure_count > 0 {
                ui.display_message(
                    "❌",
                    &format!("{} files could not be processed", self.failure_count),
                );
            }
            Ok(())
        }
    }
}
