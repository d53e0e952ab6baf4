//! The `extract` subcommand.

use clap::Args;

use crate::{
    async_utils::io::JsonlWriter,
    cache::DEFAULT_PURPOSE,
    output::{ExtractData, ExtractOutput, OutputCounters},
    prelude::*,
    ui::{ProgressConfig, Ui},
};

use super::{ExtractOpts, extract_file};

/// Extract command line arguments.
#[derive(Debug, Args)]
pub struct ExtractCmdOpts {
    /// PDF, DOCX, image or text files to extract.
    #[clap(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Output JSONL file. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    /// Cache tag for this extraction. Text extracted under different tags is
    /// cached separately.
    #[clap(long, default_value = DEFAULT_PURPOSE)]
    pub purpose: String,

    #[clap(flatten)]
    pub extract: ExtractOpts,
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(ui: Ui, opts: &ExtractCmdOpts) -> Result<()> {
    let extractor = opts.extract.build_extractor().await?;
    let mut writer = JsonlWriter::create(opts.output_path.as_deref()).await?;

    let pb = ui.new_file_progress_bar(
        &ProgressConfig {
            emoji: "📄",
            msg: "Extracting files",
            done_msg: "Extracted files",
        },
        opts.files.len(),
    );

    let mut counters = OutputCounters::default();
    for path in &opts.files {
        let result = extract_file(&ui, &extractor, path, &opts.purpose)
            .await
            .map(|text| ExtractData { text: Some(text) });
        let output = ExtractOutput::from_result(path, result);
        counters.update(&output);
        writer.write(&output).await?;
        pb.inc(1);
    }
    pb.finish_using_style();

    counters.finish(&ui, opts.extract.allowed_failure_rate)
}
