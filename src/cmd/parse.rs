//! The `parse` subcommand.

use clap::Args;

use crate::{
    async_utils::io::JsonlWriter,
    cache::purpose_for,
    fields::parse_document,
    ocr::DocumentKind,
    output::{OutputCounters, ParseData, ParseOutput},
    prelude::*,
    ui::{ProgressConfig, Ui},
};

use super::{ExtractOpts, extract_file};

/// Parse command line arguments.
#[derive(Debug, Args)]
pub struct ParseCmdOpts {
    /// PDF, DOCX, image or text files to parse.
    #[clap(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Output JSONL file. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    /// What kind of document are we parsing? CVs are split into sections,
    /// and job descriptions get a job title.
    #[clap(long, value_enum, default_value_t = DocumentKind::Jd)]
    pub kind: DocumentKind,

    #[clap(flatten)]
    pub extract: ExtractOpts,
}

/// The `parse` subcommand.
#[instrument(level = "debug", skip_all, fields(kind = ?opts.kind))]
pub async fn cmd_parse(ui: Ui, opts: &ParseCmdOpts) -> Result<()> {
    let extractor = opts.extract.build_extractor().await?;
    let mut writer = JsonlWriter::create(opts.output_path.as_deref()).await?;
    let purpose = purpose_for(opts.kind);

    let pb = ui.new_file_progress_bar(
        &ProgressConfig {
            emoji: "🔎",
            msg: "Parsing files",
            done_msg: "Parsed files",
        },
        opts.files.len(),
    );

    let mut counters = OutputCounters::default();
    for path in &opts.files {
        let result = extract_file(&ui, &extractor, path, purpose)
            .await
            .map(|text| ParseData {
                parsed: Some(parse_document(&text, opts.kind, extractor.corrector())),
            });
        let output = ParseOutput::from_result(path, result);
        counters.update(&output);
        writer.write(&output).await?;
        pb.inc(1);
    }
    pb.finish_using_style();

    counters.finish(&ui, opts.extract.allowed_failure_rate)
}
