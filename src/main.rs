use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod async_utils;
mod cache;
mod cmd;
mod extractor;
mod fields;
mod ocr;
mod output;
mod page_iter;
mod prelude;
mod raster;
mod source;
mod text;
mod ui;

/// Extract clean text and fields from CVs and job descriptions.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
External tools:
  - pdftotext, pdfinfo and pdftocairo (from Poppler) for PDFs.
  - tesseract, with the "eng" and "vie" language data, for OCR.

Environment Variables:
  - TESSDATA_PREFIX (optional): Where tesseract finds its language data.
  - RUST_LOG (optional): Log filter, for example "cv_extract=debug".

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Extract corrected, normalized text from files.
    Extract(cmd::extract::ExtractCmdOpts),
    /// Extract text from files and pull out contact fields, sections and
    /// job titles.
    Parse(cmd::parse::ParseCmdOpts),
    /// Print schemas for output and configuration formats.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Extract(opts) => opts.output_path.is_none(),
            Cmd::Parse(opts) => opts.output_path.is_none(),
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the progress bars if we're using stdout for output.
    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    match &opts.subcmd {
        Cmd::Extract(opts) => {
            cmd::extract::cmd_extract(ui, opts).await?;
        }
        Cmd::Parse(opts) => {
            cmd::parse::cmd_parse(ui, opts).await?;
        }
        Cmd::Schema(schema_opts) => {
            cmd::schema::cmd_schema(schema_opts).await?;
        }
    }
    Ok(())
}
