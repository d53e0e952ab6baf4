//! I/O utilities.
//!
//! This module reads JSON and TOML configuration files, and writes JSONL
//! output to a file or standard output.

use tokio::{
    fs::File,
    io::{AsyncWrite, AsyncWriteExt as _, BufWriter},
};

use crate::prelude::*;

/// Read TOML or JSON from a file.
///
/// Files ending in `.json` are parsed as JSON. Everything else is TOML.
pub async fn read_json_or_toml<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at path: {:?}", path))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if is_json {
        serde_json::from_str(&data).with_context(|| {
            format!("Failed to parse JSON from file at path: {:?}", path)
        })
    } else {
        toml::from_str(&data).with_context(|| {
            format!("Failed to parse TOML from file at path: {:?}", path)
        })
    }
}

/// Create an [`AsyncWrite`] for a file or stdout.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Writes records as JSON Lines, one record at a time.
pub struct JsonlWriter {
    writer: BufWriter<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>>,
}

impl JsonlWriter {
    /// Open a writer for a file, or standard output if `path` is `None`.
    pub async fn create(path: Option<&Path>) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(create_writer(path).await?),
        })
    }

    /// Write a single record.
    pub async fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let json =
            serde_json::to_string(record).context("Failed to serialize output record")?;
        self.writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write JSON to output")?;
        self.writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline to output")?;
        // Flush per record, so that a slow batch shows progress downstream.
        self.writer.flush().await.context("Failed to flush output")
    }
}
