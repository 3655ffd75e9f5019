use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::ExportConfig;
use crate::document::{Document, Exportable};
use crate::error::{AnnoflowError, Result};
use crate::image_io::{decode_base64_image, write_png};
use crate::ndjson::NdjsonWriter;

/// Subdirectory of the destination holding extracted PNG side files.
pub const IMAGE_DIR: &str = "image";

/// Counts of what an export produced. Paths are logged as they are written, not kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub documents_written: usize,
    pub images_written: usize,
}

/// Files written for one datapoint in per-record mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocument {
    pub json: PathBuf,
    pub image: Option<PathBuf>,
}

impl ExportSummary {
    fn record(&mut self, written: &WrittenDocument) {
        self.documents_written += 1;
        if written.image.is_some() {
            self.images_written += 1;
        }
    }
}

/// Exports datapoints to `destination` using the layout selected by `config`.
///
/// Records are pulled one at a time; once `max_datapoints` documents are written the
/// upstream iterator is not advanced again.
pub fn export_datapoints<I, R>(
    records: I,
    destination: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<ExportSummary>
where
    I: IntoIterator<Item = R>,
    R: Exportable,
{
    try_export_datapoints(records.into_iter().map(Ok), destination, config)
}

/// Like [`export_datapoints`] for upstream sequences that can fail mid-stream.
///
/// The first upstream or projection error aborts the export.
#[instrument(skip_all, fields(destination = %destination.as_ref().display()))]
pub fn try_export_datapoints<I, R>(
    records: I,
    destination: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<ExportSummary>
where
    I: IntoIterator<Item = Result<R>>,
    R: Exportable,
{
    config.validate()?;
    let destination = destination.as_ref();

    if config.single_files {
        fs::create_dir_all(destination)?;
    }
    if !config.save_image_in_json {
        fs::create_dir_all(destination.join(IMAGE_DIR))?;
    }

    let documents = project(records, config.save_image, config.highest_hierarchy_only);
    let progress = maybe_spinner_pb(config.show_progress);

    let summary = if config.single_files {
        let mut summary = ExportSummary::default();
        for document in bounded(documents, config.max_datapoints) {
            let written = write_single_file(document?, destination, config)?;
            summary.record(&written);
            if let Some(pb) = progress.as_ref() {
                pb.inc(1);
            }
        }
        summary
    } else {
        let file_name = config.file_name.as_deref().ok_or_else(|| {
            AnnoflowError::configuration("a file name for the .jsonl output is required")
        })?;
        write_aggregate(
            documents,
            destination,
            file_name,
            config.max_datapoints,
            progress.as_ref(),
        )?
    };

    let message = format!(
        "Export complete: {} datapoint(s), {} image(s) under {:?}",
        summary.documents_written, summary.images_written, destination
    );
    report_completion(progress, message);

    Ok(summary)
}

/// Completion goes to the spinner when one is shown, otherwise to the log.
fn report_completion(progress: Option<ProgressBar>, message: String) {
    match progress {
        Some(pb) => pb.finish_with_message(message),
        None => info!(target: "annoflow::export", "{}", message),
    }
}

/// Lazily projects each record into a document, tagging failures with the record's index.
fn project<I, R>(
    records: I,
    save_image: bool,
    highest_hierarchy_only: bool,
) -> impl Iterator<Item = Result<Document>>
where
    I: IntoIterator<Item = Result<R>>,
    R: Exportable,
{
    records.into_iter().enumerate().map(move |(index, record)| {
        record
            .and_then(|record| record.export(save_image, highest_hierarchy_only))
            .map_err(|err| err.at_index(index))
    })
}

/// Stops after `max` items without pulling the next one from upstream.
fn bounded<I: Iterator>(iter: I, max: Option<usize>) -> std::iter::Take<I> {
    iter.take(max.unwrap_or(usize::MAX))
}

/// Writes one document as `<base>.json`, first splitting its image into
/// `image/<base>.png` when the config asks for extraction.
///
/// The declared `file_name` is trusted as a relative name: an absolute `file_name`
/// replaces `destination` when the output paths are joined.
pub fn write_single_file(
    document: Document,
    destination: &Path,
    config: &ExportConfig,
) -> Result<WrittenDocument> {
    let base = document.base_name()?.to_owned();
    let json_path = destination.join(format!("{}.json", base));

    let (document, image_path) = if config.extracts_images() {
        let file_name = document.file_name()?.to_owned();
        let (document, image) = document.detach_image();
        let encoded = match image {
            Some(Value::String(encoded)) => encoded,
            _ => return Err(AnnoflowError::missing_image(file_name)),
        };
        let pixels = decode_base64_image(&encoded, &file_name)?;
        let png_path = destination.join(IMAGE_DIR).join(format!("{}.png", base));
        write_png(&pixels, &png_path)?;
        (document, Some(png_path))
    } else {
        (document, None)
    };

    let file = File::create(&json_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &document)
        .map_err(|err| AnnoflowError::json(json_path.display().to_string(), err))?;
    writer.flush()?;

    debug!(json = %json_path.display(), image = image_path.is_some(), "wrote datapoint");

    Ok(WrittenDocument {
        json: json_path,
        image: image_path,
    })
}

/// Writes documents as `destination/<file_name>`, one JSON object per line, stopping after
/// `max_datapoints` documents.
pub fn write_aggregate<I>(
    documents: I,
    destination: &Path,
    file_name: &str,
    max_datapoints: Option<usize>,
    progress: Option<&ProgressBar>,
) -> Result<ExportSummary>
where
    I: IntoIterator<Item = Result<Document>>,
{
    if !destination.is_dir() {
        return Err(AnnoflowError::path_not_found(destination));
    }

    let path = destination.join(file_name);
    let mut writer = NdjsonWriter::create(&path)?;
    for document in bounded(documents.into_iter(), max_datapoints) {
        writer.write_record(&document?)?;
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }
    let lines = writer.finish()?;
    debug!(path = %path.display(), lines, "wrote jsonl");

    Ok(ExportSummary {
        documents_written: lines,
        images_written: 0,
    })
}

fn maybe_spinner_pb(show_progress: bool) -> Option<ProgressBar> {
    if !show_progress {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} exported {pos} datapoint(s) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    if pb.is_hidden() {
        None
    } else {
        Some(pb)
    }
}
