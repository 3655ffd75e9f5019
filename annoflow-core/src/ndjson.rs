use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{AnnoflowError, Result};

/// Line-delimited JSON writer: one compact JSON value per `\n`-terminated line.
pub struct NdjsonWriter<W: Write> {
    writer: BufWriter<W>,
    lines: usize,
}

impl NdjsonWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
            lines: 0,
        }
    }

    pub fn write_record<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|err| AnnoflowError::json(format!("jsonl line {}", self.lines + 1), err))?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Number of lines written so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.lines)
    }
}
