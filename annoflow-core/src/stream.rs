//! Streaming readers for datapoint files, holding one element in memory at a time.
//!
//! Both [`ValueStream`] and [`DatapointStream`] detect the input format from the first
//! non-whitespace byte:
//! - `[` → JSON array (elements parsed one by one by [`JsonArrayStream`])
//! - anything else → NDJSON, blank lines skipped
//!
//! Errors carry the zero-based index of the element that failed, so an export aborted
//! mid-stream reports which datapoint was at fault.
//!
//! ```no_run
//! use annoflow_core::stream::DatapointStream;
//!
//! for result in DatapointStream::from_path("datapoints.jsonl")? {
//!     let datapoint = result?;
//!     println!("{}", datapoint.file_name);
//! }
//! # Ok::<(), annoflow_core::AnnoflowError>(())
//! ```

use serde::Deserialize;
use serde_json::{self as sj, value::RawValue, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::datapoint::Datapoint;
use crate::error::{AnnoflowError, Result};

/// Streams elements from a JSON array file without loading the entire array.
///
/// Reads the opening `[`, then one element per call via `RawValue` (which stops at the
/// value boundary), skipping the `,` separators until `]`.
pub struct JsonArrayStream {
    reader: BufReader<File>,
    started: bool,
    finished: bool,
}

impl JsonArrayStream {
    fn new(file: File) -> Self {
        Self {
            reader: BufReader::new(file),
            started: false,
            finished: false,
        }
    }

    fn next_element(&mut self, index: usize) -> Result<Option<Value>> {
        if self.finished {
            return Ok(None);
        }

        if !self.started {
            self.skip_whitespace()?;
            let mut bracket = [0u8; 1];
            self.reader.read_exact(&mut bracket)?;
            if bracket[0] != b'[' {
                return Err(AnnoflowError::export(index, "expected '[' at start of JSON array"));
            }
            self.started = true;
            self.skip_whitespace()?;

            if self.peek_byte()? == Some(b']') {
                self.finished = true;
                return Ok(None);
            }
        } else {
            self.skip_whitespace()?;
            match self.peek_byte()? {
                Some(b']') => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(b',') => {
                    self.reader.consume(1);
                    self.skip_whitespace()?;
                }
                None => {
                    return Err(AnnoflowError::export(
                        index,
                        "unexpected EOF in JSON array (missing ']')",
                    ));
                }
                Some(other) => {
                    return Err(AnnoflowError::export(
                        index,
                        format!(
                            "unexpected character '{}' in JSON array (expected ',' or ']')",
                            char::from(other)
                        ),
                    ));
                }
            }
        }

        let raw_value =
            Box::<RawValue>::deserialize(&mut sj::Deserializer::from_reader(&mut self.reader))
                .map_err(|err| AnnoflowError::export(index, format!("JSON parse error: {}", err)))?;

        let value: Value = sj::from_str(raw_value.get())
            .map_err(|err| AnnoflowError::export(index, format!("JSON parse error: {}", err)))?;

        Ok(Some(value))
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            match self.reader.fill_buf() {
                Ok([]) => break,
                Ok(available) => {
                    if available[0].is_ascii_whitespace() {
                        self.reader.consume(1);
                    } else {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok([]) => return Ok(None),
                Ok(buf) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Raw JSON values from a JSON array or NDJSON file.
pub enum ValueStream {
    Array { stream: JsonArrayStream, index: usize },
    Ndjson { reader: BufReader<File>, index: usize },
}

impl ValueStream {
    /// Opens a file and auto-detects its format.
    #[must_use = "this returns a Result that should be handled"]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnnoflowError::path_not_found(path));
        }

        let mut peek_file = File::open(path)?;
        let first_byte = first_non_whitespace_byte(&mut peek_file)?
            .ok_or_else(|| AnnoflowError::empty_file(path))?;
        drop(peek_file);

        let file = File::open(path)?;
        if first_byte == b'[' {
            Ok(Self::Array {
                stream: JsonArrayStream::new(file),
                index: 0,
            })
        } else {
            Ok(Self::Ndjson {
                reader: BufReader::new(file),
                index: 0,
            })
        }
    }

    fn next_ndjson(reader: &mut BufReader<File>, index: usize) -> Option<Result<Value>> {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(sj::from_str(trimmed).map_err(|err| {
                        AnnoflowError::export(index, format!("JSON parse error: {}", err))
                    }));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

impl Iterator for ValueStream {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let (item, index) = match self {
            Self::Array { stream, index } => {
                let item = stream.next_element(*index).transpose();
                if matches!(item, Some(Err(_))) {
                    stream.finished = true;
                }
                (item, index)
            }
            Self::Ndjson { reader, index } => (Self::next_ndjson(reader, *index), index),
        };
        if item.is_some() {
            *index += 1;
        }
        item
    }
}

/// Datapoints parsed lazily from a JSON array or NDJSON file.
pub struct DatapointStream {
    inner: ValueStream,
    index: usize,
}

impl DatapointStream {
    #[must_use = "this returns a Result that should be handled"]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            inner: ValueStream::from_path(path)?,
            index: 0,
        })
    }
}

impl Iterator for DatapointStream {
    type Item = Result<Datapoint>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.inner.next()?;
        let index = self.index;
        self.index += 1;
        Some(value.and_then(|value| Datapoint::from_export(value).map_err(|err| err.at_index(index))))
    }
}

/// Reads bytes until finding the first non-whitespace byte; `None` for blank input.
fn first_non_whitespace_byte<R: Read>(reader: &mut R) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                if !buf[0].is_ascii_whitespace() {
                    return Ok(Some(buf[0]));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
