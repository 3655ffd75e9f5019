pub mod config;
pub mod datapoint;
pub mod document;
pub mod error;
pub mod image_io;
pub mod ndjson;
pub mod pipeline;
pub mod stream;

pub use config::ExportConfig;
pub use datapoint::Datapoint;
pub use document::{base_name, Document, Exportable};
pub use error::{AnnoflowError, Result};
pub use ndjson::NdjsonWriter;
pub use pipeline::{
    export_datapoints, try_export_datapoints, write_aggregate, write_single_file, ExportSummary,
    WrittenDocument,
};
pub use stream::{DatapointStream, ValueStream};
