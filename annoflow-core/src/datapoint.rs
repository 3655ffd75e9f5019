use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{Document, Exportable, FILE_NAME_KEY, IMAGE_KEY};
use crate::error::{AnnoflowError, Result};

const ANNOTATIONS_KEY: &str = "annotations";
const ANNOTATION_IMAGE_KEY: &str = "image";

/// An image-annotation datapoint as read from an upstream export.
///
/// Only the fields the exporter touches are typed; everything else
/// (`document_id`, `page_number`, `_bbox`, summaries, ...) rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub file_name: String,
    #[serde(default)]
    pub location: String,
    /// Base64 of an encoded image (PNG, JPEG).
    #[serde(rename = "_image", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Datapoint {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            location: String::new(),
            image: None,
            annotations: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_image(mut self, encoded: impl Into<String>) -> Self {
        self.image = Some(encoded.into());
        self
    }

    pub fn with_annotation(mut self, annotation: Value) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn from_export(value: Value) -> Result<Self> {
        if value.get(FILE_NAME_KEY).and_then(Value::as_str).is_none() {
            return Err(AnnoflowError::missing_field(FILE_NAME_KEY, "datapoint"));
        }
        serde_json::from_value(value).map_err(|err| AnnoflowError::json("datapoint", err))
    }
}

impl Exportable for Datapoint {
    fn export(&self, save_image: bool, highest_hierarchy_only: bool) -> Result<Document> {
        let value = serde_json::to_value(self).map_err(|err| AnnoflowError::json("datapoint", err))?;
        let Value::Object(mut fields) = value else {
            return Err(AnnoflowError::missing_field(FILE_NAME_KEY, "datapoint"));
        };

        if !save_image {
            fields.remove(IMAGE_KEY);
        }
        if highest_hierarchy_only {
            strip_annotation_images(&mut fields);
        }

        Ok(Document::new(fields))
    }
}

/// Nulls the `image` attribute of every annotation so only the top-level image remains.
pub(crate) fn strip_annotation_images(fields: &mut Map<String, Value>) {
    let Some(annotations) = fields.get_mut(ANNOTATIONS_KEY).and_then(Value::as_array_mut) else {
        return;
    };
    for annotation in annotations.iter_mut().filter_map(Value::as_object_mut) {
        if annotation.contains_key(ANNOTATION_IMAGE_KEY) {
            annotation.insert(ANNOTATION_IMAGE_KEY.to_owned(), Value::Null);
        }
    }
}
