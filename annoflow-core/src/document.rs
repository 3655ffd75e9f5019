use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AnnoflowError, Result};

/// Key holding the declared file name of a datapoint.
pub const FILE_NAME_KEY: &str = "file_name";

/// Key holding the encoded image payload of a datapoint.
pub const IMAGE_KEY: &str = "_image";

/// JSON-serializable projection of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// The declared `file_name` of the datapoint.
    pub fn file_name(&self) -> Result<&str> {
        self.0
            .get(FILE_NAME_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| AnnoflowError::missing_field(FILE_NAME_KEY, "document"))
    }

    /// File name with everything from the first `.` onwards removed.
    ///
    /// `"c.tar.gz"` becomes `"c"`.
    pub fn base_name(&self) -> Result<&str> {
        self.file_name().map(base_name)
    }

    pub fn image(&self) -> Option<&Value> {
        self.0.get(IMAGE_KEY)
    }

    /// Splits the image payload off, returning a document that no longer has an `_image` key.
    pub fn detach_image(mut self) -> (Document, Option<Value>) {
        let image = self.0.remove(IMAGE_KEY);
        (self, image)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Truncates a file name at its first `.`.
pub fn base_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// A record that can project itself into a [`Document`].
pub trait Exportable {
    /// `save_image` keeps the encoded image payload under `_image`;
    /// `highest_hierarchy_only` strips image attributes nested in annotations.
    fn export(&self, save_image: bool, highest_hierarchy_only: bool) -> Result<Document>;
}

impl<T: Exportable + ?Sized> Exportable for &T {
    fn export(&self, save_image: bool, highest_hierarchy_only: bool) -> Result<Document> {
        (**self).export(save_image, highest_hierarchy_only)
    }
}

impl<T: Exportable + ?Sized> Exportable for Box<T> {
    fn export(&self, save_image: bool, highest_hierarchy_only: bool) -> Result<Document> {
        (**self).export(save_image, highest_hierarchy_only)
    }
}

/// Free-form object records follow the same image policy as [`crate::Datapoint`].
impl Exportable for Value {
    fn export(&self, save_image: bool, highest_hierarchy_only: bool) -> Result<Document> {
        let Value::Object(fields) = self else {
            return Err(AnnoflowError::missing_field(
                FILE_NAME_KEY,
                "non-object record",
            ));
        };

        let mut fields = fields.clone();
        if !save_image || fields.get(IMAGE_KEY).is_some_and(Value::is_null) {
            fields.remove(IMAGE_KEY);
        }
        if highest_hierarchy_only {
            crate::datapoint::strip_annotation_images(&mut fields);
        }
        Ok(Document(fields))
    }
}
